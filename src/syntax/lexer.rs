use super::ParseError;
use std::{fmt, iter::Peekable, str::CharIndices};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
  Int(i64),
  Str(String),
  Path(String),
  Ident(String),

  Let,
  In,
  Rec,
  Inherit,
  If,
  Then,
  Else,
  Assert,
  With,
  OrKw,

  LBrace,
  RBrace,
  LBracket,
  RBracket,
  LParen,
  RParen,
  Semi,
  Colon,
  Comma,
  Dot,
  Ellipsis,
  At,
  Question,
  Assign,

  Eq,
  Neq,
  Lt,
  Leq,
  Gt,
  Geq,
  And,
  Or,
  Impl,
  Not,
  Plus,
  Minus,
  Star,
  Slash,
  Concat,
  Update,
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Token::Int(n) => return write!(f, "integer {}", n),
      Token::Str(_) => "string",
      Token::Path(p) => return write!(f, "path {}", p),
      Token::Ident(i) => return write!(f, "identifier `{}'", i),
      Token::Let => "let",
      Token::In => "in",
      Token::Rec => "rec",
      Token::Inherit => "inherit",
      Token::If => "if",
      Token::Then => "then",
      Token::Else => "else",
      Token::Assert => "assert",
      Token::With => "with",
      Token::OrKw => "or",
      Token::LBrace => "{",
      Token::RBrace => "}",
      Token::LBracket => "[",
      Token::RBracket => "]",
      Token::LParen => "(",
      Token::RParen => ")",
      Token::Semi => ";",
      Token::Colon => ":",
      Token::Comma => ",",
      Token::Dot => ".",
      Token::Ellipsis => "...",
      Token::At => "@",
      Token::Question => "?",
      Token::Assign => "=",
      Token::Eq => "==",
      Token::Neq => "!=",
      Token::Lt => "<",
      Token::Leq => "<=",
      Token::Gt => ">",
      Token::Geq => ">=",
      Token::And => "&&",
      Token::Or => "||",
      Token::Impl => "->",
      Token::Not => "!",
      Token::Plus => "+",
      Token::Minus => "-",
      Token::Star => "*",
      Token::Slash => "/",
      Token::Concat => "++",
      Token::Update => "//",
    };
    write!(f, "`{}'", s)
  }
}

/// A token together with its byte span, in the `(start, token, end)` shape
/// parser generators use.
pub type Spanned = (usize, Token, usize);

fn is_ident_start(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_' || c == '\'' || c == '-'
}

fn is_path_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' || c == '+' || c == '/'
}

fn keyword(s: &str) -> Option<Token> {
  Some(match s {
    "let" => Token::Let,
    "in" => Token::In,
    "rec" => Token::Rec,
    "inherit" => Token::Inherit,
    "if" => Token::If,
    "then" => Token::Then,
    "else" => Token::Else,
    "assert" => Token::Assert,
    "with" => Token::With,
    "or" => Token::OrKw,
    _ => return None,
  })
}

pub struct Lexer<'a> {
  file: usize,
  input: &'a str,
  chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
  pub fn new(input: &'a str, file: usize) -> Self {
    Self {
      file,
      input,
      chars: input.char_indices().peekable(),
    }
  }

  pub fn tokenize(mut self) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = vec![];
    while let Some(t) = self.next_token()? {
      tokens.push(t);
    }
    Ok(tokens)
  }

  fn error<S: Into<String>>(&self, start: usize, end: usize, message: S) -> ParseError {
    ParseError::new(self.file, start..end, message)
  }

  fn peek_at(&self, offset: usize) -> Option<char> {
    self.input[offset..].chars().next()
  }

  fn nth_after(&self, offset: usize, n: usize) -> Option<char> {
    self.input[offset..].chars().nth(n)
  }

  fn skip_trivia(&mut self) -> Result<(), ParseError> {
    loop {
      match self.chars.peek().copied() {
        Some((_, c)) if c.is_whitespace() => {
          self.chars.next();
        }
        Some((_, '#')) => {
          while let Some((_, c)) = self.chars.next() {
            if c == '\n' {
              break;
            }
          }
        }
        Some((start, '/')) if self.nth_after(start, 1) == Some('*') => {
          self.chars.next();
          self.chars.next();
          let mut prev = ' ';
          loop {
            match self.chars.next() {
              Some((_, '/')) if prev == '*' => break,
              Some((_, c)) => prev = c,
              None => return Err(self.error(start, self.input.len(), "unterminated comment")),
            }
          }
        }
        _ => return Ok(()),
      }
    }
  }

  fn next_token(&mut self) -> Result<Option<Spanned>, ParseError> {
    self.skip_trivia()?;
    let (start, c) = match self.chars.peek().copied() {
      Some(x) => x,
      None => return Ok(None),
    };

    if c.is_ascii_digit() {
      return self.number(start).map(Some);
    }

    if (c == '.' && matches!(self.nth_after(start, 1), Some('/')))
      || (c == '.' && self.nth_after(start, 1) == Some('.') && self.nth_after(start, 2) == Some('/'))
      || (c == '/' && self.nth_after(start, 1).map_or(false, |n| is_path_char(n) && n != '/'))
      || (c == '~' && self.nth_after(start, 1) == Some('/'))
    {
      return Ok(Some(self.path(start)));
    }

    if is_ident_start(c) {
      let mut end = start;
      while let Some((i, ch)) = self.chars.peek().copied() {
        if is_ident_char(ch) {
          end = i + ch.len_utf8();
          self.chars.next();
        } else {
          break;
        }
      }
      let word = &self.input[start..end];
      if self.peek_at(end) == Some('/')
        && self.nth_after(end, 1).map_or(false, |n| is_path_char(n) && n != '/')
      {
        return Ok(Some(self.path_from(start)));
      }
      let tok = keyword(word).unwrap_or_else(|| Token::Ident(word.to_owned()));
      return Ok(Some((start, tok, end)));
    }

    if c == '"' {
      return self.string(start).map(Some);
    }

    if c == '\'' && self.nth_after(start, 1) == Some('\'') {
      return self.indented_string(start).map(Some);
    }

    self.chars.next();
    let two = |lexer: &mut Self, t: Token| {
      lexer.chars.next();
      Ok(Some((start, t, start + 2)))
    };
    let next = self.chars.peek().map(|&(_, c)| c);
    let tok = match (c, next) {
      ('.', Some('.')) if self.nth_after(start, 2) == Some('.') => {
        self.chars.next();
        self.chars.next();
        return Ok(Some((start, Token::Ellipsis, start + 3)));
      }
      ('=', Some('=')) => return two(self, Token::Eq),
      ('!', Some('=')) => return two(self, Token::Neq),
      ('<', Some('=')) => return two(self, Token::Leq),
      ('>', Some('=')) => return two(self, Token::Geq),
      ('&', Some('&')) => return two(self, Token::And),
      ('|', Some('|')) => return two(self, Token::Or),
      ('-', Some('>')) => return two(self, Token::Impl),
      ('+', Some('+')) => return two(self, Token::Concat),
      ('/', Some('/')) => return two(self, Token::Update),
      ('{', _) => Token::LBrace,
      ('}', _) => Token::RBrace,
      ('[', _) => Token::LBracket,
      (']', _) => Token::RBracket,
      ('(', _) => Token::LParen,
      (')', _) => Token::RParen,
      (';', _) => Token::Semi,
      (':', _) => Token::Colon,
      (',', _) => Token::Comma,
      ('.', _) => Token::Dot,
      ('@', _) => Token::At,
      ('?', _) => Token::Question,
      ('=', _) => Token::Assign,
      ('<', _) => Token::Lt,
      ('>', _) => Token::Gt,
      ('!', _) => Token::Not,
      ('+', _) => Token::Plus,
      ('-', _) => Token::Minus,
      ('*', _) => Token::Star,
      ('/', _) => Token::Slash,
      ('$', Some('{')) => {
        return Err(self.error(start, start + 2, "dynamic attributes are not supported"))
      }
      (c, _) => {
        return Err(self.error(
          start,
          start + c.len_utf8(),
          format!("unexpected character `{}'", c),
        ))
      }
    };
    Ok(Some((start, tok, start + c.len_utf8())))
  }

  fn number(&mut self, start: usize) -> Result<Spanned, ParseError> {
    let mut end = start;
    while let Some((i, c)) = self.chars.peek().copied() {
      if c.is_ascii_digit() {
        end = i + 1;
        self.chars.next();
      } else {
        break;
      }
    }
    let n = self.input[start..end]
      .parse()
      .map_err(|_| self.error(start, end, "integer literal out of range"))?;
    Ok((start, Token::Int(n), end))
  }

  fn path(&mut self, start: usize) -> Spanned {
    self.path_from(start)
  }

  fn path_from(&mut self, start: usize) -> Spanned {
    let mut end = start;
    while let Some((i, c)) = self.chars.peek().copied() {
      if is_path_char(c) || (i == start && c == '~') {
        end = i + c.len_utf8();
        self.chars.next();
      } else {
        break;
      }
    }
    (start, Token::Path(self.input[start..end].to_owned()), end)
  }

  fn string(&mut self, start: usize) -> Result<Spanned, ParseError> {
    self.chars.next();
    let mut buf = String::new();
    loop {
      match self.chars.next() {
        None => return Err(self.error(start, self.input.len(), "unterminated string")),
        Some((end, '"')) => return Ok((start, Token::Str(buf), end + 1)),
        Some((i, '\\')) => match self.chars.next() {
          Some((_, 'n')) => buf.push('\n'),
          Some((_, 't')) => buf.push('\t'),
          Some((_, 'r')) => buf.push('\r'),
          Some((_, c)) => buf.push(c),
          None => return Err(self.error(i, i + 1, "unterminated string")),
        },
        Some((i, '$')) if self.peek_at(i + 1) == Some('{') => {
          return Err(self.error(i, i + 2, "string interpolation is not supported"))
        }
        Some((_, c)) => buf.push(c),
      }
    }
  }

  fn indented_string(&mut self, start: usize) -> Result<Spanned, ParseError> {
    self.chars.next();
    self.chars.next();
    let mut raw = String::new();
    loop {
      match self.chars.next() {
        None => return Err(self.error(start, self.input.len(), "unterminated string")),
        Some((i, '\'')) if self.peek_at(i + 1) == Some('\'') => {
          self.chars.next();
          match self.chars.peek().copied() {
            Some((_, '\'')) => {
              self.chars.next();
              raw.push_str("''");
            }
            Some((_, '$')) => {
              self.chars.next();
              raw.push('$');
            }
            Some((_, '\\')) => {
              self.chars.next();
              match self.chars.next() {
                Some((_, 'n')) => raw.push('\n'),
                Some((_, 't')) => raw.push('\t'),
                Some((_, 'r')) => raw.push('\r'),
                Some((_, c)) => raw.push(c),
                None => return Err(self.error(start, self.input.len(), "unterminated string")),
              }
            }
            _ => return Ok((start, Token::Str(unindent(&raw)), i + 2)),
          }
        }
        Some((i, '$')) if self.peek_at(i + 1) == Some('{') => {
          return Err(self.error(i, i + 2, "string interpolation is not supported"))
        }
        Some((_, c)) => raw.push(c),
      }
    }
  }
}

/// Strips the indentation shared by all non-blank lines, dropping a leading
/// blank line and whitespace on the closing line.
pub fn unindent(raw: &str) -> String {
  let lines: Vec<&str> = raw.split_inclusive('\n').collect();
  let blank = |l: &str| l.chars().all(|c| c == ' ' || c == '\t' || c == '\r' || c == '\n');
  let indent = lines
    .iter()
    .filter(|l| !blank(l))
    .map(|l| l.len() - l.trim_start_matches(' ').len())
    .min()
    .unwrap_or(0);

  let mut out = String::with_capacity(raw.len());
  for (i, line) in lines.iter().enumerate() {
    if blank(line) {
      if i > 0 && line.ends_with('\n') {
        out.push('\n');
      }
      continue;
    }
    out.push_str(&line[indent..]);
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn toks(s: &str) -> Vec<Token> {
    Lexer::new(s, 0)
      .tokenize()
      .expect("lex")
      .into_iter()
      .map(|(_, t, _)| t)
      .collect()
  }

  #[test]
  fn test_paths_and_division() {
    assert_eq!(
      toks("./release.nix a / b /abs/x"),
      vec![
        Token::Path("./release.nix".into()),
        Token::Ident("a".into()),
        Token::Slash,
        Token::Ident("b".into()),
        Token::Path("/abs/x".into()),
      ]
    );
  }

  #[test]
  fn test_formals_tokens() {
    assert_eq!(
      toks("{ x, y ? 1, ... }: x // y"),
      vec![
        Token::LBrace,
        Token::Ident("x".into()),
        Token::Comma,
        Token::Ident("y".into()),
        Token::Question,
        Token::Int(1),
        Token::Comma,
        Token::Ellipsis,
        Token::RBrace,
        Token::Colon,
        Token::Ident("x".into()),
        Token::Update,
        Token::Ident("y".into()),
      ]
    );
  }

  #[test]
  fn test_comments_and_idents() {
    assert_eq!(
      toks("# hello\n foo-bar /* x */ or"),
      vec![Token::Ident("foo-bar".into()), Token::OrKw]
    );
  }

  #[test]
  fn test_unindent() {
    assert_eq!(
      unindent("\n            foo\n            bar\n            baz\n      "),
      "foo\nbar\nbaz\n"
    );
    assert_eq!(unindent("  a\n    b\n"), "a\n  b\n");
  }

  #[test]
  fn test_interpolation_rejected() {
    assert!(Lexer::new(r#""hello-${x}""#, 0).tokenize().is_err());
  }
}
