use super::{
  expr::*,
  lexer::{Spanned, Token},
  Pos,
};
use codespan_reporting::diagnostic::{Diagnostic, Label};
use std::{
  ops::Range,
  path::{Path, PathBuf},
  rc::Rc,
};

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
  pub file: usize,
  pub span: Range<usize>,
  pub message: String,
}

impl ParseError {
  pub fn new<S: Into<String>>(file: usize, span: Range<usize>, message: S) -> Self {
    Self {
      file,
      span,
      message: message.into(),
    }
  }

  pub fn diagnose(&self) -> Diagnostic<usize> {
    Diagnostic::error()
      .with_code("PARSE")
      .with_message("syntax error")
      .with_labels(vec![
        Label::primary(self.file, self.span.clone()).with_message(&self.message)
      ])
  }
}

type PResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
  file: usize,
  base_path: &'a Path,
  tokens: Vec<Spanned>,
  pos: usize,
  eof: usize,
}

impl<'a> Parser<'a> {
  pub fn new(file: usize, base_path: &'a Path, tokens: Vec<Spanned>, eof: usize) -> Self {
    Self {
      file,
      base_path,
      tokens,
      pos: 0,
      eof,
    }
  }

  pub fn parse(mut self) -> PResult<ExprRef> {
    let e = self.expr()?;
    match self.tokens.get(self.pos) {
      None => Ok(e),
      Some((s, t, end)) => Err(ParseError::new(
        self.file,
        *s..*end,
        format!("unexpected {}, expected end of input", t),
      )),
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.peek_nth(0)
  }

  fn peek_nth(&self, n: usize) -> Option<&Token> {
    self.tokens.get(self.pos + n).map(|(_, t, _)| t)
  }

  fn at(&self, t: &Token) -> bool {
    self.peek() == Some(t)
  }

  fn start(&self) -> usize {
    self.tokens.get(self.pos).map_or(self.eof, |(s, _, _)| *s)
  }

  fn last_end(&self) -> usize {
    if self.pos == 0 {
      0
    } else {
      self.tokens[self.pos - 1].2
    }
  }

  fn pos_from(&self, start: usize) -> Pos {
    Pos {
      file: self.file,
      start,
      end: self.last_end().max(start),
    }
  }

  fn bump(&mut self) -> Option<Token> {
    let t = self.tokens.get(self.pos).map(|(_, t, _)| t.clone());
    if t.is_some() {
      self.pos += 1;
    }
    t
  }

  fn eat(&mut self, t: &Token) -> bool {
    if self.at(t) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn unexpected<T>(&self, expected: &str) -> PResult<T> {
    Err(match self.tokens.get(self.pos) {
      Some((s, t, e)) => ParseError::new(
        self.file,
        *s..*e,
        format!("unexpected {}, expected {}", t, expected),
      ),
      None => ParseError::new(
        self.file,
        self.eof..self.eof,
        format!("unexpected end of input, expected {}", expected),
      ),
    })
  }

  fn expect(&mut self, t: Token) -> PResult<()> {
    if self.eat(&t) {
      Ok(())
    } else {
      self.unexpected(&t.to_string())
    }
  }

  fn ident(&mut self) -> PResult<Ident> {
    match self.peek() {
      Some(Token::Ident(i)) => {
        let i = Ident::from(i.as_str());
        self.pos += 1;
        Ok(i)
      }
      _ => self.unexpected("identifier"),
    }
  }

  fn expr(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    match (self.peek(), self.peek_nth(1)) {
      (Some(Token::Ident(_)), Some(Token::Colon)) => {
        let name = self.ident()?;
        self.pos += 1;
        let body = self.expr()?;
        Ok(self.lambda(start, LambdaArg::Plain(name), body))
      }
      (Some(Token::Ident(_)), Some(Token::At)) => {
        let name = self.ident()?;
        self.pos += 1;
        let formals = self.formals()?;
        self.expect(Token::Colon)?;
        let body = self.expr()?;
        Ok(self.lambda(
          start,
          LambdaArg::Formals {
            name: Some(name),
            formals,
          },
          body,
        ))
      }
      (Some(Token::LBrace), _) if self.at_formals() => {
        let formals = self.formals()?;
        let name = if self.eat(&Token::At) {
          Some(self.ident()?)
        } else {
          None
        };
        self.expect(Token::Colon)?;
        let body = self.expr()?;
        Ok(self.lambda(start, LambdaArg::Formals { name, formals }, body))
      }
      (Some(Token::Assert), _) => {
        self.pos += 1;
        let cond = self.expr()?;
        let pos = self.pos_from(start);
        self.expect(Token::Semi)?;
        let body = self.expr()?;
        Ok(Rc::new(Expr::Assert { pos, cond, body }))
      }
      (Some(Token::With), _) => {
        self.pos += 1;
        let env = self.expr()?;
        self.expect(Token::Semi)?;
        let body = self.expr()?;
        Ok(Rc::new(Expr::With { env, body }))
      }
      (Some(Token::Let), _) => {
        self.pos += 1;
        let mut attrs = self.binds(&Token::In)?;
        attrs.recursive = true;
        self.expect(Token::In)?;
        let body = self.expr()?;
        Ok(Rc::new(Expr::Let { attrs, body }))
      }
      (Some(Token::If), _) => {
        self.pos += 1;
        let cond = self.expr()?;
        self.expect(Token::Then)?;
        let rhs1 = self.expr()?;
        self.expect(Token::Else)?;
        let rhs2 = self.expr()?;
        Ok(Rc::new(Expr::If { cond, rhs1, rhs2 }))
      }
      _ => self.op_impl(),
    }
  }

  fn lambda(&self, start: usize, arg: LambdaArg, body: ExprRef) -> ExprRef {
    Rc::new(Expr::Lambda(Rc::new(Lambda {
      pos: self.pos_from(start),
      arg,
      body,
    })))
  }

  /// Distinguishes `{ a, b ? x }:` from an attribute set literal without
  /// backtracking.
  fn at_formals(&self) -> bool {
    match (self.peek_nth(1), self.peek_nth(2)) {
      (Some(Token::RBrace), Some(Token::Colon)) | (Some(Token::RBrace), Some(Token::At)) => true,
      (Some(Token::Ellipsis), _) => true,
      (Some(Token::Ident(_)), Some(Token::Comma))
      | (Some(Token::Ident(_)), Some(Token::Question)) => true,
      (Some(Token::Ident(_)), Some(Token::RBrace)) => matches!(
        self.peek_nth(3),
        Some(Token::Colon) | Some(Token::At)
      ),
      _ => false,
    }
  }

  fn formals(&mut self) -> PResult<Formals> {
    self.expect(Token::LBrace)?;
    let mut formals = Formals::default();
    loop {
      match self.peek() {
        Some(Token::RBrace) => {
          self.pos += 1;
          return Ok(formals);
        }
        Some(Token::Ellipsis) => {
          self.pos += 1;
          formals.ellipsis = true;
          self.expect(Token::RBrace)?;
          return Ok(formals);
        }
        Some(Token::Ident(_)) => {
          let start = self.start();
          let name = self.ident()?;
          if formals.has(&name) {
            return Err(ParseError::new(
              self.file,
              start..self.last_end(),
              format!("duplicate formal function argument `{}'", name),
            ));
          }
          let def = if self.eat(&Token::Question) {
            Some(self.expr()?)
          } else {
            None
          };
          formals.formals.push(Formal { name, def });
          if !self.eat(&Token::Comma) {
            self.expect(Token::RBrace)?;
            return Ok(formals);
          }
        }
        _ => return self.unexpected("formal argument"),
      }
    }
  }

  fn binds(&mut self, terminator: &Token) -> PResult<Attrs> {
    let mut attrs = Attrs::default();
    while !self.at(terminator) {
      let start = self.start();
      if self.eat(&Token::Inherit) {
        let from = if self.eat(&Token::LParen) {
          let e = self.expr()?;
          self.expect(Token::RParen)?;
          Some(e)
        } else {
          None
        };
        while !self.eat(&Token::Semi) {
          let name_start = self.start();
          let name = self.attr_name()?;
          let pos = self.pos_from(name_start);
          let rhs = match &from {
            Some(e) => Expr::Select {
              pos,
              lhs: e.clone(),
              path: vec![name.clone()],
              or: None,
            },
            None => Expr::Var(pos, name.clone()),
          };
          attrs
            .inherit(pos, name, rhs)
            .map_err(|m| ParseError::new(self.file, pos.start..pos.end, m))?;
        }
        continue;
      }

      let path = self.attr_path()?;
      self.expect(Token::Assign)?;
      let rhs = self.expr()?;
      let pos = self.pos_from(start);
      self.expect(Token::Semi)?;
      attrs
        .add_attr(pos, &path, rhs)
        .map_err(|m| ParseError::new(self.file, pos.start..pos.end, m))?;
    }
    Ok(attrs)
  }

  fn attr_name(&mut self) -> PResult<Ident> {
    match self.peek() {
      Some(Token::Ident(_)) => self.ident(),
      Some(Token::Str(s)) => {
        let s = Ident::from(s.as_str());
        self.pos += 1;
        Ok(s)
      }
      Some(Token::OrKw) => {
        self.pos += 1;
        Ok(Ident::from("or"))
      }
      _ => self.unexpected("attribute name"),
    }
  }

  fn attr_path(&mut self) -> PResult<AttrPath> {
    let mut path = vec![self.attr_name()?];
    while self.eat(&Token::Dot) {
      path.push(self.attr_name()?);
    }
    Ok(path)
  }

  fn binary(&self, start: usize, bin: Bin, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
    Rc::new(Expr::Op {
      pos: self.pos_from(start),
      bin,
      lhs,
      rhs,
    })
  }

  fn op_impl(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    let lhs = self.op_or()?;
    if self.eat(&Token::Impl) {
      let rhs = self.op_impl()?;
      return Ok(self.binary(start, Bin::Impl, lhs, rhs));
    }
    Ok(lhs)
  }

  fn op_or(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    let mut lhs = self.op_and()?;
    while self.eat(&Token::Or) {
      let rhs = self.op_and()?;
      lhs = self.binary(start, Bin::Or, lhs, rhs);
    }
    Ok(lhs)
  }

  fn op_and(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    let mut lhs = self.op_eq()?;
    while self.eat(&Token::And) {
      let rhs = self.op_eq()?;
      lhs = self.binary(start, Bin::And, lhs, rhs);
    }
    Ok(lhs)
  }

  fn op_eq(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    let lhs = self.op_cmp()?;
    let bin = match self.peek() {
      Some(Token::Eq) => Bin::Eq,
      Some(Token::Neq) => Bin::Neq,
      _ => return Ok(lhs),
    };
    self.pos += 1;
    let rhs = self.op_cmp()?;
    Ok(self.binary(start, bin, lhs, rhs))
  }

  fn op_cmp(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    let lhs = self.op_update()?;
    let bin = match self.peek() {
      Some(Token::Lt) => Bin::Lt,
      Some(Token::Leq) => Bin::Leq,
      Some(Token::Gt) => Bin::Gt,
      Some(Token::Geq) => Bin::Geq,
      _ => return Ok(lhs),
    };
    self.pos += 1;
    let rhs = self.op_update()?;
    Ok(self.binary(start, bin, lhs, rhs))
  }

  fn op_update(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    let lhs = self.op_not()?;
    if self.eat(&Token::Update) {
      let rhs = self.op_update()?;
      return Ok(self.binary(start, Bin::Update, lhs, rhs));
    }
    Ok(lhs)
  }

  fn op_not(&mut self) -> PResult<ExprRef> {
    if self.eat(&Token::Not) {
      return Ok(Rc::new(Expr::Not(self.op_not()?)));
    }
    self.op_add()
  }

  fn op_add(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    let mut lhs = self.op_mul()?;
    loop {
      let bin = match self.peek() {
        Some(Token::Plus) => Bin::Add,
        Some(Token::Minus) => Bin::Sub,
        _ => return Ok(lhs),
      };
      self.pos += 1;
      let rhs = self.op_mul()?;
      lhs = self.binary(start, bin, lhs, rhs);
    }
  }

  fn op_mul(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    let mut lhs = self.op_concat()?;
    loop {
      let bin = match self.peek() {
        Some(Token::Star) => Bin::Mul,
        Some(Token::Slash) => Bin::Div,
        _ => return Ok(lhs),
      };
      self.pos += 1;
      let rhs = self.op_concat()?;
      lhs = self.binary(start, bin, lhs, rhs);
    }
  }

  fn op_concat(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    let lhs = self.op_has_attr()?;
    if self.eat(&Token::Concat) {
      let rhs = self.op_concat()?;
      return Ok(self.binary(start, Bin::ConcatLists, lhs, rhs));
    }
    Ok(lhs)
  }

  fn op_has_attr(&mut self) -> PResult<ExprRef> {
    let mut lhs = self.op_negate()?;
    while self.eat(&Token::Question) {
      let path = self.attr_path()?;
      lhs = Rc::new(Expr::HasAttr { lhs, path });
    }
    Ok(lhs)
  }

  fn op_negate(&mut self) -> PResult<ExprRef> {
    if self.eat(&Token::Minus) {
      return Ok(Rc::new(Expr::Negate(self.op_negate()?)));
    }
    self.apply()
  }

  fn starts_operand(&self) -> bool {
    match self.peek() {
      Some(Token::Ident(_)) => !matches!(self.peek_nth(1), Some(Token::Colon) | Some(Token::At)),
      Some(Token::Int(_))
      | Some(Token::Str(_))
      | Some(Token::Path(_))
      | Some(Token::LParen)
      | Some(Token::LBracket)
      | Some(Token::Rec) => true,
      Some(Token::LBrace) => !self.at_formals(),
      _ => false,
    }
  }

  fn apply(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    let mut f = self.select()?;
    while self.starts_operand() {
      let arg = self.select()?;
      f = Rc::new(Expr::Apply {
        pos: self.pos_from(start),
        lhs: f,
        rhs: arg,
      });
    }
    Ok(f)
  }

  fn select(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    let lhs = self.simple()?;
    if !self.eat(&Token::Dot) {
      return Ok(lhs);
    }
    let path = self.attr_path()?;
    let pos = self.pos_from(start);
    let or = if self.eat(&Token::OrKw) {
      Some(self.select()?)
    } else {
      None
    };
    Ok(Rc::new(Expr::Select { pos, lhs, path, or }))
  }

  fn simple(&mut self) -> PResult<ExprRef> {
    let start = self.start();
    let e = match self.bump() {
      Some(Token::Int(n)) => Expr::Int(n),
      Some(Token::Str(s)) => Expr::Str(s),
      Some(Token::Path(p)) => Expr::Path(self.resolve_path(start, &p)?),
      Some(Token::Ident(i)) => Expr::Var(self.pos_from(start), Ident::from(i)),
      Some(Token::LParen) => {
        let e = self.expr()?;
        self.expect(Token::RParen)?;
        return Ok(e);
      }
      Some(Token::Rec) => {
        self.expect(Token::LBrace)?;
        let mut attrs = self.binds(&Token::RBrace)?;
        self.expect(Token::RBrace)?;
        attrs.recursive = true;
        Expr::Attrs(attrs)
      }
      Some(Token::LBrace) => {
        let attrs = self.binds(&Token::RBrace)?;
        self.expect(Token::RBrace)?;
        Expr::Attrs(attrs)
      }
      Some(Token::LBracket) => {
        let mut elems = vec![];
        while !self.eat(&Token::RBracket) {
          if self.peek().is_none() {
            return self.unexpected("`]'");
          }
          elems.push(self.select()?);
        }
        Expr::List(elems)
      }
      Some(_) => {
        self.pos -= 1;
        return self.unexpected("expression");
      }
      None => return self.unexpected("expression"),
    };
    Ok(Rc::new(e))
  }

  fn resolve_path(&self, start: usize, p: &str) -> PResult<PathBuf> {
    let joined = if let Some(rest) = p.strip_prefix("~/") {
      match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => {
          return Err(ParseError::new(
            self.file,
            start..self.last_end(),
            "cannot resolve `~' because $HOME is not set",
          ))
        }
      }
    } else {
      self.base_path.join(p)
    };
    path_abs::PathAbs::new(&joined)
      .map(|abs| PathBuf::from(abs.as_ref() as &Path))
      .map_err(|e| ParseError::new(self.file, start..self.last_end(), e.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::syntax::lexer::Lexer;
  use assert_matches::assert_matches;

  fn parse(s: &str) -> ExprRef {
    let tokens = Lexer::new(s, 0).tokenize().expect("lex");
    Parser::new(0, Path::new("/base"), tokens, s.len())
      .parse()
      .expect("parse")
  }

  #[test]
  fn test_formals_lambda() {
    let e = parse("{ x, y ? 2, ... }@args: x");
    assert_matches!(&*e, Expr::Lambda(l) => {
      assert_matches!(&l.arg, LambdaArg::Formals { name: Some(n), formals } => {
        assert_eq!(&**n, "args");
        assert!(formals.ellipsis);
        assert_eq!(formals.formals.len(), 2);
        assert!(formals.formals[0].def.is_none());
        assert!(formals.formals[1].def.is_some());
      });
    });
  }

  #[test]
  fn test_empty_set_is_not_formals() {
    assert_matches!(&*parse("{ }"), Expr::Attrs(a) if a.attrs.is_empty());
    assert_matches!(&*parse("{ }: 1"), Expr::Lambda(_));
  }

  #[test]
  fn test_nested_attr_paths_merge() {
    let e = parse("{ a.b = 1; a.c = 2; d = 3; }");
    assert_matches!(&*e, Expr::Attrs(a) => {
      assert_eq!(a.attrs.keys().map(|k| k.to_string()).collect::<Vec<_>>(), vec!["a", "d"]);
      assert_matches!(&*a.attrs["a"].rhs, Expr::Attrs(inner) if inner.attrs.len() == 2);
    });
  }

  #[test]
  fn test_duplicate_attr_is_error() {
    let tokens = Lexer::new("{ a = 1; a = 2; }", 0).tokenize().unwrap();
    assert!(Parser::new(0, Path::new("/"), tokens, 17).parse().is_err());
  }

  #[test]
  fn test_application_and_select_precedence() {
    let e = parse("f x.y or z w");
    assert_matches!(&*e, Expr::Apply { lhs, rhs, .. } => {
      assert_matches!(&**rhs, Expr::Var(_, w) if &**w == "w");
      assert_matches!(&**lhs, Expr::Apply { rhs, .. } => {
        assert_matches!(&**rhs, Expr::Select { or: Some(_), .. });
      });
    });
  }

  #[test]
  fn test_relative_path_resolution() {
    assert_matches!(&*parse("./jobs/release.nix"), Expr::Path(p) => {
      assert_eq!(p, Path::new("/base/jobs/release.nix"));
    });
  }

  #[test]
  fn test_operator_precedence() {
    assert_matches!(&*parse("1 + 2 * 3 == 7 && true"), Expr::Op { bin: Bin::And, lhs, .. } => {
      assert_matches!(&**lhs, Expr::Op { bin: Bin::Eq, lhs, .. } => {
        assert_matches!(&**lhs, Expr::Op { bin: Bin::Add, .. });
      });
    });
  }
}
