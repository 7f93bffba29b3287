use crate::{
  prelude::*,
  syntax::{
    self,
    expr::{Attrs, Expr, ExprRef, LambdaArg},
  },
};
use context::{Context, Scope, StaticScope};
use error::ErrorKind;
use std::collections::HashMap;
use thunk::{Thunk, ThunkCell, ThunkRef};
use value::Value;

pub mod builtins;
pub mod context;
pub mod derivation;
pub mod error;
mod introspect;
pub mod operators;
pub mod primop;
pub mod print;
pub mod thunk;
pub mod value;


pub struct Eval {
  toplevel: StaticScope,
  file_ids: RefCell<HashMap<PathBuf, ThunkRef>>,
  pub store: Rc<Store>,
}

impl Eval {
  pub fn new(store: Store) -> Self {
    Self {
      toplevel: builtins::base_env(),
      file_ids: Default::default(),
      store: Rc::new(store),
    }
  }

  /// Parses `path` and returns an unforced thunk for it. Each file is only
  /// loaded once per evaluator.
  pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<ThunkRef> {
    let path = path.as_ref();
    let path = path
      .canonicalize()
      .with_context(|| format!("cannot read `{}'", path.display()))?;
    if let Some(t) = self.file_ids.borrow().get(&path) {
      return Ok(t.clone());
    }
    let e = syntax::parse_from_file(&path)?;
    let t = Thunk::thunk(e, Context::new());
    self.file_ids.borrow_mut().insert(path, t.clone());
    Ok(t)
  }

  /// Parses `src` with relative paths resolved against the working directory.
  pub fn load_inline(&self, src: &str) -> Result<ThunkRef> {
    let base = std::env::current_dir()?;
    Ok(Thunk::thunk(syntax::parse_inline(src, &base)?, Context::new()))
  }

  pub fn new_string<S: Into<String>>(&self, s: S) -> ThunkRef {
    Thunk::complete(Value::string(s))
  }

  pub fn value_of<'t>(&self, t: &'t Thunk) -> Result<&'t Value> {
    if let Some(v) = t.value_ref() {
      return Ok(v);
    }
    trace!("forcing {:?}", t);
    let cell = t.take_thunk();
    match self.step_thunk(cell.clone()) {
      Ok(v) => Ok(t.put_value(v)),
      Err(e) => {
        t.restore(cell);
        Err(e)
      }
    }
  }

  pub fn value_bool_of(&self, t: &Thunk) -> Result<bool> {
    match self.value_of(t)? {
      Value::Bool(b) => Ok(*b),
      v => Err(mismatch("a Boolean", v)),
    }
  }

  pub fn value_int_of(&self, t: &Thunk) -> Result<i64> {
    match self.value_of(t)? {
      Value::Int(i) => Ok(*i),
      v => Err(mismatch("an integer", v)),
    }
  }

  pub fn value_string_of<'t>(&self, t: &'t Thunk) -> Result<&'t str> {
    match self.value_of(t)? {
      Value::String(s) => Ok(s),
      v => Err(mismatch("a string", v)),
    }
  }

  pub fn value_attrs_of<'t>(&self, t: &'t Thunk) -> Result<&'t Rc<StaticScope>> {
    match self.value_of(t)? {
      Value::AttrSet(a) => Ok(a),
      v => Err(mismatch("a set", v)),
    }
  }

  pub fn value_list_of<'t>(&self, t: &'t Thunk) -> Result<&'t [ThunkRef]> {
    match self.value_of(t)? {
      Value::List(l) => Ok(l),
      v => Err(mismatch("a list", v)),
    }
  }

  /// String conversion as done by `toString` and derivation attributes:
  /// integers, Booleans, `null` and lists are accepted as well.
  pub fn coerce_to_string(&self, t: &Thunk) -> Result<String> {
    Ok(match self.value_of(t)? {
      Value::String(s) => s.clone(),
      Value::Path(p) => p.display().to_string(),
      Value::Int(i) => i.to_string(),
      Value::Bool(true) => "1".into(),
      Value::Bool(false) | Value::Null => String::new(),
      Value::List(items) => {
        let mut parts = Vec::with_capacity(items.len());
        for item in items.iter() {
          parts.push(self.coerce_to_string(item)?);
        }
        parts.join(" ")
      }
      Value::AttrSet(a) => match a.get("outPath") {
        Some(p) => self.coerce_to_string(p)?,
        None => bail!("cannot coerce a set to a string"),
      },
      v => bail!("cannot coerce {} to a string", v.typename()),
    })
  }

  fn step_thunk(&self, cell: ThunkCell) -> Result<Value> {
    match cell {
      ThunkCell::Expr(e, c) => self.step_eval(&e, &c),
      ThunkCell::Apply(f, arg) => self.call_function(&f, arg),
      ThunkCell::Blackhole => bail!(ErrorKind::InfiniteRecursion),
    }
  }

  fn step_eval(&self, e: &ExprRef, context: &Context) -> Result<Value> {
    match &**e {
      Expr::Int(n) => Ok(Value::Int(*n)),
      Expr::Str(s) => Ok(Value::string(s.as_str())),
      Expr::Path(p) => Ok(Value::Path(p.clone())),
      Expr::Var(pos, name) => match self.lookup(name, context)? {
        Some(t) => Ok(self.value_of(&t)?.clone()),
        None => bail!(ErrorKind::UndefinedVariable {
          name: name.clone(),
          pos: *pos,
        }),
      },
      Expr::Select { pos, lhs, path, or } => {
        let mut cur = Thunk::thunk(lhs.clone(), context.clone());
        for name in path {
          let next = match self.value_of(&cur)? {
            Value::AttrSet(a) => a.get(name).cloned(),
            _ if or.is_some() => None,
            v => return Err(mismatch("a set", v)),
          };
          cur = match (next, or) {
            (Some(t), _) => t,
            (None, Some(fallback)) => return self.step_eval(fallback, context),
            (None, None) => bail!(ErrorKind::MissingAttribute {
              name: name.clone(),
              pos: *pos,
            }),
          };
        }
        Ok(self.value_of(&cur)?.clone())
      }
      Expr::HasAttr { lhs, path } => {
        let mut cur = Thunk::thunk(lhs.clone(), context.clone());
        for name in path {
          let next = match self.value_of(&cur)? {
            Value::AttrSet(a) => a.get(name).cloned(),
            _ => None,
          };
          match next {
            Some(t) => cur = t,
            None => return Ok(Value::Bool(false)),
          }
        }
        Ok(Value::Bool(true))
      }
      Expr::Lambda(l) => Ok(Value::Lambda {
        lambda: l.clone(),
        captures: context.clone(),
      }),
      Expr::Apply { pos, lhs, rhs } => {
        let f = Thunk::thunk(lhs.clone(), context.clone());
        let arg = Thunk::thunk(rhs.clone(), context.clone());
        self
          .call_function(&f, arg)
          .with_context(|| format!("while evaluating the function application at {}", pos))
      }
      Expr::List(elems) => Ok(Value::List(Rc::new(
        elems
          .iter()
          .map(|e| Thunk::thunk(e.clone(), context.clone()))
          .collect(),
      ))),
      Expr::Attrs(attrs) => {
        let env = self.build_attrs(attrs, context);
        Ok(self.value_of(&env)?.clone())
      }
      Expr::Let { attrs, body } => {
        let env = self.build_attrs(attrs, context);
        self.step_eval(body, &context.prepend(Scope::Dynamic(env)))
      }
      Expr::With { env, body } => {
        let scope = Thunk::thunk(env.clone(), context.clone());
        self.step_eval(body, &context.add_with(scope))
      }
      Expr::If { cond, rhs1, rhs2 } => {
        let c = Thunk::thunk(cond.clone(), context.clone());
        if self.value_bool_of(&c)? {
          self.step_eval(rhs1, context)
        } else {
          self.step_eval(rhs2, context)
        }
      }
      Expr::Assert { pos, cond, body } => {
        let c = Thunk::thunk(cond.clone(), context.clone());
        if self.value_bool_of(&c)? {
          self.step_eval(body, context)
        } else {
          bail!(ErrorKind::AssertionFailed(*pos))
        }
      }
      Expr::Op { pos, bin, lhs, rhs } => operators::eval_binary(self, *bin, lhs, rhs, context)
        .with_context(|| format!("while evaluating the `{}' operator at {}", bin, pos)),
      Expr::Not(e) => {
        let t = Thunk::thunk(e.clone(), context.clone());
        Ok(Value::Bool(!self.value_bool_of(&t)?))
      }
      Expr::Negate(e) => {
        let t = Thunk::thunk(e.clone(), context.clone());
        let n = self.value_int_of(&t)?;
        match n.checked_neg() {
          Some(n) => Ok(Value::Int(n)),
          None => bail!("integer overflow while negating {}", n),
        }
      }
    }
  }

  fn lookup(&self, name: &str, context: &Context) -> Result<Option<ThunkRef>> {
    for scope in &context.scopes {
      let found = match scope.as_ref() {
        Scope::Static(s) => s.get(name),
        Scope::Dynamic(t) => self.value_attrs_of(t)?.get(name),
      };
      if let Some(t) = found {
        return Ok(Some(t.clone()));
      }
    }
    if let Some(t) = self.toplevel.get(name) {
      return Ok(Some(t.clone()));
    }
    for with in &context.with {
      if let Some(t) = self.value_attrs_of(with)?.get(name) {
        return Ok(Some(t.clone()));
      }
    }
    Ok(None)
  }

  /// Applies the function in `f` to `arg`. Builtins collect arguments until
  /// their arity is reached.
  pub fn call_function(&self, f: &ThunkRef, arg: ThunkRef) -> Result<Value> {
    match self.value_of(f)? {
      Value::Lambda { lambda, captures } => self.call_lambda(lambda, captures, arg),
      Value::Primop(op, args) => {
        let mut args = args.clone();
        args.push(arg);
        if args.len() < op.arity {
          Ok(Value::Primop(op.clone(), args))
        } else {
          trace!("calling builtin {}", op.name);
          (op.op)(self, args)
        }
      }
      Value::AttrSet(a) => match a.get("__functor") {
        Some(functor) => {
          let inner = Thunk::new(ThunkCell::Apply(functor.clone(), f.clone()));
          self.call_function(&inner, arg)
        }
        None => bail!(ErrorKind::NotAFunction("a set")),
      },
      v => bail!(ErrorKind::NotAFunction(v.typename())),
    }
  }

  fn call_lambda(&self, lambda: &syntax::expr::Lambda, captures: &Context, arg: ThunkRef) -> Result<Value> {
    let mut fn_body_scope = StaticScope::new();

    match &lambda.arg {
      LambdaArg::Plain(name) => {
        fn_body_scope.insert(name.clone(), arg);
      }
      LambdaArg::Formals { name, formals } => {
        let actual = self.value_attrs_of(&arg)?.clone();
        // defaults may refer to the other formals
        let fn_scope = Thunk::new(ThunkCell::Blackhole);

        for formal in &formals.formals {
          let bound = match (actual.get(&formal.name), &formal.def) {
            (Some(t), _) => t.clone(),
            (None, Some(def)) => Thunk::thunk(
              def.clone(),
              captures.prepend(Scope::Dynamic(fn_scope.clone())),
            ),
            (None, None) => bail!(ErrorKind::MissingArgument {
              name: formal.name.clone(),
              pos: lambda.pos,
            }),
          };
          fn_body_scope.insert(formal.name.clone(), bound);
        }

        if !formals.ellipsis {
          if let Some(unexpected) = actual.keys().find(|k| !formals.has(k)) {
            bail!(ErrorKind::UnexpectedArgument {
              name: unexpected.clone(),
              pos: lambda.pos,
            });
          }
        }

        if let Some(name) = name {
          fn_body_scope.insert(name.clone(), arg.clone());
        }

        fn_scope.put_value(Value::AttrSet(Rc::new(fn_body_scope.clone())));
      }
    }

    self.step_eval(&lambda.body, &captures.prepend(Scope::Static(fn_body_scope)))
  }

  /// Allocates one thunk per binding. For recursive sets the bindings see
  /// the set itself through the returned thunk.
  fn build_attrs(&self, attrs: &Attrs, context: &Context) -> ThunkRef {
    let env = Thunk::new(ThunkCell::Blackhole);
    let recursive_scope = if attrs.recursive {
      context.prepend(Scope::Dynamic(env.clone()))
    } else {
      context.clone()
    };

    let mut binds = StaticScope::new();
    for (name, def) in &attrs.attrs {
      // `rec { inherit x; }` must not find `x` in the set it defines
      let scope = match &*def.rhs {
        Expr::Var(..) if def.inherited => context,
        _ => &recursive_scope,
      };
      binds.insert(name.clone(), Thunk::thunk(def.rhs.clone(), scope.clone()));
    }

    env.put_value(Value::AttrSet(Rc::new(binds)));
    env
  }
}

fn mismatch(expected: &'static str, got: &Value) -> Error {
  ErrorKind::TypeMismatch {
    expected,
    got: got.typename(),
  }
  .into()
}
