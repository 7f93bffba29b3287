use super::*;
use crate::sink::JobSink;
use anyhow::{anyhow, bail};
use assert_matches::assert_matches;
use itertools::Itertools;
use std::{cell::Cell, fmt, rc::Rc};

type Body = Rc<dyn Fn(&OrdMap<Ident, Node>) -> Node>;

/// A tiny scripted value language standing in for real evaluation.
#[derive(Clone)]
enum Node {
  Set(Vec<(Ident, Node)>),
  Drv(&'static str),
  Int(i64),
  Fail(&'static str),
  Fun(Vec<Formal>, Body),
  Plain,
  Applied(Rc<Node>, OrdMap<Ident, Node>),
}

impl fmt::Debug for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Node::Set(m) => f.debug_map().entries(m.iter().map(|(k, v)| (k, v))).finish(),
      Node::Drv(s) => write!(f, "Drv({})", s),
      Node::Int(i) => write!(f, "{}", i),
      Node::Fail(m) => write!(f, "Fail({})", m),
      Node::Fun(formals, _) => write!(f, "Fun({:?})", formals),
      Node::Plain => f.write_str("Plain"),
      Node::Applied(fun, args) => write!(f, "Applied({:?}, {:?})", fun, args),
    }
  }
}

fn set(members: Vec<(&str, Node)>) -> Node {
  Node::Set(members.into_iter().map(|(k, v)| (Ident::from(k), v)).collect())
}

fn fun<F: Fn(&OrdMap<Ident, Node>) -> Node + 'static>(formals: &[(&str, bool)], body: F) -> Node {
  Node::Fun(
    formals.iter().map(|(n, d)| Formal::new(*n, *d)).collect(),
    Rc::new(body),
  )
}

#[derive(Default)]
struct Mock {
  applications: Cell<usize>,
}

impl Mock {
  fn apply(&self, fun: &Node, args: &OrdMap<Ident, Node>) -> anyhow::Result<Node> {
    match fun {
      Node::Fun(_, body) => Ok(body(args)),
      Node::Applied(..) => self.apply(&self.resolve(fun)?, args),
      n => bail!("cannot apply {:?}", n),
    }
  }

  fn resolve(&self, node: &Node) -> anyhow::Result<Node> {
    match node {
      Node::Applied(fun, args) => {
        let result = self.apply(fun, args)?;
        self.resolve(&result)
      }
      Node::Fail(msg) => Err(anyhow!(*msg).context("while evaluating a mock value")),
      n => Ok(n.clone()),
    }
  }
}

impl Evaluator for Mock {
  type Expr = Node;

  fn force(&self, expr: &Node) -> anyhow::Result<Shape<Node>> {
    Ok(match self.resolve(expr)? {
      Node::Set(members) => Shape::AttrSet(members),
      Node::Drv(_) => Shape::AttrSet(vec![]),
      Node::Fun(formals, _) => Shape::Function(Pattern::Formals(formals)),
      Node::Plain => Shape::Function(Pattern::Plain),
      Node::Int(_) => Shape::Scalar,
      Node::Fail(_) | Node::Applied(..) => unreachable!("resolved"),
    })
  }

  fn call_with_args(&self, fun: &Node, args: &OrdMap<Ident, Node>) -> Node {
    self.applications.set(self.applications.get() + 1);
    Node::Applied(Rc::new(fun.clone()), args.clone())
  }

  fn show(&self, expr: &Node) -> String {
    match self.resolve(expr) {
      Ok(Node::Int(i)) => i.to_string(),
      Ok(Node::Plain) | Ok(Node::Fun(..)) => "<LAMBDA>".into(),
      Ok(n) => format!("{:?}", n),
      Err(e) => format!("«error: {}»", e.root_cause()),
    }
  }
}

impl Introspect for Mock {
  fn derivation(&self, expr: &Node) -> anyhow::Result<Option<DrvInfo>> {
    Ok(match self.resolve(expr)? {
      Node::Drv(system) => Some(DrvInfo {
        system: system.into(),
        drv_path: format!("/nix/store/{}.drv", system),
        ..Default::default()
      }),
      _ => None,
    })
  }
}

fn args(candidates: &[(&str, i64)]) -> ArgumentSet<Node> {
  let mut args = ArgumentSet::new();
  for (name, value) in candidates {
    args.push_candidate(Ident::from(*name), Node::Int(*value));
  }
  args
}

fn walk(args: &ArgumentSet<Node>, root: &Node) -> Vec<Record> {
  let mut records = vec![];
  JobFinder::new(&Mock::default(), &mut records)
    .run(args, root)
    .expect("in-memory sink never fails");
  records
}

fn used(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
  pairs
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn summary(records: &[Record]) -> Vec<(&'static str, String, BTreeMap<String, String>)> {
  records
    .iter()
    .map(|r| {
      let kind = match r {
        Record::Job(_) => "job",
        Record::Error(_) => "error",
      };
      (kind, r.location().to_owned(), r.args_used().clone())
    })
    .collect()
}

fn message(record: &Record) -> &str {
  match record {
    Record::Error(e) => &e.msg,
    Record::Job(j) => panic!("expected an error, got job {}", j.name),
  }
}

#[test]
fn test_expands_candidates() {
  let root = set(vec![
    ("a", Node::Drv("x86_64-linux")),
    ("b", fun(&[("x", false), ("y", false)], |_| Node::Drv("i686-linux"))),
  ]);
  let records = walk(&args(&[("x", 1), ("x", 2), ("y", 3)]), &root);

  assert_eq!(
    summary(&records),
    vec![
      ("job", "a".into(), used(&[])),
      ("job", "b".into(), used(&[("x", "1"), ("y", "3")])),
      ("job", "b".into(), used(&[("x", "2"), ("y", "3")])),
    ]
  );
  assert_matches!(&records[0], Record::Job(j) => {
    assert_eq!(j.system, "x86_64-linux");
    assert_eq!(j.drv_path, "/nix/store/x86_64-linux.drv");
  });
}

#[test]
fn test_errors_are_isolated() {
  let root = set(vec![
    ("a", Node::Fail("boom")),
    ("b", Node::Drv("x")),
    (
      "c",
      set(vec![("d", Node::Fail("inner")), ("e", Node::Drv("y"))]),
    ),
  ]);
  let records = walk(&ArgumentSet::new(), &root);

  assert_eq!(
    summary(&records),
    vec![
      ("error", "a".into(), used(&[])),
      ("job", "b".into(), used(&[])),
      ("error", "c.d".into(), used(&[])),
      ("job", "c.e".into(), used(&[])),
    ]
  );
  assert_eq!(message(&records[0]), "boom");
  assert_eq!(message(&records[2]), "inner");
}

#[test]
fn test_failing_root() {
  let records = walk(&ArgumentSet::new(), &Node::Fail("no"));
  assert_eq!(summary(&records), vec![("error", String::new(), used(&[]))]);
}

#[test]
fn test_show_trace() {
  let mock = Mock::default();
  let mut records = vec![];
  JobFinder::new(&mock, &mut records)
    .show_trace(true)
    .run(&ArgumentSet::new(), &set(vec![("a", Node::Fail("boom"))]))
    .unwrap();
  assert_eq!(message(&records[0]), "while evaluating a mock value: boom");
}

#[test]
fn test_unknown_values() {
  let root = set(vec![("plain", Node::Plain), ("n", Node::Int(7))]);
  let records = walk(&ArgumentSet::new(), &root);
  assert_eq!(message(&records[0]), "unknown value: <LAMBDA>");
  assert_eq!(message(&records[1]), "unknown value: 7");
  assert_eq!(records[1].location(), "n");
}

#[test]
fn test_unbound_formal_reported_per_combination() {
  let root = set(vec![(
    "b",
    fun(&[("x", false), ("z", false)], |_| Node::Drv("x")),
  )]);
  let records = walk(&args(&[("x", 1), ("x", 2)]), &root);

  assert_eq!(
    summary(&records),
    vec![
      ("error", "b".into(), used(&[("x", "1")])),
      ("error", "b".into(), used(&[("x", "2")])),
    ]
  );
  assert_eq!(
    message(&records[0]),
    "cannot auto-call a function that has an argument without a default value (`z')"
  );
}

#[test]
fn test_defaults_are_left_unbound() {
  let root = fun(&[("x", true), ("y", false)], |args| {
    if args.contains_key("x") {
      Node::Fail("default was overridden")
    } else {
      Node::Drv("x")
    }
  });
  let records = walk(&args(&[("y", 5)]), &root);
  assert_eq!(summary(&records), vec![("job", String::new(), used(&[("y", "5")]))]);
}

#[test]
fn test_candidates_override_defaults() {
  let root = fun(&[("x", true)], |args| match args.get("x") {
    Some(Node::Int(1)) => Node::Drv("x"),
    _ => Node::Fail("wrong argument"),
  });
  let records = walk(&args(&[("x", 1)]), &root);
  assert_eq!(summary(&records), vec![("job", String::new(), used(&[("x", "1")]))]);
}

#[test]
fn test_consumed_arguments_are_not_reused() {
  let inner = fun(&[("x", false), ("y", false)], |_| Node::Drv("x"));
  let root = set(vec![("f", fun(&[("x", false)], move |_| inner.clone()))]);
  let records = walk(&args(&[("x", 1), ("y", 2)]), &root);

  assert_eq!(
    summary(&records),
    vec![("error", "f".into(), used(&[("x", "1")]))]
  );
  assert_matches!(message(&records[0]), m if m.contains("(`x')"));

  let inner = fun(&[("x", true), ("y", false)], |_| Node::Drv("x"));
  let root = set(vec![("f", fun(&[("x", false)], move |_| inner.clone()))]);
  let records = walk(&args(&[("x", 1), ("y", 2)]), &root);
  assert_eq!(
    summary(&records),
    vec![("job", "f".into(), used(&[("x", "1"), ("y", "2")]))]
  );
}

#[test]
fn test_application_is_lazy() {
  let mock = Mock::default();
  let root = set(vec![(
    "f",
    fun(&[("x", false)], |args| match args.get("x") {
      Some(Node::Int(2)) => Node::Fail("second"),
      _ => Node::Drv("x"),
    }),
  )]);
  let mut records = vec![];
  JobFinder::new(&mock, &mut records)
    .run(&args(&[("x", 1), ("x", 2), ("x", 3)]), &root)
    .unwrap();

  assert_eq!(mock.applications.get(), 3);
  assert_eq!(
    summary(&records),
    vec![
      ("job", "f".into(), used(&[("x", "1")])),
      ("error", "f".into(), used(&[("x", "2")])),
      ("job", "f".into(), used(&[("x", "3")])),
    ]
  );
}

struct FailAfter {
  records: Vec<Record>,
  limit: usize,
}

impl JobSink for FailAfter {
  fn job(&mut self, job: &Job) -> anyhow::Result<()> {
    if self.records.len() == self.limit {
      bail!("disk full");
    }
    self.records.push(Record::Job(job.clone()));
    Ok(())
  }

  fn error(&mut self, error: &EvalError) -> anyhow::Result<()> {
    if self.records.len() == self.limit {
      bail!("disk full");
    }
    self.records.push(Record::Error(error.clone()));
    Ok(())
  }

  fn finish(&mut self) -> anyhow::Result<()> {
    Ok(())
  }
}

#[test]
fn test_sink_failure_stops_walk() {
  let root = set(vec![
    ("a", Node::Drv("x")),
    ("b", Node::Fail("b")),
    ("c", Node::Drv("y")),
  ]);
  let mut sink = FailAfter {
    records: vec![],
    limit: 1,
  };
  let err = JobFinder::new(&Mock::default(), &mut sink)
    .run(&ArgumentSet::new(), &root)
    .unwrap_err();
  assert_eq!(err.to_string(), "disk full");
  assert_eq!(sink.records.len(), 1);
}

#[test]
fn test_sink_failure_while_recording_an_error() {
  let root = set(vec![("a", Node::Fail("a")), ("b", Node::Drv("y"))]);
  let mut sink = FailAfter {
    records: vec![],
    limit: 0,
  };
  let err = JobFinder::new(&Mock::default(), &mut sink)
    .run(&ArgumentSet::new(), &root)
    .unwrap_err();
  assert_eq!(err.to_string(), "disk full");
  assert!(sink.records.is_empty());
}

proptest::proptest! {
  #[test]
  fn test_cartesian_product_order(counts in proptest::collection::vec(1usize..4, 1..4)) {
    let names: Vec<String> = (0..counts.len()).map(|i| format!("a{}", i)).collect();
    let mut candidates = ArgumentSet::new();
    for (name, count) in names.iter().zip(&counts) {
      for v in 0..*count {
        candidates.push_candidate(Ident::from(name.as_str()), Node::Int(v as i64));
      }
    }
    let formals: Vec<(&str, bool)> = names.iter().map(|n| (n.as_str(), false)).collect();
    let root = fun(&formals, |_| Node::Drv("x"));

    let expected: Vec<BTreeMap<String, String>> = counts
      .iter()
      .map(|c| 0..*c)
      .multi_cartesian_product()
      .map(|combo| {
        names
          .iter()
          .cloned()
          .zip(combo.into_iter().map(|v| v.to_string()))
          .collect()
      })
      .collect();

    let records = walk(&candidates, &root);
    let actual: Vec<BTreeMap<String, String>> =
      records.iter().map(|r| r.args_used().clone()).collect();
    proptest::prop_assert_eq!(records.len(), counts.iter().product::<usize>());
    proptest::prop_assert_eq!(actual, expected);
  }
}
