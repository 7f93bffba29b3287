use eval_jobs::{
  release::eval_release,
  settings::{ArgSpec, ArgValue, Settings},
  sink::Format,
  syntax::ParseError,
  util::*,
};
use std::path::PathBuf;

const RELEASE: &str = r#"
{ system ? "x86_64-linux" }:

let
  mk = name: derivation {
    inherit name system;
    builder = "/bin/sh";
    args = [ "-c" "echo ok > $out" ];
  };
in
{
  hello = mk "hello" // {
    meta = { description = "A <greeting>"; license = "GPL"; };
  };
  broken = throw "not today";
  pick = { n }: if n == 1 then mk "one" else throw "only one";
  tests = {
    unit = { version }: mk ("unit-" + version);
  };
}
"#;

fn release_file(contents: &str) -> Result<(tempfile::TempDir, PathBuf)> {
  let dir = tempfile::tempdir()?;
  let path = dir.path().join("release.nix");
  std::fs::write(&path, contents)?;
  Ok((dir, path))
}

fn settings(format: Format) -> Settings {
  Settings {
    store_dir: "/nix/store".into(),
    format,
    show_trace: false,
  }
}

fn arg(name: &str, value: ArgValue) -> ArgSpec {
  ArgSpec {
    name: name.into(),
    value,
  }
}

#[test]
fn test_json_document() -> Result<()> {
  let (_dir, path) = release_file(RELEASE)?;
  let args = vec![
    arg("n", ArgValue::Expr("1".into())),
    arg("version", ArgValue::Str("1.0".into())),
    arg("n", ArgValue::Expr("2".into())),
    arg("version", ArgValue::Str("2.0".into())),
  ];
  let mut out = vec![];
  eval_release(&settings(Format::Json), &args, &path, &mut out)?;

  let doc: serde_json::Value = serde_json::from_slice(&out)?;
  let records = doc.as_array().expect("an array of records");
  let summary: Vec<(String, String)> = records
    .iter()
    .map(|r| {
      let location = if r["type"] == "job" { &r["name"] } else { &r["location"] };
      (r["type"].as_str().unwrap_or_default().to_owned(), location.as_str().unwrap_or_default().to_owned())
    })
    .collect();
  let expected: Vec<(String, String)> = vec![
    ("job", "hello"),
    ("error", "broken"),
    ("job", "pick"),
    ("error", "pick"),
    ("job", "tests.unit"),
    ("job", "tests.unit"),
  ]
  .into_iter()
  .map(|(a, b)| (a.to_owned(), b.to_owned()))
  .collect();
  assert_eq!(summary, expected);

  let hello = &records[0];
  assert_eq!(hello["system"], "x86_64-linux");
  assert_eq!(hello["description"], "A <greeting>");
  assert_eq!(hello["license"], "GPL");
  assert_eq!(hello["homepage"], "");
  assert!(hello["drvPath"].as_str().unwrap().ends_with("-hello.drv"));
  assert!(hello["outPath"].as_str().unwrap().starts_with("/nix/store/"));
  assert_eq!(hello["argsUsed"], serde_json::json!({}));

  assert_eq!(records[1]["msg"], "not today");
  assert_eq!(records[2]["argsUsed"], serde_json::json!({ "n": "1" }));
  assert_eq!(records[3]["msg"], "only one");
  assert_eq!(records[3]["argsUsed"], serde_json::json!({ "n": "2" }));
  assert_eq!(records[4]["argsUsed"], serde_json::json!({ "version": "\"1.0\"" }));
  assert_eq!(records[5]["argsUsed"], serde_json::json!({ "version": "\"2.0\"" }));
  assert!(records[5]["drvPath"].as_str().unwrap().ends_with("-unit-2.0.drv"));
  Ok(())
}

#[test]
fn test_xml_document() -> Result<()> {
  let (_dir, path) = release_file(RELEASE)?;
  let args = vec![arg("n", ArgValue::Expr("1".into()))];
  let mut out = vec![];
  eval_release(&settings(Format::Xml), &args, &path, &mut out)?;
  let doc = String::from_utf8(out)?;

  assert!(doc.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
  assert!(doc.ends_with("</jobs>\n"));
  assert!(doc.contains(r#"<job name="hello" system="x86_64-linux" drvPath="/nix/store/"#));
  assert!(doc.contains(r#"description="A &lt;greeting&gt;" longDescription="" license="GPL" homepage=""/>"#));
  assert!(doc.contains(r#"<error location="broken" msg="not today"/>"#));
  assert!(doc.contains(r#"<arg name="n" value="1"/>"#));
  assert!(doc.contains(
    r#"<error location="tests.unit" msg="cannot auto-call a function that has an argument without a default value (`version&apos;)"/>"#
  ));
  Ok(())
}

#[test]
fn test_paths_are_stable() -> Result<()> {
  let (_dir, path) = release_file(RELEASE)?;
  let run = || -> Result<Vec<u8>> {
    let mut out = vec![];
    eval_release(&settings(Format::Json), &[], &path, &mut out)?;
    Ok(out)
  };
  assert_eq!(run()?, run()?);
  Ok(())
}

#[test]
fn test_store_dir_changes_paths() -> Result<()> {
  let (_dir, path) = release_file("{ a = derivation { name = \"a\"; system = \"s\"; builder = \"b\"; }; }")?;
  let mut settings = settings(Format::Json);
  settings.store_dir = "/gnu/store".into();
  let mut out = vec![];
  eval_release(&settings, &[], &path, &mut out)?;
  let doc: serde_json::Value = serde_json::from_slice(&out)?;
  assert!(doc[0]["drvPath"].as_str().unwrap().starts_with("/gnu/store/"));
  Ok(())
}

#[test]
fn test_integer_overflow_stays_with_its_member() -> Result<()> {
  let (_dir, path) = release_file(
    r#"{
      bad = -(-9223372036854775807 - 1);
      good = derivation { name = "good"; system = "x86_64-linux"; builder = "/bin/sh"; };
    }"#,
  )?;
  let mut out = vec![];
  eval_release(&settings(Format::Json), &[], &path, &mut out)?;

  let doc: serde_json::Value = serde_json::from_slice(&out)?;
  let records = doc.as_array().expect("an array of records");
  assert_eq!(records.len(), 2);
  assert_eq!(records[0]["type"], "error");
  assert_eq!(records[0]["location"], "bad");
  assert_eq!(records[0]["msg"], "integer overflow while negating -9223372036854775808");
  assert_eq!(records[1]["type"], "job");
  assert_eq!(records[1]["name"], "good");
  Ok(())
}

#[test]
fn test_setup_failures_are_fatal() -> Result<()> {
  let (_dir, path) = release_file("{ a = ; }")?;
  let mut out = vec![];
  let err = eval_release(&settings(Format::Xml), &[], &path, &mut out).unwrap_err();
  assert!(err.downcast_ref::<ParseError>().is_some());
  assert!(out.is_empty());

  let (_dir, path) = release_file(RELEASE)?;
  let bad_arg = vec![arg("n", ArgValue::Expr("{ x = ; }".into()))];
  let err = eval_release(&settings(Format::Xml), &bad_arg, &path, &mut out).unwrap_err();
  assert!(err.downcast_ref::<ParseError>().is_some());
  assert!(out.is_empty());

  let mut relative = settings(Format::Xml);
  relative.store_dir = "nix/store".into();
  assert!(eval_release(&relative, &[], &path, &mut out).is_err());
  assert!(out.is_empty());

  let missing = path.with_file_name("missing.nix");
  assert!(eval_release(&settings(Format::Xml), &[], &missing, &mut out).is_err());
  assert!(out.is_empty());
  Ok(())
}
