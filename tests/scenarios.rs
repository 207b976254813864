use approx::assert_relative_eq;
use maplit::hashmap;
use squiggle::lang::Location;
use squiggle::path::PathRoot;
use squiggle::{
  evaluate, CompileError, Environment, ErrorMessage, FnEntry, PathItem, Project, RegistryBuilder, Resolver, SourceId,
  SubvaluePath, Value,
};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

struct Identity;

impl Resolver for Identity {
  fn resolve(&self, specifier: &str, _from: &str) -> anyhow::Result<SourceId> {
    Ok(specifier.to_string())
  }
}

fn env() -> Environment {
  Environment::default().with_seed("scenarios")
}

fn project(sources: HashMap<&str, &str>) -> Project {
  let mut p = Project::new();
  p.set_resolver(Identity);
  let mut ids: Vec<_> = sources.keys().copied().collect();
  ids.sort_unstable();
  for id in ids {
    p.set_source(id, sources[id]);
  }
  p
}

#[test]
fn record_with_nested_distribution() {
  let out = evaluate("{x: 5, y: [3, \"foo\", {dist: normal(5, 2)}]}", &env()).unwrap();
  assert_eq!(out.result.to_string(), r#"{x: 5, y: [3, "foo", {dist: Normal(5,2)}]}"#);

  let path = SubvaluePath::new(PathRoot::Result, vec![
    PathItem::Key("y".into()),
    PathItem::Index(2),
    PathItem::Key("dist".into()),
  ]);
  let dist = out.value_at(&path).unwrap();
  assert_eq!(dist.type_name(), "Distribution");
  assert_relative_eq!(dist.as_dist().unwrap().mean().unwrap(), 5.0);

  let json = out.result.to_json();
  assert_eq!(json["y"][1], serde_json::json!("foo"));
}

#[test]
fn up_to_builds_an_inclusive_range() {
  let out = evaluate("List.upTo(1, 5)", &env()).unwrap();
  let expected: Vec<Value> = (1..=5).map(|i| Value::Number(i as f64)).collect();
  assert_eq!(out.result, Value::array(expected));
}

#[test]
fn log_scale_with_negative_min_is_a_domain_error() {
  let err = evaluate("Scale.log({min: -5})", &env()).unwrap_err();
  assert!(err.message.is_domain(), "{}", err);
}

#[test]
fn normal_sum_means_add() {
  let out = evaluate("mean(normal(5, 2) + normal(10, 3))", &env()).unwrap();
  assert_relative_eq!(out.result.as_number().unwrap(), 15.0, epsilon = 1e-9);
}

#[test]
fn cyclic_imports_fail_without_hanging() {
  let mut p = project(hashmap! {
    "a" => "import \"b\" as b\nx = 1",
    "b" => "import \"a\" as a\ny = 2",
  });
  assert!(p.run_order().is_err());
  p.run_all();
  for id in ["a", "b"] {
    let err = p.result(id).unwrap().unwrap_err();
    assert!(
      matches!(err.message, ErrorMessage::Compile(CompileError::ImportCycle(_))),
      "{}: {}",
      id,
      err
    );
  }
}

#[test]
fn failed_dependency_short_circuits_dependents() {
  let mut p = project(hashmap! {
    "lib" => "export x = throw(\"broken\")",
    "main" => "import \"lib\" as lib\nlib.x + 1",
  });
  p.run("main");
  assert_eq!(
    p.result("lib").unwrap().unwrap_err().message,
    ErrorMessage::User("broken".into())
  );
  assert_eq!(
    p.result("main").unwrap().unwrap_err().message,
    ErrorMessage::Compile(CompileError::DependencyFailed("lib".into()))
  );

  p.set_source("lib", "export x = 41");
  assert!(p.result("main").is_none());
  p.run("main");
  assert_eq!(p.result("main").unwrap().unwrap(), Value::Number(42.0));
}

#[test]
fn missing_imported_source_is_reported() {
  let mut p = project(hashmap! { "main" => "import \"ghost\" as g\n1" });
  p.run("main");
  let err = p.result("main").unwrap().unwrap_err();
  assert_eq!(
    err.message,
    ErrorMessage::Compile(CompileError::MissingDependency {
      source_id: "main".into(),
      dependency: "ghost".into(),
    })
  );
}

#[test]
fn dependencies_run_once_until_touched() {
  let calls = Rc::new(Cell::new(0));
  let counter = Rc::clone(&calls);
  let mut builder = RegistryBuilder::standard();
  builder.add(FnEntry::new("Test", "count").def(vec![], move |_, _| {
    counter.set(counter.get() + 1);
    Ok(Value::Number(1.0))
  }));
  let mut p = Project::with_registry(builder.build());
  p.set_resolver(Identity);
  p.set_source("lib", "export n = Test.count()");
  p.set_source("main", "import \"lib\" as lib\nlib.n * 2");
  p.set_source("other", "import \"lib\" as lib\nlib.n * 3");

  p.run("main");
  p.run("other");
  p.run("main");
  assert_eq!(calls.get(), 1);
  assert_eq!(p.result("other").unwrap().unwrap(), Value::Number(3.0));

  p.touch_source("lib");
  assert!(p.item("main").unwrap().is_dirty());
  p.run_all();
  assert_eq!(calls.get(), 2);
}

#[test]
fn recursion_depth_is_bounded() {
  let env = env().with_max_call_depth(10);
  let err = evaluate("loop(n) = loop(n + 1)\nloop(0)", &env).unwrap_err();
  assert_eq!(err.message, ErrorMessage::CallStackExceeded(10));
  assert!(err.traceback("loop(n) = loop(n + 1)\nloop(0)").contains("at loop"));
}

/// Cargo's test threads and many host workers run on 2 MB stacks.
fn on_small_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
  std::thread::Builder::new()
    .stack_size(2 << 20)
    .spawn(f)
    .unwrap()
    .join()
    .unwrap()
}

#[test]
fn default_depth_bound_holds_on_small_stacks() {
  let (runaway, deep) = on_small_stack(|| {
    let env = Environment::default();
    let runaway = evaluate("f(n) = f(n + 1)\nf(0)", &env).map(|_| ()).map_err(|e| e.message);
    let deep = evaluate("f(n) = n <= 0 ? 0 : 1 + f(n - 1)\nf(200)", &env)
      .map(|out| out.result.as_number())
      .map_err(|e| e.message);
    (runaway, deep)
  });
  assert_eq!(runaway, Err(ErrorMessage::CallStackExceeded(256)));
  assert_eq!(deep, Ok(Some(200.0)));
}

#[test]
fn deep_nesting_fails_cleanly_on_small_stacks() {
  let (sum, parens) = on_small_stack(|| {
    let env = Environment::default();
    let sum = evaluate(&vec!["1"; 3000].join(" + "), &env)
      .map(|out| out.result.as_number())
      .map_err(|e| e.message);
    let src = format!("{}1{}", "(".repeat(500), ")".repeat(500));
    let parens = evaluate(&src, &env).map(|_| ()).map_err(|e| e.message);
    (sum, parens)
  });
  assert_eq!(sum, Ok(Some(3000.0)));
  match parens {
    Err(ErrorMessage::Parse { location, .. }) => {
      assert_eq!(location, Location::new(squiggle::parse::MAX_NESTING, squiggle::parse::MAX_NESTING + 1))
    }
    other => panic!("expected a parse error, got {:?}", other),
  }
}

#[test]
fn parse_errors_carry_their_location() {
  let src = "x = 1\ny = )";
  let err = evaluate(src, &env()).unwrap_err();
  assert_eq!(err.location(), Some(Location::new(10, 11)));
  assert!(err.traceback(src).contains("(line 2, column 5)"), "{}", err.traceback(src));
}

#[test]
fn values_are_found_by_source_offset() {
  let src = "total = {count: 3, items: [normal(1, 1), 7]}\ntotal.count";
  let mut p = Project::new();
  p.set_environment(env());
  p.set_source("main", src);
  p.run("main");

  let offset = src.find('7').unwrap();
  let path = p.find_value_path_by_offset("main", offset).unwrap();
  assert_eq!(path.to_string(), "bindings.total.items[1]");
  assert_eq!(p.find_value_by_offset("main", offset), Some(Value::Number(7.0)));
  assert_eq!(p.find_value_path_by_offset("main", src.len() + 10), None);
}
