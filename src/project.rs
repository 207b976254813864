//! A set of interlinked sources evaluated in dependency order with per-source caching.

use crate::env::Environment;
use crate::error::{CompileError, Error, ErrorMessage};
use crate::lang::{DictEntry, Expr, ExprKind, Program, Var};
use crate::parse::parse;
use crate::path::{PathItem, PathRoot, SubvaluePath};
use crate::reducer::{eval_program, Context};
use crate::registry::Registry;
use crate::tags::{ExportData, ValueTags};
use crate::value::{Bindings, Value};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, warn};

pub type SourceId = String;

/// Maps import specifiers to source ids.
pub trait Resolver {
  fn resolve(&self, specifier: &str, from: &str) -> anyhow::Result<SourceId>;

  /// Source text for an id the project does not have yet.
  fn load_source(&self, _id: &str) -> anyhow::Result<Option<String>> {
    Ok(None)
  }
}

/// Everything one source produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
  pub result: Value,
  /// Bindings inherited through continues followed by the source's own.
  pub bindings: IndexMap<String, Value>,
  pub exports: IndexMap<String, Value>,
}

impl RunOutput {
  pub fn value_at(&self, path: &SubvaluePath) -> Option<Value> {
    let (head, rest) = match path.root {
      PathRoot::Result => return self.result.subvalue_by_path(&path.items),
      PathRoot::Bindings => (&self.bindings, &path.items),
      PathRoot::Exports => (&self.exports, &path.items),
    };
    match rest.split_first() {
      None => Some(Value::from_map(head.clone())),
      Some((PathItem::Key(k), rest)) => head.get(k)?.subvalue_by_path(rest),
      Some((PathItem::Index(_), _)) => None,
    }
  }
}

#[derive(Debug, Clone)]
struct ResolvedImport {
  var: Var,
  id: SourceId,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectItem {
  source: String,
  ast: Option<Result<Rc<Program>, Error>>,
  imports: Option<Result<Vec<ResolvedImport>, Error>>,
  continues: Vec<SourceId>,
  result: Option<Result<RunOutput, Error>>,
}

impl ProjectItem {
  fn new(source: String) -> Self {
    ProjectItem {
      source,
      ..Default::default()
    }
  }

  pub fn source(&self) -> &str {
    &self.source
  }

  pub fn is_dirty(&self) -> bool {
    self.result.is_none()
  }

  fn clear_source_caches(&mut self) {
    self.ast = None;
    self.imports = None;
    self.result = None;
  }
}

pub struct Project {
  items: IndexMap<SourceId, ProjectItem>,
  registry: Rc<Registry>,
  env: Environment,
  resolver: Option<Box<dyn Resolver>>,
}

impl Default for Project {
  fn default() -> Self {
    Project::new()
  }
}

impl Project {
  pub fn new() -> Self {
    Project::with_registry(Registry::standard())
  }

  pub fn with_registry(registry: Registry) -> Self {
    Project {
      items: IndexMap::new(),
      registry: Rc::new(registry),
      env: Environment::default(),
      resolver: None,
    }
  }

  pub fn source_ids(&self) -> Vec<SourceId> {
    self.items.keys().cloned().collect()
  }

  pub fn item(&self, id: &str) -> Option<&ProjectItem> {
    self.items.get(id)
  }

  pub fn source(&self, id: &str) -> Option<&str> {
    self.items.get(id).map(ProjectItem::source)
  }

  /// Replaces the text of a source, adding it if needed. The source and everything depending on it
  /// must run again.
  pub fn set_source(&mut self, id: &str, source: impl Into<String>) {
    let source = source.into();
    match self.items.get_mut(id) {
      Some(item) if item.source == source => return,
      Some(item) => {
        item.source = source;
        item.clear_source_caches();
      }
      None => {
        self.items.insert(id.to_string(), ProjectItem::new(source));
      }
    }
    debug!(source_id = id, "source set");
    self.invalidate_dependents(id);
  }

  pub fn remove_source(&mut self, id: &str) {
    if self.items.shift_remove(id).is_some() {
      debug!(source_id = id, "source removed");
      self.invalidate_dependents(id);
    }
  }

  /// Forces a source and its dependents to run again without changing any text.
  pub fn touch_source(&mut self, id: &str) {
    self.clean(id);
    self.invalidate_dependents(id);
  }

  pub fn set_continues(&mut self, id: &str, continues: Vec<SourceId>) {
    if let Some(item) = self.items.get_mut(id) {
      item.continues = continues;
      item.result = None;
    }
    self.invalidate_dependents(id);
  }

  pub fn get_continues(&self, id: &str) -> Vec<SourceId> {
    self.items.get(id).map(|item| item.continues.clone()).unwrap_or_default()
  }

  pub fn set_environment(&mut self, env: Environment) {
    if env != self.env {
      self.env = env;
      self.clean_all();
    }
  }

  pub fn environment(&self) -> &Environment {
    &self.env
  }

  pub fn set_resolver(&mut self, resolver: impl Resolver + 'static) {
    self.resolver = Some(Box::new(resolver));
    for item in self.items.values_mut() {
      item.imports = None;
      item.result = None;
    }
  }

  pub fn clean(&mut self, id: &str) {
    if let Some(item) = self.items.get_mut(id) {
      item.result = None;
    }
  }

  pub fn clean_all(&mut self) {
    for item in self.items.values_mut() {
      item.result = None;
    }
  }

  pub fn output(&self, id: &str) -> Option<&Result<RunOutput, Error>> {
    self.items.get(id)?.result.as_ref()
  }

  /// `None` while the source has not run.
  pub fn result(&self, id: &str) -> Option<Result<Value, Error>> {
    self.output(id).map(|out| out.clone().map(|o| o.result))
  }

  pub fn bindings(&self, id: &str) -> Option<Result<IndexMap<String, Value>, Error>> {
    self.output(id).map(|out| out.clone().map(|o| o.bindings))
  }

  pub fn exports(&self, id: &str) -> Option<Result<IndexMap<String, Value>, Error>> {
    self.output(id).map(|out| out.clone().map(|o| o.exports))
  }

  fn program(&mut self, id: &str) -> Result<Rc<Program>, Error> {
    let item = self
      .items
      .get_mut(id)
      .ok_or_else(|| ErrorMessage::internal(format!("unknown source {}", id)))?;
    match &item.ast {
      Some(parsed) => parsed.clone(),
      None => {
        let parsed = parse(&item.source).map(Rc::new).map_err(Error::new);
        item.ast = Some(parsed.clone());
        parsed
      }
    }
  }

  fn resolve_import(&self, specifier: &str, from: &str) -> Result<SourceId, Error> {
    let resolver = self.resolver.as_ref().ok_or_else(|| CompileError::ImportResolution {
      specifier: specifier.to_string(),
      reason: "no resolver configured".to_string(),
    })?;
    resolver.resolve(specifier, from).map_err(|e| {
      CompileError::ImportResolution {
        specifier: specifier.to_string(),
        reason: format!("{:#}", e),
      }
      .into()
    })
  }

  /// Asks the resolver for sources that imports name but the project lacks.
  fn load_missing(&mut self, id: &str) -> Result<(), Error> {
    if self.items.contains_key(id) {
      return Ok(());
    }
    let loaded = match &self.resolver {
      Some(resolver) => resolver.load_source(id).map_err(|e| CompileError::ImportResolution {
        specifier: id.to_string(),
        reason: format!("{:#}", e),
      })?,
      None => None,
    };
    if let Some(source) = loaded {
      debug!(source_id = id, "loaded source through resolver");
      self.items.insert(id.to_string(), ProjectItem::new(source));
    }
    Ok(())
  }

  fn resolved_imports(&mut self, id: &str) -> Result<Vec<ResolvedImport>, Error> {
    if let Some(cached) = self.items.get(id).and_then(|item| item.imports.clone()) {
      return cached;
    }
    let program = self.program(id)?;
    let mut resolved = program
      .imports
      .iter()
      .map(|import| {
        Ok(ResolvedImport {
          var: import.var,
          id: self.resolve_import(&import.specifier, id)?,
        })
      })
      .collect::<Result<Vec<_>, Error>>();
    let ids: Vec<SourceId> = match &resolved {
      Ok(imports) => imports.iter().map(|import| import.id.clone()).collect(),
      Err(_) => Vec::new(),
    };
    if let Some(e) = ids.into_iter().find_map(|dep| self.load_missing(&dep).err()) {
      resolved = Err(e);
    }
    if let Some(item) = self.items.get_mut(id) {
      item.imports = Some(resolved.clone());
    }
    resolved
  }

  pub fn import_ids(&mut self, id: &str) -> Result<Vec<SourceId>, Error> {
    Ok(self.resolved_imports(id)?.into_iter().map(|import| import.id).collect())
  }

  /// Continues and imports. Imports that fail to resolve are left out; running the source reports them.
  pub fn dependencies(&mut self, id: &str) -> Vec<SourceId> {
    let mut deps = self.get_continues(id);
    if let Ok(imports) = self.import_ids(id) {
      for import in imports {
        if !deps.contains(&import) {
          deps.push(import);
        }
      }
    }
    deps
  }

  /// Sources that directly continue or import `id`.
  pub fn dependents(&mut self, id: &str) -> Vec<SourceId> {
    let mut out = Vec::new();
    for other in self.source_ids() {
      if self.dependencies(&other).iter().any(|dep| dep == id) {
        out.push(other);
      }
    }
    out
  }

  fn invalidate_dependents(&mut self, id: &str) {
    let mut seen = HashSet::new();
    let mut queue = vec![id.to_string()];
    while let Some(current) = queue.pop() {
      for dependent in self.dependents(&current) {
        if seen.insert(dependent.clone()) {
          self.clean(&dependent);
          queue.push(dependent);
        }
      }
    }
  }

  fn visit(
    &mut self,
    id: &str,
    stack: &mut Vec<SourceId>,
    done: &mut HashSet<SourceId>,
    order: &mut Vec<SourceId>,
  ) -> Result<(), Error> {
    if done.contains(id) {
      return Ok(());
    }
    if let Some(start) = stack.iter().position(|s| s == id) {
      let mut cycle = stack[start..].to_vec();
      cycle.push(id.to_string());
      return Err(CompileError::ImportCycle(cycle).into());
    }
    // Missing sources surface as errors when their dependents run.
    if !self.items.contains_key(id) {
      return Ok(());
    }
    stack.push(id.to_string());
    for dep in self.dependencies(id) {
      self.visit(&dep, stack, done, order)?;
    }
    stack.pop();
    done.insert(id.to_string());
    order.push(id.to_string());
    Ok(())
  }

  /// Every source, each after its dependencies.
  pub fn run_order(&mut self) -> Result<Vec<SourceId>, Error> {
    let (mut stack, mut done, mut order) = (Vec::new(), HashSet::new(), Vec::new());
    for id in self.source_ids() {
      self.visit(&id, &mut stack, &mut done, &mut order)?;
    }
    Ok(order)
  }

  /// `id` and its transitive dependencies, dependencies first.
  pub fn run_order_for(&mut self, id: &str) -> Result<Vec<SourceId>, Error> {
    let (mut stack, mut done, mut order) = (Vec::new(), HashSet::new(), Vec::new());
    self.visit(id, &mut stack, &mut done, &mut order)?;
    Ok(order)
  }

  fn is_dirty(&self, id: &str) -> bool {
    self.items.get(id).map_or(false, ProjectItem::is_dirty)
  }

  fn store(&mut self, id: &str, result: Result<RunOutput, Error>) {
    if let Err(e) = &result {
      debug!(source_id = id, error = %e.message, "source failed");
    }
    if let Some(item) = self.items.get_mut(id) {
      item.result = Some(result);
    }
  }

  /// Runs `id` after whichever of its dependencies still need to run.
  pub fn run(&mut self, id: &str) {
    if !self.items.contains_key(id) {
      warn!(source_id = id, "run requested for an unknown source");
      return;
    }
    match self.run_order_for(id) {
      Ok(order) => {
        debug!(source_id = id, ?order, "run order");
        for next in order {
          if self.is_dirty(&next) {
            self.evaluate(&next);
          } else {
            debug!(source_id = %next, "cached");
          }
        }
      }
      Err(e) => self.store(id, Err(e)),
    }
  }

  /// Evaluates one pending source, dependencies first. Returns the id it evaluated, or `None` when
  /// nothing is left to run.
  pub fn run_next(&mut self) -> Option<SourceId> {
    let pending = self.items.iter().find(|(_, item)| item.is_dirty()).map(|(id, _)| id.clone())?;
    match self.run_order_for(&pending) {
      Ok(order) => {
        let next = order
          .into_iter()
          .find(|id| self.is_dirty(id))
          .unwrap_or_else(|| pending.clone());
        self.evaluate(&next);
        Some(next)
      }
      Err(e) => {
        self.store(&pending, Err(e));
        Some(pending)
      }
    }
  }

  pub fn run_all(&mut self) {
    while self.run_next().is_some() {}
  }

  fn evaluate(&mut self, id: &str) {
    debug!(source_id = id, "evaluating");
    let result = self.compute(id);
    self.store(id, result);
  }

  fn dependency_output(&self, id: &str, dep: &str) -> Result<&RunOutput, Error> {
    match self.items.get(dep) {
      None => Err(
        CompileError::MissingDependency {
          source_id: id.to_string(),
          dependency: dep.to_string(),
        }
        .into(),
      ),
      Some(item) => match &item.result {
        Some(Ok(out)) => Ok(out),
        Some(Err(_)) => Err(CompileError::DependencyFailed(dep.to_string()).into()),
        None => Err(ErrorMessage::internal(format!("{} has not run before {}", dep, id)).into()),
      },
    }
  }

  fn compute(&mut self, id: &str) -> Result<RunOutput, Error> {
    let program = self.program(id)?;
    let imports = self.resolved_imports(id)?;
    let mut scope = Bindings::new();
    let mut bindings = IndexMap::new();
    for dep in self.get_continues(id) {
      for (name, v) in &self.dependency_output(id, &dep)?.bindings {
        scope.insert(Var::new(name), v.clone());
        bindings.insert(name.clone(), v.clone());
      }
    }
    for import in &imports {
      let exports = self.dependency_output(id, &import.id)?.exports.clone();
      scope.insert(import.var, Value::from_map(exports));
    }

    let mut ctx = Context::new(self.env.clone(), Rc::clone(&self.registry));
    let output = eval_program(&program, &scope, &mut ctx)?;
    bindings.extend(output.own);
    let exports = output
      .exports
      .into_iter()
      .map(|(name, v)| {
        let tags = ValueTags {
          export_data: Some(ExportData {
            source_id: id.to_string(),
            path: vec![name.clone()],
          }),
          ..Default::default()
        };
        (name, v.with_tags(tags))
      })
      .collect();
    Ok(RunOutput {
      result: output.result,
      bindings,
      exports,
    })
  }

  /// Path of the innermost record entry or list element written at `offset`.
  pub fn find_value_path_by_offset(&mut self, id: &str, offset: usize) -> Option<SubvaluePath> {
    let program = self.program(id).ok()?;
    for stmt in &program.statements {
      if stmt.location.contains(offset) {
        let root = SubvaluePath::new(PathRoot::Bindings, vec![PathItem::Key(stmt.var.name())]);
        return Some(descend(stmt.value_expr(), offset, root));
      }
    }
    let result = program.result.as_ref()?;
    if result.location.contains(offset) {
      return Some(descend(result, offset, SubvaluePath::new(PathRoot::Result, Vec::new())));
    }
    None
  }

  pub fn find_value_by_offset(&mut self, id: &str, offset: usize) -> Option<Value> {
    let path = self.find_value_path_by_offset(id, offset)?;
    match self.output(id)? {
      Ok(out) => out.value_at(&path),
      Err(_) => None,
    }
  }
}

fn descend(e: &Expr, offset: usize, path: SubvaluePath) -> SubvaluePath {
  match &e.kind {
    ExprKind::Dict(entries) => {
      for entry in entries {
        if let DictEntry::KeyValue {
          key,
          key_location,
          value,
        } = entry
        {
          if key_location.contains(offset) || value.location.contains(offset) {
            return descend(value, offset, path.extend(PathItem::Key(key.clone())));
          }
        }
      }
      path
    }
    ExprKind::Array(es) => match es.iter().position(|e| e.location.contains(offset)) {
      Some(i) => descend(&es[i], offset, path.extend(PathItem::Index(i))),
      None => path,
    },
    _ => path,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::{FnEntry, RegistryBuilder};
  use anyhow::anyhow;
  use maplit::hashmap;
  use std::cell::Cell;
  use std::collections::HashMap;

  struct Identity;

  impl Resolver for Identity {
    fn resolve(&self, specifier: &str, _from: &str) -> anyhow::Result<SourceId> {
      Ok(specifier.to_string())
    }
  }

  struct Files(HashMap<&'static str, &'static str>);

  impl Resolver for Files {
    fn resolve(&self, specifier: &str, _from: &str) -> anyhow::Result<SourceId> {
      if self.0.contains_key(specifier) {
        Ok(specifier.to_string())
      } else {
        Err(anyhow!("no file {}", specifier))
      }
    }

    fn load_source(&self, id: &str) -> anyhow::Result<Option<String>> {
      Ok(self.0.get(id).map(|s| s.to_string()))
    }
  }

  fn number(p: &Project, id: &str) -> f64 {
    p.result(id).unwrap().unwrap().as_number().unwrap()
  }

  #[test]
  fn continues_inherit_bindings() {
    let mut p = Project::new();
    p.set_source("a", "x = 1");
    p.set_source("b", "y = x + 1\ny * 10");
    p.set_continues("b", vec!["a".into()]);
    p.run("b");
    assert_eq!(number(&p, "b"), 20.0);
    let bindings = p.bindings("b").unwrap().unwrap();
    assert_eq!(bindings.keys().collect::<Vec<_>>(), vec!["x", "y"]);
    assert_eq!(p.dependents("a"), vec!["b".to_string()]);
  }

  #[test]
  fn imports_bind_export_records() {
    let mut p = Project::new();
    p.set_resolver(Identity);
    p.set_source("lib", "export double(x) = x * 2\nhelper = 3");
    p.set_source("main", "import \"lib\" as lib\nlib.double(21)");
    assert_eq!(p.run_order().unwrap(), vec!["lib".to_string(), "main".to_string()]);
    p.run_all();
    assert_eq!(number(&p, "main"), 42.0);
    let exports = p.exports("lib").unwrap().unwrap();
    assert!(!exports.contains_key("helper"));
    let tags = exports["double"].tags().cloned().unwrap_or_default();
    assert_eq!(tags.export_data.map(|d| d.source_id), Some("lib".to_string()));
  }

  #[test]
  fn imports_without_resolver_fail() {
    let mut p = Project::new();
    p.set_source("main", "import \"lib\" as lib\n1");
    p.run("main");
    let err = p.result("main").unwrap().unwrap_err();
    assert!(matches!(
      err.message,
      ErrorMessage::Compile(CompileError::ImportResolution { .. })
    ));
  }

  #[test]
  fn resolver_loads_missing_sources() {
    let mut p = Project::new();
    p.set_resolver(Files(hashmap! { "consts" => "export k = 7" }));
    p.set_source("main", "import \"consts\" as c\nc.k * 2");
    p.run("main");
    assert_eq!(number(&p, "main"), 14.0);
    assert_eq!(p.source("consts"), Some("export k = 7"));

    p.set_source("other", "import \"nope\" as n\n1");
    p.run("other");
    let err = p.result("other").unwrap().unwrap_err();
    assert!(err.to_string().contains("no file nope"));
  }

  #[test]
  fn edits_invalidate_dependents() {
    let mut p = Project::new();
    p.set_source("a", "x = 1");
    p.set_source("b", "x + 1");
    p.set_source("c", "z = 0");
    p.set_continues("b", vec!["a".into()]);
    p.run_all();
    assert_eq!(number(&p, "b"), 2.0);
    p.set_source("a", "x = 5");
    assert!(p.item("b").unwrap().is_dirty());
    assert!(!p.item("c").unwrap().is_dirty());
    assert_eq!(p.run_next(), Some("a".to_string()));
    assert_eq!(p.run_next(), Some("b".to_string()));
    assert_eq!(p.run_next(), None);
    assert_eq!(number(&p, "b"), 6.0);
  }

  #[test]
  fn sources_run_once_until_touched() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let mut builder = RegistryBuilder::standard();
    builder.add(FnEntry::new("Test", "count").def(vec![], move |_, _| {
      counter.set(counter.get() + 1);
      Ok(Value::Number(counter.get() as f64))
    }));
    let mut p = Project::with_registry(builder.build());
    p.set_source("main", "Test.count()");
    p.run("main");
    p.run("main");
    assert_eq!(calls.get(), 1);
    p.touch_source("main");
    p.run("main");
    assert_eq!(calls.get(), 2);
  }

  #[test]
  fn offsets_map_to_paths() {
    let mut p = Project::new();
    let src = "a = 1\nr = {x: 5, y: [3, \"foo\"]}\nr.x";
    p.set_source("main", src);
    p.run("main");
    let offset = src.find("\"foo\"").unwrap() + 1;
    let path = p.find_value_path_by_offset("main", offset).unwrap();
    assert_eq!(path.to_string(), "bindings.r.y[1]");
    assert_eq!(p.find_value_by_offset("main", offset), Some(Value::string("foo")));
    let tail = src.len() - 1;
    assert_eq!(p.find_value_path_by_offset("main", tail).unwrap().to_string(), "result");
  }
}
