//! Typed signatures and name resolution for library functions.

use crate::error::{CompileError, Error, ErrorMessage};
use crate::reducer::Context;
use crate::value::{Lambda, Value};
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// Structural type of a function parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum FrType {
  Number,
  String,
  Bool,
  Date,
  Duration,
  Dist,
  DistOrNumber,
  SampleSet,
  PointSet,
  Lambda,
  Scale,
  Any,
  Array(Box<FrType>),
  /// A record with known fields; `Optional` fields may be absent.
  Dict(Vec<(String, FrType)>),
  DictOf(Box<FrType>),
  Optional(Box<FrType>),
  Union(Vec<FrType>),
}

impl FrType {
  pub fn array(t: FrType) -> Self {
    FrType::Array(Box::new(t))
  }

  pub fn optional(t: FrType) -> Self {
    FrType::Optional(Box::new(t))
  }

  pub fn dict_of(t: FrType) -> Self {
    FrType::DictOf(Box::new(t))
  }

  pub fn record(fields: Vec<(&str, FrType)>) -> Self {
    FrType::Dict(fields.into_iter().map(|(k, t)| (k.to_string(), t)).collect())
  }

  pub fn is_optional(&self) -> bool {
    matches!(self, FrType::Optional(_))
  }

  pub fn matches(&self, value: &Value) -> bool {
    use crate::dist::GenericDist;
    let value = value.untagged();
    match self {
      FrType::Number => matches!(value, Value::Number(_)),
      FrType::String => matches!(value, Value::String(_)),
      FrType::Bool => matches!(value, Value::Bool(_)),
      FrType::Date => matches!(value, Value::Date(_)),
      FrType::Duration => matches!(value, Value::Duration(_)),
      FrType::Dist => matches!(value, Value::Dist(_)),
      FrType::DistOrNumber => matches!(value, Value::Dist(_) | Value::Number(_)),
      FrType::SampleSet => matches!(value, Value::Dist(GenericDist::SampleSet(_))),
      FrType::PointSet => matches!(value, Value::Dist(GenericDist::PointSet(_))),
      FrType::Lambda => matches!(value, Value::Lambda(_)),
      FrType::Scale => matches!(value, Value::Scale(_)),
      FrType::Any => true,
      FrType::Array(t) => match value {
        Value::Array(xs) => xs.iter().all(|x| t.matches(x)),
        _ => false,
      },
      FrType::Dict(fields) => match value {
        Value::Dict(d) => {
          d.keys().all(|k| fields.iter().any(|(name, _)| name == k))
            && fields.iter().all(|(name, t)| match d.get(name) {
              Some(x) => t.matches(x),
              None => t.is_optional(),
            })
        }
        _ => false,
      },
      FrType::DictOf(t) => match value {
        Value::Dict(d) => d.values().all(|x| t.matches(x)),
        _ => false,
      },
      FrType::Optional(t) => value.is_void() || t.matches(value),
      FrType::Union(ts) => ts.iter().any(|t| t.matches(value)),
    }
  }
}

impl fmt::Display for FrType {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      FrType::Number => write!(f, "Number"),
      FrType::String => write!(f, "String"),
      FrType::Bool => write!(f, "Bool"),
      FrType::Date => write!(f, "Date"),
      FrType::Duration => write!(f, "Duration"),
      FrType::Dist => write!(f, "Dist"),
      FrType::DistOrNumber => write!(f, "Dist|Number"),
      FrType::SampleSet => write!(f, "SampleSetDist"),
      FrType::PointSet => write!(f, "PointSetDist"),
      FrType::Lambda => write!(f, "Function"),
      FrType::Scale => write!(f, "Scale"),
      FrType::Any => write!(f, "any"),
      FrType::Array(t) => write!(f, "List({})", t),
      FrType::Dict(fields) => {
        let parts: Vec<String> = fields
          .iter()
          .map(|(k, t)| match t {
            FrType::Optional(inner) => format!("{}?: {}", k, inner),
            t => format!("{}: {}", k, t),
          })
          .collect();
        write!(f, "{{{}}}", parts.join(", "))
      }
      FrType::DictOf(t) => write!(f, "Dict({})", t),
      FrType::Optional(t) => write!(f, "{}?", t),
      FrType::Union(ts) => {
        let parts: Vec<String> = ts.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", parts.join("|"))
      }
    }
  }
}

pub type RunFn = Rc<dyn Fn(&[Value], &mut Context) -> Result<Value, Error>>;

#[derive(Clone)]
pub struct FnDefinition {
  pub inputs: Vec<FrType>,
  pub run: RunFn,
}

impl FnDefinition {
  fn required(&self) -> usize {
    self.inputs.len() - self.inputs.iter().rev().take_while(|t| t.is_optional()).count()
  }

  /// Trailing optional parameters may be omitted.
  pub fn accepts(&self, args: &[Value]) -> bool {
    args.len() >= self.required()
      && args.len() <= self.inputs.len()
      && self.inputs.iter().zip(args).all(|(t, a)| t.matches(a))
  }

  pub fn signature(&self) -> String {
    let parts: Vec<String> = self.inputs.iter().map(|t| t.to_string()).collect();
    format!("({})", parts.join(", "))
  }
}

/// A named library function with one or more typed definitions.
#[derive(Clone)]
pub struct FnEntry {
  pub name: String,
  pub namespace: String,
  pub requires_namespace: bool,
  pub description: Option<String>,
  pub definitions: Vec<FnDefinition>,
}

pub const BUILTIN_NAMESPACE: &str = "Builtin";

impl FnEntry {
  pub fn new(namespace: &str, name: &str) -> Self {
    FnEntry {
      name: name.to_string(),
      namespace: namespace.to_string(),
      requires_namespace: namespace != BUILTIN_NAMESPACE,
      description: None,
      definitions: Vec::new(),
    }
  }

  /// Also reachable without the namespace prefix.
  pub fn unqualified(mut self) -> Self {
    self.requires_namespace = false;
    self
  }

  pub fn describe(mut self, description: &str) -> Self {
    self.description = Some(description.to_string());
    self
  }

  pub fn def<F>(mut self, inputs: Vec<FrType>, run: F) -> Self
  where
    F: Fn(&[Value], &mut Context) -> Result<Value, Error> + 'static,
  {
    self.definitions.push(FnDefinition {
      inputs,
      run: Rc::new(run),
    });
    self
  }

  pub fn qualified_name(&self) -> String {
    if self.namespace == BUILTIN_NAMESPACE {
      self.name.clone()
    } else {
      format!("{}.{}", self.namespace, self.name)
    }
  }

  /// Runs the first definition whose signature matches.
  pub fn call(&self, args: &[Value], ctx: &mut Context) -> Result<Value, Error> {
    let definition = self
      .definitions
      .iter()
      .find(|d| d.accepts(args))
      .ok_or_else(|| self.mismatch(args))?;
    if args.len() == definition.inputs.len() {
      (definition.run)(args, ctx)
    } else {
      let mut padded = args.to_vec();
      padded.resize(definition.inputs.len(), Value::Void);
      (definition.run)(&padded, ctx)
    }
  }

  fn mismatch(&self, args: &[Value]) -> ErrorMessage {
    let actual: Vec<&str> = args.iter().map(Value::type_name).collect();
    let signatures: Vec<String> = self
      .definitions
      .iter()
      .map(|d| format!("{}{}", self.qualified_name(), d.signature()))
      .collect();
    ErrorMessage::Argument(format!(
      "no definition of {} accepts ({}); possible signatures: {}",
      self.qualified_name(),
      actual.join(", "),
      signatures.join(", ")
    ))
  }
}

impl fmt::Debug for FnEntry {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let signatures: Vec<String> = self.definitions.iter().map(FnDefinition::signature).collect();
    write!(f, "FnEntry({} {})", self.qualified_name(), signatures.join(" | "))
  }
}

/// The standard library as an explicit, immutable object.
#[derive(Debug, Default)]
pub struct Registry {
  entries: IndexMap<String, Rc<FnEntry>>,
  constants: IndexMap<String, Value>,
}

impl Registry {
  pub fn standard() -> Self {
    RegistryBuilder::standard().build()
  }

  pub fn builder() -> RegistryBuilder {
    RegistryBuilder::new()
  }

  pub fn entry(&self, qualified: &str) -> Option<Rc<FnEntry>> {
    self.entries.get(qualified).cloned()
  }

  /// A constant or a function, by its full name.
  pub fn get(&self, qualified: &str) -> Option<Value> {
    self
      .constants
      .get(qualified)
      .cloned()
      .or_else(|| self.entry(qualified).map(|e| Value::Lambda(Lambda::Builtin(e))))
  }

  /// Looks a bare name up among entries that do not require their namespace.
  pub fn resolve_unqualified(&self, name: &str) -> Result<Option<Rc<FnEntry>>, CompileError> {
    let candidates: Vec<&Rc<FnEntry>> = self
      .entries
      .values()
      .filter(|e| !e.requires_namespace && e.name == name)
      .collect();
    match candidates.as_slice() {
      [] => Ok(None),
      [entry] => Ok(Some(Rc::clone(entry))),
      many => Err(CompileError::Ambiguous {
        name: name.to_string(),
        candidates: many.iter().map(|e| e.qualified_name()).collect(),
      }),
    }
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().chain(self.constants.keys()).map(String::as_str)
  }
}

#[derive(Default)]
pub struct RegistryBuilder {
  entries: IndexMap<String, FnEntry>,
  constants: IndexMap<String, Value>,
}

impl RegistryBuilder {
  pub fn new() -> Self {
    RegistryBuilder::default()
  }

  pub fn standard() -> Self {
    let mut builder = RegistryBuilder::new();
    crate::library::register(&mut builder);
    builder
  }

  /// Definitions added under an existing name are tried after the earlier ones.
  pub fn add(&mut self, entry: FnEntry) -> &mut Self {
    match self.entries.get_mut(&entry.qualified_name()) {
      Some(existing) => {
        existing.definitions.extend(entry.definitions);
        if existing.description.is_none() {
          existing.description = entry.description;
        }
      }
      None => {
        self.entries.insert(entry.qualified_name(), entry);
      }
    }
    self
  }

  pub fn constant(&mut self, qualified: &str, value: Value) -> &mut Self {
    self.constants.insert(qualified.to_string(), value);
    self
  }

  pub fn build(self) -> Registry {
    Registry {
      entries: self.entries.into_iter().map(|(k, e)| (k, Rc::new(e))).collect(),
      constants: self.constants,
    }
  }
}
