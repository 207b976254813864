//! The standard library, registered namespace by namespace.

pub mod builtin;
pub mod date;
pub mod dict;
pub mod dist;
pub mod list;
pub mod number;
pub mod pointset;
pub mod sampleset;
pub mod scale;
pub mod string;
pub mod tag;

use crate::dist::GenericDist;
use crate::error::ErrorMessage;
use crate::registry::RegistryBuilder;
use crate::value::{Lambda, Value};
use indexmap::IndexMap;

pub fn register(b: &mut RegistryBuilder) {
  builtin::register(b);
  dist::register(b);
  sampleset::register(b);
  pointset::register(b);
  list::register(b);
  number::register(b);
  dict::register(b);
  string::register(b);
  tag::register(b);
  scale::register(b);
  date::register(b);
  b.constant("Math.pi", Value::Number(std::f64::consts::PI));
  b.constant("Math.e", Value::Number(std::f64::consts::E));
}

/// Longest list a single library call may build.
pub const MAX_LIST_LENGTH: usize = 1_000_000;

pub(crate) fn list_length(n: i128, what: &str) -> Result<usize, ErrorMessage> {
  if n > MAX_LIST_LENGTH as i128 {
    Err(ErrorMessage::argument(format!(
      "{} of {} is over the limit of {}",
      what, n, MAX_LIST_LENGTH
    )))
  } else {
    Ok(n.max(0) as usize)
  }
}

// Argument accessors. Dispatch has already checked the types, so a mismatch
// here means a signature and its body disagree.

fn mismatch(expected: &str, v: &Value) -> ErrorMessage {
  ErrorMessage::Type(format!("expected {}, got {}", expected, v.type_name()))
}

pub(crate) fn number(v: &Value) -> Result<f64, ErrorMessage> {
  v.as_number().ok_or_else(|| mismatch("Number", v))
}

pub(crate) fn string(v: &Value) -> Result<&str, ErrorMessage> {
  v.as_str().ok_or_else(|| mismatch("String", v))
}

pub(crate) fn boolean(v: &Value) -> Result<bool, ErrorMessage> {
  v.as_bool().ok_or_else(|| mismatch("Bool", v))
}

pub(crate) fn array(v: &Value) -> Result<&[Value], ErrorMessage> {
  v.as_array().ok_or_else(|| mismatch("List", v))
}

pub(crate) fn dict(v: &Value) -> Result<&IndexMap<String, Value>, ErrorMessage> {
  v.as_dict().ok_or_else(|| mismatch("Dict", v))
}

pub(crate) fn lambda(v: &Value) -> Result<&Lambda, ErrorMessage> {
  v.as_lambda().ok_or_else(|| mismatch("Function", v))
}

pub(crate) fn date_ms(v: &Value) -> Result<f64, ErrorMessage> {
  match v.untagged() {
    Value::Date(ms) => Ok(*ms),
    other => Err(mismatch("Date", other)),
  }
}

pub(crate) fn duration_ms(v: &Value) -> Result<f64, ErrorMessage> {
  match v.untagged() {
    Value::Duration(ms) => Ok(*ms),
    other => Err(mismatch("Duration", other)),
  }
}

/// A distribution, or a number lifted to a point mass.
pub(crate) fn dist(v: &Value) -> Result<GenericDist, ErrorMessage> {
  match v.untagged() {
    Value::Dist(d) => Ok(d.clone()),
    Value::Number(x) => Ok(GenericDist::point_mass(*x)),
    other => Err(mismatch("Dist", other)),
  }
}

/// `None` for an omitted optional argument.
pub(crate) fn optional<'a, T>(
  v: &'a Value,
  get: impl Fn(&'a Value) -> Result<T, ErrorMessage>,
) -> Result<Option<T>, ErrorMessage> {
  if v.is_void() {
    Ok(None)
  } else {
    get(v).map(Some)
  }
}

pub(crate) fn numbers(v: &Value) -> Result<Vec<f64>, ErrorMessage> {
  array(v)?.iter().map(number).collect()
}

pub(crate) fn strings(v: &Value) -> Result<Vec<String>, ErrorMessage> {
  array(v)?.iter().map(|s| string(s).map(str::to_owned)).collect()
}

pub(crate) fn number_list(xs: impl IntoIterator<Item = f64>) -> Value {
  Value::array(xs.into_iter().map(Value::Number).collect())
}
