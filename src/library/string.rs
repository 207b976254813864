use super::string;
use crate::registry::{FnEntry, FrType, RegistryBuilder};
use crate::value::Value;

const NS: &str = "String";

pub fn register(b: &mut RegistryBuilder) {
  b.add(
    FnEntry::new(NS, "make")
      .describe("The display form of any value; strings are returned unquoted.")
      .def(vec![FrType::Any], |args, _| {
        Ok(match args[0].as_str() {
          Some(s) => Value::string(s),
          None => Value::string(args[0].to_string()),
        })
      }),
  );
  b.add(FnEntry::new(NS, "split").def(vec![FrType::String, FrType::String], |args, _| {
    let (s, separator) = (string(&args[0])?, string(&args[1])?);
    let parts: Vec<Value> = if separator.is_empty() {
      s.chars().map(|c| Value::string(c.to_string())).collect()
    } else {
      s.split(separator).map(Value::string).collect()
    };
    Ok(Value::array(parts))
  }));
}

#[cfg(test)]
mod tests {
  use crate::env::Environment;
  use crate::evaluate;

  fn show(src: &str) -> String {
    evaluate(src, &Environment::default()).unwrap().result.to_string()
  }

  #[test]
  fn make_and_split() {
    assert_eq!(show("String.make([1, 2])"), "\"[1, 2]\"");
    assert_eq!(show("String.make(\"plain\")"), "\"plain\"");
    assert_eq!(show("String.split(\"a,b,c\", \",\")"), "[\"a\", \"b\", \"c\"]");
    assert_eq!(show("String.split(\"ab\", \"\")"), "[\"a\", \"b\"]");
  }
}
