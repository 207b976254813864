use super::{array, dict, lambda, string, strings};
use crate::error::ErrorMessage;
use crate::registry::{FnEntry, FrType, RegistryBuilder};
use crate::value::Value;
use indexmap::IndexMap;

const NS: &str = "Dict";

fn any_dict() -> FrType {
  FrType::dict_of(FrType::Any)
}

pub fn register(b: &mut RegistryBuilder) {
  b.add(FnEntry::new(NS, "get").def(vec![any_dict(), FrType::String], |args, _| {
    let key = string(&args[1])?;
    dict(&args[0])?
      .get(key)
      .cloned()
      .ok_or_else(|| ErrorMessage::argument(format!("key {:?} not found", key)).into())
  }));
  b.add(FnEntry::new(NS, "set").def(vec![any_dict(), FrType::String, FrType::Any], |args, _| {
    let mut d = dict(&args[0])?.clone();
    d.insert(string(&args[1])?.to_string(), args[2].clone());
    Ok(Value::from_map(d))
  }));
  b.add(FnEntry::new(NS, "has").def(vec![any_dict(), FrType::String], |args, _| {
    Ok(Value::Bool(dict(&args[0])?.contains_key(string(&args[1])?)))
  }));
  b.add(FnEntry::new(NS, "keys").def(vec![any_dict()], |args, _| {
    Ok(Value::array(dict(&args[0])?.keys().cloned().map(Value::string).collect()))
  }));
  b.add(FnEntry::new(NS, "values").def(vec![any_dict()], |args, _| {
    Ok(Value::array(dict(&args[0])?.values().cloned().collect()))
  }));
  b.add(FnEntry::new(NS, "size").def(vec![any_dict()], |args, _| {
    Ok(Value::Number(dict(&args[0])?.len() as f64))
  }));
  b.add(
    FnEntry::new(NS, "toList")
      .describe("Key-value pairs as two-element lists.")
      .def(vec![any_dict()], |args, _| {
        Ok(Value::array(
          dict(&args[0])?
            .iter()
            .map(|(k, v)| Value::array(vec![Value::string(k.clone()), v.clone()]))
            .collect(),
        ))
      }),
  );
  b.add(
    FnEntry::new(NS, "fromList").def(vec![FrType::array(FrType::array(FrType::Any))], |args, _| {
      let mut d = IndexMap::new();
      for pair in array(&args[0])? {
        match array(pair)? {
          [k, v] => {
            d.insert(string(k)?.to_string(), v.clone());
          }
          other => {
            return Err(
              ErrorMessage::argument(format!("expected [key, value] pairs, got a list of length {}", other.len()))
                .into(),
            )
          }
        }
      }
      Ok(Value::from_map(d))
    }),
  );
  b.add(
    FnEntry::new(NS, "merge")
      .describe("Keys of the second record win.")
      .def(vec![any_dict(), any_dict()], |args, _| {
        let mut d = dict(&args[0])?.clone();
        d.extend(dict(&args[1])?.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(Value::from_map(d))
      }),
  );
  b.add(FnEntry::new(NS, "map").def(vec![any_dict(), FrType::Lambda], |args, ctx| {
    let f = lambda(&args[1])?.clone();
    let mut d = IndexMap::new();
    for (k, v) in dict(&args[0])? {
      d.insert(k.clone(), ctx.call(&f, vec![v.clone()], None)?);
    }
    Ok(Value::from_map(d))
  }));
  b.add(FnEntry::new(NS, "pick").def(vec![any_dict(), FrType::array(FrType::String)], |args, _| {
    let source = dict(&args[0])?;
    let d: IndexMap<String, Value> = strings(&args[1])?
      .into_iter()
      .filter_map(|k| source.get(&k).cloned().map(|v| (k, v)))
      .collect();
    Ok(Value::from_map(d))
  }));
  b.add(FnEntry::new(NS, "omit").def(vec![any_dict(), FrType::array(FrType::String)], |args, _| {
    let omitted = strings(&args[1])?;
    let d: IndexMap<String, Value> = dict(&args[0])?
      .iter()
      .filter(|(k, _)| !omitted.contains(*k))
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect();
    Ok(Value::from_map(d))
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
  fn edits_return_new_records() {
    let src = "a = {x: 1, y: 2}\nb = Dict.set(a, \"z\", 3)\n[Dict.size(a), Dict.size(b), Dict.get(b, \"z\")]";
    assert_eq!(show(src), "[2, 3, 3]");
  }

  #[test]
  fn merge_pick_and_omit_keep_order() {
    assert_eq!(show("Dict.merge({a: 1, b: 2}, {b: 3, c: 4})"), "{a: 1, b: 3, c: 4}");
    assert_eq!(show("Dict.pick({a: 1, b: 2, c: 3}, [\"c\", \"a\"])"), "{c: 3, a: 1}");
    assert_eq!(show("Dict.omit({a: 1, b: 2}, [\"a\"])"), "{b: 2}");
  }

  #[test]
  fn list_round_trip() {
    assert_eq!(show("Dict.fromList(Dict.toList({a: 1, \"b c\": 2}))"), "{a: 1, \"b c\": 2}");
    assert_eq!(show("Dict.map({a: 1, b: 2}, {|v| v * 10})"), "{a: 10, b: 20}");
  }
}
