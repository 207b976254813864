use super::{boolean, dict, optional, string, strings};
use crate::error::Error;
use crate::registry::{FnEntry, FrType, RegistryBuilder};
use crate::tags::ValueTags;
use crate::value::Value;

const NS: &str = "Tag";

fn string_tag(
  b: &mut RegistryBuilder,
  setter: &str,
  getter: &str,
  set: fn(&mut ValueTags, String),
  get: fn(&ValueTags) -> Option<String>,
) {
  b.add(FnEntry::new(NS, setter).def(vec![FrType::Any, FrType::String], move |args, _| {
    let mut tags = ValueTags::default();
    set(&mut tags, string(&args[1])?.to_string());
    Ok(args[0].with_tags(tags))
  }));
  b.add(FnEntry::new(NS, getter).def(vec![FrType::Any], move |args, _| {
    Ok(args[0].tags().and_then(get).map(Value::string).unwrap_or(Value::Void))
  }));
}

fn tagged(v: &Value, tags: ValueTags) -> Result<Value, Error> {
  Ok(v.with_tags(tags))
}

pub fn register(b: &mut RegistryBuilder) {
  string_tag(b, "name", "getName", |t, s| t.name = Some(s), |t| t.name.clone());
  string_tag(b, "doc", "getDoc", |t, s| t.doc = Some(s), |t| t.doc.clone());
  string_tag(b, "format", "getFormat", |t, s| t.format = Some(s), |t| t.format.clone());

  b.add(FnEntry::new(NS, "showAs").def(vec![FrType::Any, FrType::Any], |args, _| {
    tagged(
      &args[0],
      ValueTags {
        show_as: Some(args[1].clone()),
        ..Default::default()
      },
    )
  }));
  b.add(FnEntry::new(NS, "getShowAs").def(vec![FrType::Any], |args, _| {
    Ok(args[0].tags().and_then(|t| t.show_as.clone()).unwrap_or(Value::Void))
  }));
  b.add(
    FnEntry::new(NS, "hide").def(vec![FrType::Any, FrType::optional(FrType::Bool)], |args, _| {
      let hidden = optional(&args[1], boolean)?.unwrap_or(true);
      tagged(
        &args[0],
        ValueTags {
          hidden: Some(hidden),
          ..Default::default()
        },
      )
    }),
  );
  b.add(FnEntry::new(NS, "getHide").def(vec![FrType::Any], |args, _| {
    Ok(Value::Bool(args[0].tags().and_then(|t| t.hidden).unwrap_or(false)))
  }));
  b.add(
    FnEntry::new(NS, "set")
      .describe("Sets several user tags at once from a record.")
      .def(vec![FrType::Any, FrType::dict_of(FrType::Any)], |args, _| {
        tagged(&args[0], ValueTags::from_dict(dict(&args[1])?)?)
      }),
  );
  b.add(FnEntry::new(NS, "getAll").def(vec![FrType::Any], |args, _| {
    Ok(Value::from_map(args[0].tags().map(ValueTags::to_dict).unwrap_or_default()))
  }));
  b.add(FnEntry::new(NS, "omit").def(vec![FrType::Any, FrType::array(FrType::String)], |args, _| {
    let tags = args[0].tags().cloned().unwrap_or_default();
    Ok(args[0].set_tags(tags.omit(&strings(&args[1])?)?))
  }));
  b.add(FnEntry::new(NS, "clear").def(vec![FrType::Any], |args, _| Ok(args[0].untagged().clone())));
}

#[cfg(test)]
mod tests {
  use crate::env::Environment;
  use crate::error::ErrorMessage;
  use crate::evaluate;
  use crate::value::Value;

  fn eval(src: &str) -> Result<Value, crate::Error> {
    evaluate(src, &Environment::default()).map(|out| out.result)
  }

  #[test]
  fn tags_round_trip_through_getters() {
    assert_eq!(eval("Tag.getName(Tag.name(5, \"five\"))").unwrap(), Value::string("five"));
    assert_eq!(eval("Tag.getDoc(5)").unwrap(), Value::Void);
    assert_eq!(eval("Tag.getHide(Tag.hide(5))").unwrap(), Value::Bool(true));
    assert_eq!(eval("5 -> Tag.doc(\"d\") -> Tag.clear -> Tag.getDoc").unwrap(), Value::Void);
  }

  #[test]
  fn set_rejects_unknown_keys() {
    let err = eval("Tag.set(1, {colour: \"red\"})").unwrap_err();
    assert!(matches!(err.message, ErrorMessage::Type(_)));
  }

  #[test]
  fn omit_drops_selected_tags() {
    let v = eval("Tag.getAll(Tag.omit(Tag.set(1, {name: \"n\", doc: \"d\"}), [\"doc\"]))").unwrap();
    assert_eq!(v.to_string(), "{name: \"n\"}");
  }
}
