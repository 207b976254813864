use crate::error::ErrorMessage;
use crate::lang::Location;
use crate::value::Value;
use indexmap::IndexMap;

/// Where an exported value came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportData {
  pub source_id: String,
  pub path: Vec<String>,
}

/// Display and provenance metadata attached to a value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueTags {
  pub name: Option<String>,
  pub doc: Option<String>,
  pub format: Option<String>,
  pub show_as: Option<Value>,
  pub hidden: Option<bool>,
  pub location: Option<Location>,
  pub export_data: Option<ExportData>,
}

const KEYS: &[&str] = &["name", "doc", "format", "showAs", "hidden", "location", "exportData"];

fn expect_string(key: &str, v: &Value) -> Result<String, ErrorMessage> {
  v.as_str()
    .map(str::to_owned)
    .ok_or_else(|| ErrorMessage::Type(format!("tag {} must be a String, got {}", key, v.type_name())))
}

impl ValueTags {
  pub fn is_empty(&self) -> bool {
    self == &ValueTags::default()
  }

  /// Shallow override: every tag set in `other` replaces the one here.
  pub fn merge(&self, other: &ValueTags) -> ValueTags {
    ValueTags {
      name: other.name.clone().or_else(|| self.name.clone()),
      doc: other.doc.clone().or_else(|| self.doc.clone()),
      format: other.format.clone().or_else(|| self.format.clone()),
      show_as: other.show_as.clone().or_else(|| self.show_as.clone()),
      hidden: other.hidden.or(self.hidden),
      location: other.location.or(self.location),
      export_data: other.export_data.clone().or_else(|| self.export_data.clone()),
    }
  }

  /// Builds tags from a user record. Only the user-settable keys are accepted.
  pub fn from_dict(dict: &IndexMap<String, Value>) -> Result<ValueTags, ErrorMessage> {
    let mut tags = ValueTags::default();
    for (key, v) in dict {
      match key.as_str() {
        "name" => tags.name = Some(expect_string(key, v)?),
        "doc" => tags.doc = Some(expect_string(key, v)?),
        "format" => tags.format = Some(expect_string(key, v)?),
        "showAs" => tags.show_as = Some(v.clone()),
        "hidden" => {
          tags.hidden = Some(v.as_bool().ok_or_else(|| {
            ErrorMessage::Type(format!("tag hidden must be a Bool, got {}", v.type_name()))
          })?)
        }
        other => return Err(ErrorMessage::Type(format!("unknown tag key {:?}", other))),
      }
    }
    Ok(tags)
  }

  pub fn to_dict(&self) -> IndexMap<String, Value> {
    let mut out = IndexMap::new();
    if let Some(name) = &self.name {
      out.insert("name".to_string(), Value::string(name.clone()));
    }
    if let Some(doc) = &self.doc {
      out.insert("doc".to_string(), Value::string(doc.clone()));
    }
    if let Some(format) = &self.format {
      out.insert("format".to_string(), Value::string(format.clone()));
    }
    if let Some(show_as) = &self.show_as {
      out.insert("showAs".to_string(), show_as.clone());
    }
    if let Some(hidden) = self.hidden {
      out.insert("hidden".to_string(), Value::Bool(hidden));
    }
    if let Some(location) = self.location {
      out.insert(
        "location".to_string(),
        Value::dict(vec![
          ("start".to_string(), Value::Number(location.start as f64)),
          ("end".to_string(), Value::Number(location.end as f64)),
        ]),
      );
    }
    if let Some(export) = &self.export_data {
      out.insert(
        "exportData".to_string(),
        Value::dict(vec![
          ("sourceId".to_string(), Value::string(export.source_id.clone())),
          (
            "path".to_string(),
            Value::array(export.path.iter().cloned().map(Value::string).collect()),
          ),
        ]),
      );
    }
    out
  }

  pub fn omit(&self, keys: &[String]) -> Result<ValueTags, ErrorMessage> {
    let mut tags = self.clone();
    for key in keys {
      match key.as_str() {
        "name" => tags.name = None,
        "doc" => tags.doc = None,
        "format" => tags.format = None,
        "showAs" => tags.show_as = None,
        "hidden" => tags.hidden = None,
        "location" => tags.location = None,
        "exportData" => tags.export_data = None,
        other => {
          return Err(ErrorMessage::Type(format!(
            "unknown tag key {:?}, expected one of {}",
            other,
            KEYS.join(", ")
          )))
        }
      }
    }
    Ok(tags)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn merge_overrides_shallowly() {
    let a = ValueTags {
      name: Some("a".into()),
      doc: Some("first".into()),
      ..Default::default()
    };
    let b = ValueTags {
      name: Some("b".into()),
      ..Default::default()
    };
    let merged = a.merge(&b);
    assert_eq!(merged.name.as_deref(), Some("b"));
    assert_eq!(merged.doc.as_deref(), Some("first"));
  }

  #[test]
  fn unknown_key_is_a_type_error() {
    let mut dict = IndexMap::new();
    dict.insert("name".to_string(), Value::string("x"));
    dict.insert("colour".to_string(), Value::string("red"));
    match ValueTags::from_dict(&dict) {
      Err(ErrorMessage::Type(msg)) => assert!(msg.contains("colour")),
      other => panic!("expected a type error, got {:?}", other),
    }
  }

  #[test]
  fn round_trips_through_a_dict() {
    let tags = ValueTags {
      doc: Some("d".into()),
      hidden: Some(true),
      ..Default::default()
    };
    assert_eq!(ValueTags::from_dict(&tags.to_dict()).unwrap(), tags);
  }
}
