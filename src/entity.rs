use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A read-only item supplied by the data layer: an id plus named facet payloads.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(default)]
    pub facets: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            facets: BTreeMap::new(),
        }
    }

    pub fn with_facet(mut self, name: impl Into<String>, value: Value) -> Self {
        self.facets.insert(name.into(), value);
        self
    }

    /// Facet payload, treating an explicit `null` the same as a missing facet.
    pub fn facet(&self, name: &str) -> Option<&Value> {
        self.facets.get(name).filter(|value| !value.is_null())
    }
}

pub fn load_entities(path: &Path) -> Result<Vec<Entity>> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

/// String form used for set comparisons: strings stay bare, everything else is JSON.
/// Integral floats print without a fraction so `1` and `1.0` stringify alike.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e15 => {
                format!("{}", float as i64)
            }
            _ => number.to_string(),
        },
        other => other.to_string(),
    }
}

/// Group key of the most recently activated facet that carries data on `entity`.
///
/// `active_facets` is ordered oldest first.
pub fn facet_group_key(entity: &Entity, active_facets: &[String]) -> Option<String> {
    active_facets.iter().rev().find_map(|facet| {
        let value = entity.facet(facet)?;
        match value {
            Value::Array(items) => items
                .iter()
                .find(|item| !item.is_null())
                .map(|first| format!("{facet}={}", stringify_value(first))),
            Value::Object(_) => Some(facet.clone()),
            primitive => Some(format!("{facet}={}", stringify_value(primitive))),
        }
    })
}
