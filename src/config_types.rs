use anyhow::{Context, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key of the nested options object inside the document.
pub const NESTED_KEY: &str = "compilerOptions";

/// Which part of the document an option lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Root,
    Nested,
}

impl Region {
    pub fn from_in_root(in_root: bool) -> Self {
        if in_root { Region::Root } else { Region::Nested }
    }
}

/// Configuration document with a root region and a nested options region.
/// Expecting JSON like:
///  ```JSON
/// {
///   "compilerOptions": { "target": "es6", "strict": true },
///   "include": ["src"]
/// }
/// ```
/// Key order survives a round trip, including where `compilerOptions` sat
/// among the root keys. A fresh document writes it first.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct ConfigDocument {
    pub compiler_options: Map<String, Value>,
    // Every other top-level field
    pub root: Map<String, Value>,
    // Number of root keys written before the nested object
    nested_position: usize,
}

impl TryFrom<Map<String, Value>> for ConfigDocument {
    type Error = String;

    fn try_from(raw: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut document = Self::default();
        for (key, value) in raw {
            if key != NESTED_KEY {
                document.root.insert(key, value);
                continue;
            }
            match value {
                Value::Object(options) => {
                    document.compiler_options = options;
                    document.nested_position = document.root.len();
                }
                other => return Err(format!("`{NESTED_KEY}` must be an object, found {other}")),
            }
        }
        Ok(document)
    }
}

impl Serialize for ConfigDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let nested_position = self.nested_position.min(self.root.len());
        let mut map = serializer.serialize_map(Some(self.root.len() + 1))?;
        for (index, (key, value)) in self.root.iter().enumerate() {
            if index == nested_position {
                map.serialize_entry(NESTED_KEY, &self.compiler_options)?;
            }
            map.serialize_entry(key, value)?;
        }
        if nested_position == self.root.len() {
            map.serialize_entry(NESTED_KEY, &self.compiler_options)?;
        }
        map.end()
    }
}

impl ConfigDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .with_context(|| "Invalid JSON: expected an object with an optional `compilerOptions` object")
    }

    pub fn region(&self, region: Region) -> &Map<String, Value> {
        match region {
            Region::Root => &self.root,
            Region::Nested => &self.compiler_options,
        }
    }

    fn region_mut(&mut self, region: Region) -> &mut Map<String, Value> {
        match region {
            Region::Root => &mut self.root,
            Region::Nested => &mut self.compiler_options,
        }
    }

    pub fn get(&self, region: Region, key: &str) -> Option<&Value> {
        self.region(region).get(key)
    }

    /// Presence is all that counts: `null`, `false`, `0` and empty collections are defined.
    pub fn is_defined(&self, region: Region, key: &str) -> bool {
        self.region(region).contains_key(key)
    }

    pub fn set(&mut self, region: Region, key: &str, value: Value) {
        self.region_mut(region).insert(key.to_string(), value);
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
