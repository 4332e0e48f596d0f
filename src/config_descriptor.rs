//! Option descriptors and the table they are loaded into.
//!
//! A descriptor names an option, the region it lives in and its default
//! policy. Policies arrive in a loosely shaped JSON form and are classified
//! once, at load time, into [`DefaultRule`] variants.

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

use crate::config_types::{NESTED_KEY, Region};

const BUILTIN_TABLE: &str = include_str!("../data/tsconfig_descriptors.json");

/// One unit of default-value logic.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultRule {
    /// Used verbatim.
    Literal(Value),
    /// Picks a branch on whether `option` is defined in the root region.
    Presence {
        option: String,
        defined: Value,
        not_defined: Option<Value>,
    },
    /// Picks the first pair whose match equals the current value of `option`.
    MultiValue {
        option: String,
        values: Vec<(Value, Value)>,
        otherwise: Option<Value>,
    },
}

impl DefaultRule {
    /// The option this rule reads and the region it reads it from.
    /// Presence checks always look at the root region; value checks use the
    /// region of the descriptor that owns the rule.
    pub fn reads(&self, own_region: Region) -> Option<(&str, Region)> {
        match self {
            DefaultRule::Literal(_) => None,
            DefaultRule::Presence { option, .. } => Some((option, Region::Root)),
            DefaultRule::MultiValue { option, .. } => Some((option, own_region)),
        }
    }
}

/// A single rule, or an ordered list of rules whose outcomes are merged.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum DefaultPolicy {
    Single(DefaultRule),
    Merged(Vec<DefaultRule>),
}

impl DefaultPolicy {
    pub fn rules(&self) -> &[DefaultRule] {
        match self {
            DefaultPolicy::Single(rule) => std::slice::from_ref(rule),
            DefaultPolicy::Merged(rules) => rules,
        }
    }
}

impl TryFrom<Value> for DefaultPolicy {
    type Error = String;

    fn try_from(raw: Value) -> Result<Self, Self::Error> {
        match raw {
            Value::Array(items) if items.is_empty() => {
                Err("default rule list must not be empty".to_string())
            }
            Value::Array(items) => items
                .into_iter()
                .map(classify_rule)
                .collect::<Result<Vec<_>, _>>()
                .map(DefaultPolicy::Merged),
            other => classify_rule(other).map(DefaultPolicy::Single),
        }
    }
}

/// Expecting JSON like:
///  ```JSON
/// { "name": "module", "inRoot": false, "default": { "option": "target", "conditions": { ... } } }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDescriptor {
    pub name: String,
    #[serde(default)]
    pub in_root: bool,
    #[serde(default)]
    pub default: Option<DefaultPolicy>,
}

impl OptionDescriptor {
    pub fn region(&self) -> Region {
        Region::from_in_root(self.in_root)
    }
}

/// A descriptor whose condition reads an option that a later descriptor fills.
/// In a single pass the condition never sees that later default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardReference {
    pub option: String,
    pub depends_on: String,
}

/// Option key -> descriptor, iterated in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorTable {
    entries: IndexMap<String, OptionDescriptor>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replacing an existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, descriptor: OptionDescriptor) -> Option<OptionDescriptor> {
        self.entries.insert(key.into(), descriptor)
    }

    pub fn get(&self, key: &str) -> Option<&OptionDescriptor> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionDescriptor)> {
        self.entries
            .iter()
            .map(|(key, descriptor)| (key.as_str(), descriptor))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses a JSON object of option key -> descriptor, keeping key order.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: IndexMap<String, Value> = serde_json::from_str(json)
            .with_context(|| "Invalid JSON: expected an object mapping option keys to descriptors")?;

        let mut table = Self::new();
        let mut seen = HashSet::new();

        for (key, value) in raw {
            let descriptor: OptionDescriptor = serde_json::from_value(value)
                .with_context(|| format!("Invalid descriptor for option `{key}`"))?;

            if descriptor.name.is_empty() {
                bail!("Descriptor `{}` has an empty name", key);
            }
            if descriptor.in_root && descriptor.name == NESTED_KEY {
                bail!("Descriptor `{}` cannot target the reserved root key `{}`", key, NESTED_KEY);
            }
            if !seen.insert((descriptor.region(), descriptor.name.clone())) {
                bail!("Duplicate (region, name): ({:?}, {})", descriptor.region(), descriptor.name);
            }

            table.insert(key, descriptor);
        }

        for hazard in table.forward_references() {
            warn!(
                option = %hazard.option,
                depends_on = %hazard.depends_on,
                "condition reads an option defaulted later in the table"
            );
        }
        debug!(descriptors = table.len(), "loaded descriptor table");

        Ok(table)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read descriptor table {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Failed to load descriptor table {}", path.display()))
    }

    /// Embedded table of TypeScript compiler options.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_TABLE).context("Built-in descriptor table is malformed")
    }

    pub fn forward_references(&self) -> Vec<ForwardReference> {
        let filled_at: HashMap<(Region, &str), usize> = self
            .entries
            .values()
            .enumerate()
            .filter(|(_, descriptor)| descriptor.default.is_some())
            .map(|(index, descriptor)| ((descriptor.region(), descriptor.name.as_str()), index))
            .collect();

        let mut found = Vec::new();
        for (index, descriptor) in self.entries.values().enumerate() {
            let Some(policy) = &descriptor.default else {
                continue;
            };
            for rule in policy.rules() {
                let Some((option, region)) = rule.reads(descriptor.region()) else {
                    continue;
                };
                if filled_at
                    .get(&(region, option))
                    .is_some_and(|&later| later > index)
                {
                    found.push(ForwardReference {
                        option: descriptor.name.clone(),
                        depends_on: option.to_string(),
                    });
                }
            }
        }
        found
    }
}

impl FromIterator<(String, OptionDescriptor)> for DescriptorTable {
    fn from_iter<I: IntoIterator<Item = (String, OptionDescriptor)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (key, descriptor) in iter {
            table.insert(key, descriptor);
        }
        table
    }
}

/// Conditions are objects holding exactly a string `option` and an object
/// `conditions`; any other value is a literal.
fn is_conditional(map: &Map<String, Value>) -> bool {
    map.len() == 2
        && map.get("option").is_some_and(Value::is_string)
        && map.get("conditions").is_some_and(Value::is_object)
}

fn classify_rule(raw: Value) -> Result<DefaultRule, String> {
    match raw {
        Value::Object(map) if is_conditional(&map) => conditional_rule(map),
        other => Ok(DefaultRule::Literal(other)),
    }
}

fn conditional_rule(mut map: Map<String, Value>) -> Result<DefaultRule, String> {
    let (Some(Value::String(option)), Some(Value::Object(mut conditions))) =
        (map.remove("option"), map.remove("conditions"))
    else {
        return Err("condition needs a string `option` and a `conditions` object".to_string());
    };

    if let Some(defined) = conditions.remove("defined") {
        return Ok(DefaultRule::Presence {
            option,
            defined,
            not_defined: conditions.remove("notDefined"),
        });
    }

    match conditions.remove("values") {
        Some(Value::Array(pairs)) => {
            let values = pairs
                .into_iter()
                .map(|pair| value_pair(&option, pair))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DefaultRule::MultiValue {
                option,
                values,
                otherwise: conditions.remove("otherwise"),
            })
        }
        Some(other) => Err(format!("`values` for `{option}` must be an array, found {other}")),
        None => Err(format!("conditions on `{option}` need `defined` or `values`")),
    }
}

fn value_pair(option: &str, pair: Value) -> Result<(Value, Value), String> {
    match pair {
        Value::Array(pair) => match <[Value; 2]>::try_from(pair) {
            Ok([matched, result]) => Ok((matched, result)),
            Err(pair) => Err(format!(
                "value pair for `{option}` must have 2 entries, found {}",
                pair.len()
            )),
        },
        other => Err(format!("value pair for `{option}` must be an array, found {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy(raw: Value) -> DefaultPolicy {
        DefaultPolicy::try_from(raw).unwrap()
    }

    #[test]
    fn classifies_literal_presence_and_multi_value() {
        assert_eq!(policy(json!("es3")), DefaultPolicy::Single(DefaultRule::Literal(json!("es3"))));

        assert_eq!(
            policy(json!({ "option": "files", "conditions": { "defined": [], "notDefined": ["**/*"] } })),
            DefaultPolicy::Single(DefaultRule::Presence {
                option: "files".into(),
                defined: json!([]),
                not_defined: Some(json!(["**/*"])),
            })
        );

        assert_eq!(
            policy(json!({ "option": "target", "conditions": { "values": [["es5", "commonjs"]], "otherwise": "es6" } })),
            DefaultPolicy::Single(DefaultRule::MultiValue {
                option: "target".into(),
                values: vec![(json!("es5"), json!("commonjs"))],
                otherwise: Some(json!("es6")),
            })
        );
    }

    #[test]
    fn objects_with_extra_keys_are_literals() {
        let raw = json!({ "option": "a", "conditions": { "defined": 1 }, "extra": true });
        assert_eq!(policy(raw.clone()), DefaultPolicy::Single(DefaultRule::Literal(raw)));
    }

    #[test]
    fn arrays_are_rule_lists() {
        let parsed = policy(json!([["x"], { "option": "a", "conditions": { "defined": ["y"] } }]));
        assert_eq!(parsed.rules().len(), 2);
        assert_eq!(parsed.rules()[0], DefaultRule::Literal(json!(["x"])));
    }

    #[test]
    fn null_branches_are_kept() {
        let parsed = policy(json!({ "option": "a", "conditions": { "defined": 1, "notDefined": null } }));
        let DefaultPolicy::Single(DefaultRule::Presence { not_defined, .. }) = parsed else {
            panic!("expected a presence rule");
        };
        assert_eq!(not_defined, Some(Value::Null));
    }

    #[test]
    fn rejects_malformed_conditions() {
        assert!(DefaultPolicy::try_from(json!([])).is_err());
        assert!(DefaultPolicy::try_from(json!({ "option": "a", "conditions": {} })).is_err());
        assert!(DefaultPolicy::try_from(json!({ "option": "a", "conditions": { "values": "es5" } })).is_err());
        assert!(DefaultPolicy::try_from(json!({ "option": "a", "conditions": { "values": [["es5"]] } })).is_err());
    }

    #[test]
    fn loads_table_in_key_order() {
        let table = DescriptorTable::from_json_str(
            r#"{
                "zeta": { "name": "zeta", "default": 1 },
                "alpha": { "name": "alpha", "inRoot": true },
                "mid": { "name": "mid", "default": null, "description": "ignored" }
            }"#,
        )
        .unwrap();

        let keys: Vec<&str> = table.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
        assert!(table.get("alpha").unwrap().in_root);
        assert!(table.get("alpha").unwrap().default.is_none());
        assert!(table.get("mid").unwrap().default.is_none());
    }

    #[test]
    fn loads_large_table_in_key_order() {
        let raw: Map<String, Value> = (0..5000)
            .rev()
            .map(|i| (format!("opt{i}"), json!({ "name": format!("opt{i}"), "default": i })))
            .collect();
        let table = DescriptorTable::from_json_str(&Value::Object(raw).to_string()).unwrap();

        assert_eq!(table.len(), 5000);
        let keys: Vec<&str> = table.iter().map(|(key, _)| key).collect();
        assert_eq!(keys.first(), Some(&"opt4999"));
        assert_eq!(keys.last(), Some(&"opt0"));
        assert_eq!(
            table.get("opt17").unwrap().default,
            Some(DefaultPolicy::Single(DefaultRule::Literal(json!(17))))
        );
    }

    #[test]
    fn rejects_invalid_tables() {
        let duplicate = r#"{ "a": { "name": "x" }, "b": { "name": "x" } }"#;
        assert!(DescriptorTable::from_json_str(duplicate).is_err());

        let same_name_other_region = r#"{ "a": { "name": "x" }, "b": { "name": "x", "inRoot": true } }"#;
        assert!(DescriptorTable::from_json_str(same_name_other_region).is_ok());

        assert!(DescriptorTable::from_json_str(r#"{ "a": { "name": "" } }"#).is_err());
        assert!(DescriptorTable::from_json_str(r#"{ "a": { "name": "compilerOptions", "inRoot": true } }"#).is_err());
        assert!(DescriptorTable::from_json_str(r#"{ "a": { "name": "a", "default": [] } }"#).is_err());
        assert!(DescriptorTable::from_json_str("[]").is_err());
    }

    #[test]
    fn insert_keeps_position_on_replace() {
        let mut table: DescriptorTable = [
            ("a".to_string(), OptionDescriptor { name: "a".into(), in_root: false, default: None }),
            ("b".to_string(), OptionDescriptor { name: "b".into(), in_root: false, default: None }),
        ]
        .into_iter()
        .collect();

        let replaced = table.insert("a", OptionDescriptor { name: "a".into(), in_root: true, default: None });
        assert!(replaced.is_some());
        assert_eq!(table.iter().map(|(key, _)| key).collect::<Vec<_>>(), ["a", "b"]);
        assert!(table.get("a").unwrap().in_root);
    }

    #[test]
    fn reports_forward_references() {
        let table = DescriptorTable::from_json_str(
            r#"{
                "module": { "name": "module", "default": { "option": "target", "conditions": { "values": [["es5", "commonjs"]], "otherwise": "es6" } } },
                "target": { "name": "target", "default": "es5" },
                "include": { "name": "include", "inRoot": true, "default": { "option": "files", "conditions": { "defined": [] } } },
                "files": { "name": "files", "inRoot": true }
            }"#,
        )
        .unwrap();

        assert_eq!(
            table.forward_references(),
            vec![ForwardReference { option: "module".into(), depends_on: "target".into() }]
        );
    }

    #[test]
    fn builtin_table_loads_without_hazards() {
        let table = DescriptorTable::builtin().unwrap();
        assert!(table.get("target").is_some());
        assert!(table.get("include").unwrap().in_root);
        assert!(table.forward_references().is_empty());
    }
}
