//! Step parameter bags and step-output placeholders
//!
//! A step may reference an earlier step's output in two ways:
//! - `{{step:N}}` anywhere inside a string value, replaced in place
//! - `{"$step": N}` as a whole value, replaced by the output text
//!
//! When step N did not succeed the reference resolves to [`UNAVAILABLE_MARKER`].

use std::collections::BTreeSet;
use std::sync::OnceLock;

use devcrew_core::ParamSpec;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// Substituted for a reference to a step that failed, was cancelled or never ran.
pub const UNAVAILABLE_MARKER: &str = "[unavailable]";

const STEP_REF_KEY: &str = "$step";

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*step\s*:\s*(\d+)\s*\}\}").expect("Invalid placeholder regex pattern")
    })
}

/// Step ids referenced by placeholders anywhere inside `value`.
pub fn placeholder_refs(value: &Value) -> BTreeSet<u32> {
    let mut refs = BTreeSet::new();
    collect_refs(value, &mut refs);
    refs
}

fn collect_refs(value: &Value, refs: &mut BTreeSet<u32>) {
    match value {
        Value::String(s) => {
            refs.extend(
                placeholder_pattern()
                    .captures_iter(s)
                    .filter_map(|caps| caps[1].parse::<u32>().ok()),
            );
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, refs)),
        Value::Object(map) => match whole_value_ref(map) {
            Some(id) => {
                refs.insert(id);
            }
            None => map.values().for_each(|item| collect_refs(item, refs)),
        },
        _ => {}
    }
}

fn whole_value_ref(map: &Map<String, Value>) -> Option<u32> {
    if map.len() != 1 {
        return None;
    }
    map.get(STEP_REF_KEY)
        .and_then(Value::as_u64)
        .and_then(|id| u32::try_from(id).ok())
}

/// Replace every placeholder in `value`. `lookup` returns the output of a step
/// that succeeded, or `None` otherwise.
pub fn resolve_value<'a, F>(value: &Value, lookup: &F) -> Value
where
    F: Fn(u32) -> Option<&'a str>,
{
    match value {
        Value::String(s) => {
            let replaced = placeholder_pattern().replace_all(s, |caps: &Captures| {
                caps[1]
                    .parse::<u32>()
                    .ok()
                    .and_then(lookup)
                    .unwrap_or(UNAVAILABLE_MARKER)
                    .to_string()
            });
            Value::String(replaced.into_owned())
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, lookup)).collect()),
        Value::Object(map) => match whole_value_ref(map) {
            Some(id) => Value::String(lookup(id).unwrap_or(UNAVAILABLE_MARKER).to_string()),
            None => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), resolve_value(v, lookup)))
                    .collect(),
            ),
        },
        other => other.clone(),
    }
}

/// Resolved parameter bag handed to a worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// `base` overlaid by `overrides`. Placeholders are resolved in
    /// `overrides` only; `base` is caller input and passes through verbatim.
    pub fn resolve<'a, F>(base: &Map<String, Value>, overrides: &Map<String, Value>, lookup: F) -> Self
    where
        F: Fn(u32) -> Option<&'a str>,
    {
        let merged = base
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(
                overrides
                    .iter()
                    .map(|(k, v)| (k.clone(), resolve_value(v, &lookup))),
            );
        Self(merged.collect())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Fill absent, null or blank entries from the worker's declared defaults.
    pub fn with_defaults(mut self, specs: &[ParamSpec]) -> Self {
        for spec in specs {
            if let Some(default) = spec.default {
                if self.text(spec.name).is_none() {
                    self.0.insert(spec.name.to_string(), Value::from(default));
                }
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Value rendered as text. Null and blank strings count as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        let rendered = match self.0.get(name)? {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
            other => other.to_string(),
        };
        (!rendered.trim().is_empty()).then_some(rendered)
    }

    pub fn text_or(&self, name: &str, fallback: &str) -> String {
        self.text(name).unwrap_or_else(|| fallback.to_string())
    }

    /// Array entries, or a comma separated string split into items.
    pub fn list(&self, name: &str) -> Vec<String> {
        match self.0.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .map(value_text)
                .filter(|s| !s.trim().is_empty())
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
