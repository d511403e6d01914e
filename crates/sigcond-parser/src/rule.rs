//! Loading Sigma rule documents into [`DetectionContext`]s.
//!
//! Handles multi-document YAML (`---` separated) and recursive directory
//! loading. Only the parts a condition needs are kept: the title, the id and
//! the `detection:` section. Per-document problems are collected in
//! [`RuleSet::errors`] instead of aborting the whole load.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::detection::DetectionContext;
use crate::error::{ConditionError, Result};

/// The detection-relevant part of one rule document.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDetection {
    pub title: Option<String>,
    pub id: Option<String>,
    pub detection: DetectionContext,
}

impl RuleDetection {
    /// Human readable name: the title, the id, or the document index.
    pub fn label(&self, index: usize) -> String {
        self.title
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| format!("document {}", index + 1))
    }
}

/// Rules loaded from one or more YAML sources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    pub rules: Vec<RuleDetection>,
    /// Documents that could not be loaded, one message each.
    pub errors: Vec<String>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn extend(&mut self, other: RuleSet) {
        self.rules.extend(other.rules);
        self.errors.extend(other.errors);
    }
}

/// Parse a YAML string holding one or more rule documents.
pub fn parse_rules_yaml(yaml: &str) -> Result<RuleSet> {
    let mut set = RuleSet::new();

    for (index, doc) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
        let value = match Value::deserialize(doc) {
            Ok(v) => v,
            Err(e) => {
                set.errors.push(format!("YAML parse error: {e}"));
                continue;
            }
        };
        if value.is_null() {
            continue;
        }
        match parse_document(&value) {
            Ok(rule) => set.rules.push(rule),
            Err(e) => set.errors.push(format!("document {}: {e}", index + 1)),
        }
    }

    log::debug!(
        "loaded {} rule(s), {} error(s)",
        set.rules.len(),
        set.errors.len()
    );
    Ok(set)
}

/// Parse a single rule file.
pub fn parse_rules_file(path: &Path) -> Result<RuleSet> {
    let content = std::fs::read_to_string(path)?;
    parse_rules_yaml(&content)
}

/// Parse all `.yml` / `.yaml` files below `dir`.
pub fn parse_rules_directory(dir: &Path) -> Result<RuleSet> {
    fn walk(dir: &Path, set: &mut RuleSet) -> Result<()> {
        let mut entries = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                walk(&path, set)?;
            } else if matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml" | "yaml")
            ) {
                match parse_rules_file(&path) {
                    Ok(sub) => set.extend(sub),
                    Err(e) => set.errors.push(format!("{}: {e}", path.display())),
                }
            }
        }
        Ok(())
    }

    let mut set = RuleSet::new();
    walk(dir, &mut set)?;
    Ok(set)
}

/// Load a file or, when `path` is a directory, every rule below it.
pub fn parse_rules_path(path: &Path) -> Result<RuleSet> {
    if path.is_dir() {
        parse_rules_directory(path)
    } else {
        parse_rules_file(path)
    }
}

fn parse_document(value: &Value) -> Result<RuleDetection> {
    let m = value
        .as_mapping()
        .ok_or_else(|| ConditionError::InvalidDocument("document is not a YAML mapping".into()))?;

    let detection = m.get("detection").ok_or_else(|| {
        ConditionError::InvalidDocument("missing required field 'detection'".into())
    })?;
    let detection = DetectionContext::from_value(detection)?;
    if detection.conditions().is_empty() {
        return Err(ConditionError::InvalidDocument(
            "detection section has no 'condition'".into(),
        ));
    }

    Ok(RuleDetection {
        title: get_str(m, "title"),
        id: get_str(m, "id"),
        detection,
    })
}

fn get_str(m: &serde_yaml::Mapping, key: &str) -> Option<String> {
    m.get(key).and_then(Value::as_str).map(str::to_string)
}
