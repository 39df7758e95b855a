//! Run configuration.
//!
//! A `RunConfig` can be loaded from YAML; every field is optional:
//!
//! ```yaml
//! include_tags: [fast]
//! exclude_tags: [flaky]
//! full_name: ["Math.*"]
//! parameters:
//!   endpoint: http://localhost:8080
//! output: detailed
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{BrambleError, Result};
use crate::tree::{BlockTree, NodeId};
use crate::value::Value;
use crate::wildcard::Wildcard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputLevel {
    None,
    #[default]
    Normal,
    Detailed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    /// Wildcard patterns over dotted block paths.
    pub full_name: Vec<String>,
    /// Suite-wide invocation parameters.
    pub parameters: BTreeMap<String, Value>,
    pub output: OutputLevel,
}

impl RunConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| BrambleError::Config {
            message: format!("cannot read '{}': {}", path.display(), e),
        })?;
        Self::from_yaml_str(&source)
    }

    /// Parses a `key=value` command-line parameter. The value is read as YAML,
    /// so numbers and booleans keep their type.
    pub fn parse_parameter(raw: &str) -> Result<(String, Value)> {
        let (key, value) = raw.split_once('=').ok_or_else(|| BrambleError::Config {
            message: format!("parameter '{}' is not of the form key=value", raw),
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(BrambleError::Config {
                message: format!("parameter '{}' has an empty name", raw),
            });
        }
        let value = serde_yaml::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        Ok((key.to_string(), value))
    }

    pub fn filter(&self) -> Filter {
        Filter::new(&self.include_tags, &self.exclude_tags, &self.full_name)
    }
}

/// Tag and name selection. Tags compare case-insensitively; exclusion wins.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    include_tags: BTreeSet<String>,
    exclude_tags: BTreeSet<String>,
    full_name: Vec<Wildcard>,
}

impl Filter {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S], full_name: &[S]) -> Self {
        let lower = |tags: &[S]| tags.iter().map(|t| t.as_ref().to_lowercase()).collect();
        Self {
            include_tags: lower(include),
            exclude_tags: lower(exclude),
            full_name: full_name.iter().map(|p| Wildcard::new(p.as_ref())).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.include_tags.is_empty() && self.exclude_tags.is_empty() && self.full_name.is_empty()
    }

    pub fn allows(&self, tree: &BlockTree, id: NodeId) -> bool {
        if self.is_empty() {
            return true;
        }
        let tags: BTreeSet<String> = tree
            .effective_tags(id)
            .iter()
            .map(|t| t.to_lowercase())
            .collect();
        if tags.iter().any(|t| self.exclude_tags.contains(t)) {
            return false;
        }
        if !self.include_tags.is_empty() && !tags.iter().any(|t| self.include_tags.contains(t)) {
            return false;
        }
        let full_name = &tree.node(id).full_name;
        self.full_name.is_empty() || self.full_name.iter().any(|w| w.is_match(full_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodeKind, NodeSpec};

    #[test]
    fn yaml_config_round_trips_fields() {
        let config = RunConfig::from_yaml_str(
            "include_tags: [fast]\nparameters:\n  retries: 3\noutput: detailed\n",
        )
        .unwrap();
        assert_eq!(config.include_tags, vec!["fast".to_string()]);
        assert_eq!(config.parameters.get("retries"), Some(&Value::from(3)));
        assert_eq!(config.output, OutputLevel::Detailed);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = RunConfig::from_yaml_str("colour: red\n").unwrap_err();
        assert!(matches!(err, BrambleError::Config { .. }));
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(RunConfig::from_yaml_str("").unwrap(), RunConfig::default());
    }

    #[test]
    fn parameters_keep_yaml_types() {
        assert_eq!(
            RunConfig::parse_parameter("n=2").unwrap(),
            ("n".to_string(), Value::from(2))
        );
        assert_eq!(
            RunConfig::parse_parameter("url=http://x:1").unwrap().1,
            Value::from("http://x:1")
        );
        assert!(RunConfig::parse_parameter("novalue").is_err());
    }

    #[test]
    fn exclusion_beats_inclusion_and_names_match_wildcards() {
        let mut tree = BlockTree::new("file");
        let mut spec = NodeSpec {
            name: "Adds".into(),
            declared_name: "Adds".into(),
            kind: Some(NodeKind::Leaf),
            ..NodeSpec::default()
        };
        spec.tags.insert("Fast".into());
        spec.tags.insert("flaky".into());
        let id = tree.add_child(tree.root(), spec).unwrap();

        assert!(Filter::new(&["fast"], &[], &[]).allows(&tree, id));
        assert!(!Filter::new(&["fast"], &["FLAKY"], &[]).allows(&tree, id));
        assert!(Filter::new(&[], &[], &["add*"]).allows(&tree, id));
        assert!(!Filter::new(&[], &[], &["sub*"]).allows(&tree, id));
    }
}
