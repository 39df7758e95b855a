//! Command-line arguments for suite binaries.
//!
//! Selection flags are global, so they may appear before or after the
//! subcommand. With no subcommand the suites are run.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{OutputLevel, RunConfig};
use crate::errors::Result;

#[derive(Debug, Parser)]
#[command(name = "bramble", version, about = "Run behavior-driven test suites.")]
pub struct BrambleArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Only run tests carrying this tag (repeatable).
    #[arg(long = "tag", global = true, value_name = "TAG")]
    pub tags: Vec<String>,

    /// Skip tests carrying this tag (repeatable).
    #[arg(long = "exclude-tag", global = true, value_name = "TAG")]
    pub exclude_tags: Vec<String>,

    /// Wildcard over the dotted test path, e.g. `Math.*` (repeatable).
    #[arg(long = "full-name", global = true, value_name = "PATTERN")]
    pub full_name: Vec<String>,

    /// Suite parameter as key=value (repeatable).
    #[arg(long = "param", global = true, value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// YAML run configuration; flags extend or override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    pub output: Option<OutputLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Discover and run every suite.
    Run,
    /// Print the discovered block tree without running tests.
    Discover,
    /// List registered assertion operators.
    Operators,
}

impl BrambleArgs {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }

    /// Loads `--config` (if any) and applies the flags on top.
    pub fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };
        config.include_tags.extend(self.tags.iter().cloned());
        config.exclude_tags.extend(self.exclude_tags.iter().cloned());
        config.full_name.extend(self.full_name.iter().cloned());
        for raw in &self.params {
            let (key, value) = RunConfig::parse_parameter(raw)?;
            config.parameters.insert(key, value);
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn flags_extend_defaults() {
        let args = BrambleArgs::parse_from([
            "bramble",
            "--tag",
            "fast",
            "--param",
            "retries=3",
            "discover",
            "--output",
            "detailed",
        ]);
        assert_eq!(args.command(), Command::Discover);
        let config = args.run_config().unwrap();
        assert_eq!(config.include_tags, vec!["fast".to_string()]);
        assert_eq!(config.parameters.get("retries"), Some(&Value::from(3)));
        assert_eq!(config.output, OutputLevel::Detailed);
    }

    #[test]
    fn run_is_the_default_command() {
        let args = BrambleArgs::parse_from(["bramble"]);
        assert_eq!(args.command(), Command::Run);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "exclude_tags: [slow]\noutput: none\nparameters:\n  n: 1\n").unwrap();
        let args = BrambleArgs::parse_from([
            "bramble",
            "--config",
            path.to_str().unwrap(),
            "--param",
            "n=2",
        ]);
        let config = args.run_config().unwrap();
        assert_eq!(config.exclude_tags, vec!["slow".to_string()]);
        assert_eq!(config.output, OutputLevel::None);
        assert_eq!(config.parameters.get("n"), Some(&Value::from(2)));
    }
}
