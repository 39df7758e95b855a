//! # Bramble
//!
//! A behavior-driven test framework core: an extensible assertion-operator
//! registry plus a hierarchical, phased block tree with data-driven expansion
//! and scoped resource cleanup.
//!
//! ## Module Structure
//!
//! - **`assertions`**: operators, the registry and the assertion engine
//! - **`tree`**: arena block tree, selection planning, data-driven expansion
//! - **`suite`**: the declaration API, Discovery/Run handling and `TestContext`
//! - **`scope`**: scope lifecycle manager and releasable resources
//! - **`runner`**: orchestrates suites through both phases
//! - **`report`**: reporter interface and outcomes
//! - **`config`**: run configuration and filters
//! - **`cli`**: command-line driver for suite binaries

pub mod assertions;
pub mod cli;
pub mod config;
pub mod errors;
pub mod report;
pub mod runner;
pub mod scope;
pub mod suite;
pub mod tree;
pub mod value;
pub mod wildcard;

pub use crate::assertions::{
    global_registry, register_operator, AssertionInvocation, AssertionOperator, AssertionResult,
    OperatorRegistry,
};
pub use crate::errors::{BrambleError, Result};
pub use crate::runner::{SuiteDefinition, SuiteRunner};
pub use crate::suite::{Declaration, Suite, TestContext};
pub use crate::value::Value;
