//! External services the steps depend on.
//!
//! None of these are implemented here; applications plug in a static
//! analyzer, a build/test runner and something that writes files.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use crate::orchestration::ChangeApplier;

/// One statement about the codebase, e.g. "UserStore implements IUserStore".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fact(pub String);

impl Fact {
    /// Statement text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Fact {
    fn from(value: &str) -> Self {
        Fact(value.to_string())
    }
}

impl From<String> for Fact {
    fn from(value: String) -> Self {
        Fact(value)
    }
}

impl std::fmt::Display for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts code-structure facts relevant to a scope.
#[async_trait]
pub trait StaticAnalysisService: Send + Sync {
    /// Facts about everything under `scope` (a path, namespace or module name)
    async fn analyze(&self, scope: &str) -> Result<Vec<Fact>>;
}

/// Result of building and testing a set of changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Whether the build and tests succeeded
    pub passed: bool,
    /// Compiler errors, failing tests and the like
    pub diagnostics: Vec<String>,
}

impl VerificationReport {
    /// Changes built and tests passed
    pub fn pass() -> Self {
        Self {
            passed: true,
            diagnostics: Vec::new(),
        }
    }

    /// Verification failed with the given diagnostics
    pub fn fail<I, S>(diagnostics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            passed: false,
            diagnostics: diagnostics.into_iter().map(Into::into).collect(),
        }
    }
}

/// Compile/test oracle for proposed changes.
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Verify the full proposed content of every path in `changes`
    async fn verify(&self, changes: &BTreeMap<String, String>) -> Result<VerificationReport>;
}
