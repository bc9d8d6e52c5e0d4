//! Data types shared across policy, execution, and playbook components.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// One of the three cloud provider CLIs the gateway normalizes behind a
/// single contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Aws,
    Gcp,
    Azure,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Aws => "aws",
            ProviderKind::Gcp => "gcp",
            ProviderKind::Azure => "azure",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome discriminant for an `ExecutionResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
}

/// Discriminates *why* an `ExecutionResult` failed. `None` when `status` is
/// `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    None,
    Timeout,
    AuthError,
    ValidationError,
    ExecutionError,
}

/// The result of running one (possibly pipelined) command through the
/// Process Executor (C4), after C5 has composed the full round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub output: String,
    pub structured: Option<Value>,
    pub exit_code: Option<i32>,
    pub error_kind: ErrorKind,
    pub truncated: bool,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    /// Non-fatal advisory attached by the policy engine, e.g. a warning in
    /// `Permissive` mode. Empty when there is nothing to report.
    pub warnings: Vec<String>,
}

impl ExecutionResult {
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Error,
            output: message.into(),
            structured: None,
            exit_code: None,
            error_kind: ErrorKind::ValidationError,
            truncated: false,
            elapsed: Duration::ZERO,
            warnings: Vec::new(),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(value.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

/// External input, opaque to the engine except for the fields it reads to
/// drive a playbook execution. Never mutated by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub category: String,
    pub severity: String,
    pub resource: String,
    pub remediation_hint: Option<String>,
}
