//! Core engine for the multi-cloud command gateway: natural-language and
//! direct command interpretation, a risk-tiered security policy, a
//! no-shell pipeline executor, and a playbook-driven remediation state
//! machine, fronted by one façade per provider CLI (AWS/GCP/Azure).
//!
//! This crate has no network listener and no persistence layer; it is a
//! library consumed by the `gateway-cli` binary or any other caller that
//! wants the same decision/execution engine embedded.

pub mod config;
pub mod error;
pub mod exec;
pub mod nl;
pub mod pipeline;
pub mod playbook;
pub mod policy;
pub mod provider;
pub mod types;

pub use config::ConfigOverrides;
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use error::Result;
pub use provider::ProviderContext;
pub use provider::ProviderGateway;
pub use types::ExecutionResult;
pub use types::ExecutionStatus;
pub use types::Finding;
pub use types::ProviderKind;
