//! Provider Gateway (C5): one façade per cloud CLI (AWS/GCP/Azure) that owns
//! lifecycle, context (profile/subscription/project), and orchestrates
//! C2 (NL) -> C3 (pipeline parse) -> C1 (policy) -> C4 (exec).
//!
//! Each gateway is an explicit value constructed with a context struct, not
//! a module-level singleton, so a process can hold several concurrently
//! without one's state leaking into another's.

pub mod aws;
pub mod azure;
pub mod gcp;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::GatewayConfig;
use crate::error::PolicyError;
use crate::exec;
use crate::nl::PhraseDictionary;
use crate::pipeline;
use crate::policy;
use crate::policy::PolicyTable;
use crate::types::ErrorKind;
use crate::types::ExecutionResult;
use crate::types::ExecutionStatus;
use crate::types::ProviderKind;

/// Static, per-provider policy/NL data. One instance per [`ProviderKind`],
/// built once and shared read-only for the gateway's lifetime.
pub struct ProviderSpec {
    pub kind: ProviderKind,
    pub prefixes: &'static [&'static str],
    pub policy_table: PolicyTable,
    pub phrases: &'static [(&'static str, &'static str)],
    pub auth_error_patterns: &'static [&'static str],
}

/// Caller-supplied identity/scope for a provider session. Fields not
/// relevant to a given provider are simply ignored by that provider's
/// `env_overlay`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderContext {
    pub aws_profile: Option<String>,
    pub aws_region: Option<String>,
    pub azure_subscription_id: Option<String>,
    pub azure_tenant_id: Option<String>,
    pub gcp_project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    pub provider: ProviderKind,
    pub fields: Vec<(String, String)>,
}

fn context_info(kind: ProviderKind, ctx: &ProviderContext) -> ContextInfo {
    let mut fields = Vec::new();
    match kind {
        ProviderKind::Aws => {
            if let Some(v) = &ctx.aws_profile {
                fields.push(("profile".to_string(), v.clone()));
            }
            if let Some(v) = &ctx.aws_region {
                fields.push(("region".to_string(), v.clone()));
            }
        }
        ProviderKind::Azure => {
            if let Some(v) = &ctx.azure_subscription_id {
                fields.push(("subscription_id".to_string(), v.clone()));
            }
            if let Some(v) = &ctx.azure_tenant_id {
                fields.push(("tenant_id".to_string(), v.clone()));
            }
        }
        ProviderKind::Gcp => {
            if let Some(v) = &ctx.gcp_project_id {
                fields.push(("project_id".to_string(), v.clone()));
            }
        }
    }
    ContextInfo {
        provider: kind,
        fields,
    }
}

/// Returns the environment overlay this provider injects into stage 0,
/// skipping any variable whose equivalent CLI flag the user already passed.
fn env_overlay(kind: ProviderKind, ctx: &ProviderContext, stage0: &[String]) -> HashMap<String, String> {
    let has_flag = |flags: &[&str]| stage0.iter().any(|t| flags.iter().any(|f| t == f || t.starts_with(&format!("{f}="))));

    let mut overlay = HashMap::new();
    match kind {
        ProviderKind::Aws => {
            if !has_flag(&["--profile"]) {
                if let Some(v) = &ctx.aws_profile {
                    overlay.insert("AWS_PROFILE".to_string(), v.clone());
                }
            }
            if !has_flag(&["--region"]) {
                if let Some(v) = &ctx.aws_region {
                    overlay.insert("AWS_DEFAULT_REGION".to_string(), v.clone());
                }
            }
        }
        ProviderKind::Azure => {
            if !has_flag(&["--subscription"]) {
                if let Some(v) = &ctx.azure_subscription_id {
                    overlay.insert("AZURE_SUBSCRIPTION_ID".to_string(), v.clone());
                }
            }
            if let Some(v) = &ctx.azure_tenant_id {
                overlay.insert("AZURE_TENANT_ID".to_string(), v.clone());
            }
        }
        ProviderKind::Gcp => {
            if !has_flag(&["--project"]) {
                if let Some(v) = &ctx.gcp_project_id {
                    overlay.insert("GOOGLE_CLOUD_PROJECT".to_string(), v.clone());
                    overlay.insert("CLOUDSDK_CORE_PROJECT".to_string(), v.clone());
                }
            }
        }
    }
    overlay
}

/// One provider's façade: lifecycle plus the `executeCommand` round trip.
pub struct ProviderGateway {
    spec: &'static ProviderSpec,
    dictionary: PhraseDictionary,
    config: GatewayConfig,
    context: Mutex<Option<ProviderContext>>,
}

impl ProviderGateway {
    pub fn new(kind: ProviderKind, config: GatewayConfig) -> Self {
        let spec = spec_for(kind);
        Self {
            spec,
            dictionary: PhraseDictionary::new(spec.phrases),
            config,
            context: Mutex::new(None),
        }
    }

    /// Records the caller's desired context. Does not probe `PATH` itself;
    /// a missing provider binary surfaces as an `ExecError::Io` (`NotFound`)
    /// from the first `execute_command` call instead. See the "Provider
    /// binary verification" decision in DESIGN.md.
    pub fn start(&self, context: ProviderContext) {
        tracing::info!(provider = %self.spec.kind, "starting provider gateway");
        *self.context.lock().unwrap_or_else(|e| e.into_inner()) = Some(context);
    }

    /// Idempotent. Drops the recorded context; in-flight `executeCommand`
    /// calls are unaffected since each is self-contained.
    pub fn stop(&self) {
        tracing::info!(provider = %self.spec.kind, "stopping provider gateway");
        *self.context.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn is_running(&self) -> bool {
        self.context.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn current_context(&self) -> Option<ContextInfo> {
        self.context
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|ctx| context_info(self.spec.kind, ctx))
    }

    pub fn list_contexts(&self) -> Vec<ContextInfo> {
        self.current_context().into_iter().collect()
    }

    /// Runs the §4.5 `executeCommand` algorithm: NL resolution (if needed),
    /// pipeline parse, policy validation of stage 0, then execution.
    pub async fn execute_command(&self, text: &str) -> ExecutionResult {
        let resolved = match self.resolve_text(text) {
            Ok(command) => command,
            Err(message) => return ExecutionResult::validation_error(message),
        };

        let stages = match pipeline::parse(&resolved) {
            Ok(stages) => stages,
            Err(err) => return ExecutionResult::validation_error(err.to_string()),
        };

        if let Err(err) = pipeline::validate(&stages, self.spec.prefixes) {
            return ExecutionResult::validation_error(err.to_string());
        }

        let decision = policy::validate(
            &self.spec.policy_table,
            &stages[0].tokens,
            self.config.security_mode,
        );
        let warnings = match policy::decision_to_result(decision) {
            Ok(warnings) => warnings,
            Err(PolicyError::Denied { category, reason }) => {
                tracing::warn!(provider = %self.spec.kind, %category, "command denied by policy");
                return ExecutionResult::validation_error(reason);
            }
            Err(err) => return ExecutionResult::validation_error(err.to_string()),
        };

        let ctx_guard = self.context.lock().unwrap_or_else(|e| e.into_inner());
        let env = match ctx_guard.as_ref() {
            Some(ctx) => env_overlay(self.spec.kind, ctx, &stages[0].tokens),
            None => HashMap::new(),
        };
        drop(ctx_guard);

        let exec_ctx = exec::ExecContext {
            cwd: std::env::temp_dir(),
            env,
            max_wall_clock: self.config.max_wall_clock,
            max_output_bytes: self.config.max_output_bytes,
            auth_error_patterns: self.spec.auth_error_patterns.to_vec(),
        };

        let mut result = exec::execute(&stages, &exec_ctx).await;
        result.warnings.extend(warnings);
        result
    }

    fn resolve_text(&self, text: &str) -> Result<String, String> {
        let trimmed = text.trim();
        let starts_with_prefix = trimmed
            .split_whitespace()
            .next()
            .map(|first| self.spec.prefixes.contains(&first))
            .unwrap_or(false);

        if starts_with_prefix {
            return Ok(trimmed.to_string());
        }

        match self.dictionary.interpret(trimmed) {
            Some(command) => Ok(command.to_string()),
            None => Err("cannot interpret natural language phrase".to_string()),
        }
    }
}

fn spec_for(kind: ProviderKind) -> &'static ProviderSpec {
    match kind {
        ProviderKind::Aws => aws::spec(),
        ProviderKind::Gcp => gcp::spec(),
        ProviderKind::Azure => azure::spec(),
    }
}

impl std::fmt::Debug for ProviderGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderGateway")
            .field("provider", &self.spec.kind)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn unrecognized_text_is_validation_error() {
        let gateway = ProviderGateway::new(ProviderKind::Aws, GatewayConfig::default());
        let result = gateway.execute_command("launch the rocket").await;
        assert_eq!(result.status, ExecutionStatus::Error);
        assert_eq!(result.error_kind, ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn denied_command_never_spawns_a_child() {
        let gateway = ProviderGateway::new(ProviderKind::Aws, GatewayConfig::default());
        let result = gateway
            .execute_command("aws iam create-user --user-name evil")
            .await;
        assert_eq!(result.error_kind, ErrorKind::ValidationError);
        assert!(result.output.contains("identity"));
    }

    #[tokio::test]
    async fn start_records_context_and_stop_clears_it() {
        let gateway = ProviderGateway::new(ProviderKind::Aws, GatewayConfig::default());
        assert!(!gateway.is_running());
        gateway.start(ProviderContext {
            aws_profile: Some("prod".to_string()),
            ..Default::default()
        });
        assert!(gateway.is_running());
        assert_eq!(gateway.list_contexts().len(), 1);
        gateway.stop();
        assert!(!gateway.is_running());
    }
}
