//! Action Handler Registry (C8): a typed, string-keyed dispatch table for
//! playbook actions.
//!
//! Grounded on `other_examples` Mvgnu-MCP-Host's `RemediationExecutorRegistry`
//! (`Arc<dyn RemediationExecutor>` keyed by kind, `bootstrap()`/`get()`), with
//! the trait kept object-safe via `async_trait` the same way.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PlaybookError;
use crate::pipeline;
use crate::provider::ProviderGateway;
use crate::types::Finding;
use crate::types::ProviderKind;

use super::model::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ActionResult {
    pub status: ActionStatus,
    pub message: String,
    /// Opaque state captured at success time, consumed by the matching
    /// rollback sub-handler. `None` means this action cannot be rolled back.
    pub rollback_token: Option<Value>,
}

impl ActionResult {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Skipped,
            message: reason.into(),
            rollback_token: None,
        }
    }

    pub fn dry_run(action: &Action) -> Self {
        Self {
            status: ActionStatus::Completed,
            message: format!("[DRY-RUN] would execute action {} ({})", action.name, action.kind),
            rollback_token: None,
        }
    }
}

/// Read-only data a handler needs to act: the finding that triggered the
/// playbook, who initiated it, and the provider gateways it may route
/// through.
pub struct ActionContext {
    pub finding: Finding,
    pub initiator: String,
    pub providers: HashMap<ProviderKind, Arc<ProviderGateway>>,
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn execute(
        &self,
        action: &Action,
        dry_run: bool,
        ctx: &ActionContext,
    ) -> Result<ActionResult, PlaybookError>;

    /// Consumes a prior success's `rollback_token` to undo it. The default
    /// implementation reports the action as not reversible.
    async fn rollback(
        &self,
        action: &Action,
        _prior: &ActionResult,
        _ctx: &ActionContext,
    ) -> ActionResult {
        ActionResult::skipped(format!("{} has no rollback sub-handler", action.kind))
    }
}

pub struct ActionHandlerRegistry {
    handlers: Mutex<HashMap<String, Arc<dyn ActionHandler>>>,
}

impl ActionHandlerRegistry {
    /// Registers the built-in handlers (`aws`, `gcp`, `azure`, `notification`,
    /// `script`), mirroring `RemediationExecutorRegistry::bootstrap`.
    pub fn bootstrap() -> Self {
        let registry = Self {
            handlers: Mutex::new(HashMap::new()),
        };
        registry.register(Arc::new(ProviderActionHandler::new(ProviderKind::Aws)));
        registry.register(Arc::new(ProviderActionHandler::new(ProviderKind::Gcp)));
        registry.register(Arc::new(ProviderActionHandler::new(ProviderKind::Azure)));
        registry.register(Arc::new(NotificationActionHandler));
        registry.register(Arc::new(ScriptActionHandler));
        registry
    }

    pub fn register(&self, handler: Arc<dyn ActionHandler>) {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handler.kind().to_string(), handler);
    }

    pub fn resolve(&self, kind: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner()).get(kind).cloned()
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.resolve(kind).is_some()
    }
}

/// Handles `aws`/`gcp`/`azure` actions by composing a command from
/// `params.command` and routing it through the matching [`ProviderGateway`].
struct ProviderActionHandler {
    kind: ProviderKind,
}

impl ProviderActionHandler {
    fn new(kind: ProviderKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl ActionHandler for ProviderActionHandler {
    fn kind(&self) -> &'static str {
        self.kind.as_str()
    }

    async fn execute(
        &self,
        action: &Action,
        dry_run: bool,
        ctx: &ActionContext,
    ) -> Result<ActionResult, PlaybookError> {
        if dry_run {
            return Ok(ActionResult::dry_run(action));
        }

        let command = action
            .params
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PlaybookError::HandlerError {
                    action: action.name.clone(),
                    reason: "missing params.command".to_string(),
                }
            })?;

        let gateway = ctx.providers.get(&self.kind).ok_or_else(|| PlaybookError::HandlerError {
            action: action.name.clone(),
            reason: format!("no {} provider gateway configured", self.kind),
        })?;

        let result = gateway.execute_command(command).await;
        let rollback_token = action.params.get("rollback_command").cloned().map(|cmd| {
            serde_json::json!({ "rollback_command": cmd })
        });

        match result.status {
            crate::types::ExecutionStatus::Success => Ok(ActionResult {
                status: ActionStatus::Completed,
                message: result.output,
                rollback_token,
            }),
            crate::types::ExecutionStatus::Error => Err(PlaybookError::HandlerError {
                action: action.name.clone(),
                reason: result.output,
            }),
        }
    }

    async fn rollback(&self, action: &Action, prior: &ActionResult, ctx: &ActionContext) -> ActionResult {
        let Some(token) = &prior.rollback_token else {
            return ActionResult::skipped(format!("{} has no rollback token", action.name));
        };
        let Some(command) = token.get("rollback_command").and_then(Value::as_str) else {
            return ActionResult::skipped(format!("{} rollback token missing command", action.name));
        };
        let Some(gateway) = ctx.providers.get(&self.kind) else {
            return ActionResult::skipped(format!("no {} provider gateway configured", self.kind));
        };

        let result = gateway.execute_command(command).await;
        match result.status {
            crate::types::ExecutionStatus::Success => ActionResult {
                status: ActionStatus::Completed,
                message: result.output,
                rollback_token: None,
            },
            crate::types::ExecutionStatus::Error => ActionResult {
                status: ActionStatus::Failed,
                message: result.output,
                rollback_token: None,
            },
        }
    }
}

/// Records the intended notification message; never mutates external
/// state, dry run or not.
struct NotificationActionHandler;

#[async_trait]
impl ActionHandler for NotificationActionHandler {
    fn kind(&self) -> &'static str {
        "notification"
    }

    async fn execute(
        &self,
        action: &Action,
        dry_run: bool,
        _ctx: &ActionContext,
    ) -> Result<ActionResult, PlaybookError> {
        if dry_run {
            return Ok(ActionResult::dry_run(action));
        }

        let message = action
            .params
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("(no message supplied)");

        Ok(ActionResult {
            status: ActionStatus::Completed,
            message: format!("notified: {message}"),
            rollback_token: None,
        })
    }
}

/// Runs a bounded, tokenized command via the Process Executor, subject to
/// C1/C3 policy the same as any provider gateway command.
struct ScriptActionHandler;

const SCRIPT_ALLOWED_PREFIXES: &[&str] = &["aws", "az", "gcloud", "gsutil"];

#[async_trait]
impl ActionHandler for ScriptActionHandler {
    fn kind(&self) -> &'static str {
        "script"
    }

    async fn execute(
        &self,
        action: &Action,
        dry_run: bool,
        ctx: &ActionContext,
    ) -> Result<ActionResult, PlaybookError> {
        if dry_run {
            return Ok(ActionResult::dry_run(action));
        }

        let command = action
            .params
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| PlaybookError::HandlerError {
                action: action.name.clone(),
                reason: "missing params.command".to_string(),
            })?;

        let stages = pipeline::parse(command).map_err(|err| PlaybookError::HandlerError {
            action: action.name.clone(),
            reason: err.to_string(),
        })?;
        pipeline::validate(&stages, SCRIPT_ALLOWED_PREFIXES).map_err(|err| PlaybookError::HandlerError {
            action: action.name.clone(),
            reason: err.to_string(),
        })?;

        let prefix = stages[0].command_word();
        let provider_kind = match prefix {
            "aws" => ProviderKind::Aws,
            "az" => ProviderKind::Azure,
            _ => ProviderKind::Gcp,
        };
        let gateway = ctx.providers.get(&provider_kind).ok_or_else(|| PlaybookError::HandlerError {
            action: action.name.clone(),
            reason: format!("no {provider_kind} provider gateway configured"),
        })?;

        let result = gateway.execute_command(command).await;
        match result.status {
            crate::types::ExecutionStatus::Success => Ok(ActionResult {
                status: ActionStatus::Completed,
                message: result.output,
                rollback_token: None,
            }),
            crate::types::ExecutionStatus::Error => Err(PlaybookError::HandlerError {
                action: action.name.clone(),
                reason: result.output,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn ctx() -> ActionContext {
        ActionContext {
            finding: Finding {
                id: "f1".to_string(),
                category: "storage".to_string(),
                severity: "high".to_string(),
                resource: "bucket/x".to_string(),
                remediation_hint: None,
            },
            initiator: "alice".to_string(),
            providers: HashMap::new(),
        }
    }

    fn action(kind: &str) -> Action {
        Action {
            name: "a1".to_string(),
            kind: kind.to_string(),
            params: serde_json::json!({"message": "hi"}),
            predicate: None,
        }
    }

    #[tokio::test]
    async fn bootstrap_registers_builtin_kinds() {
        let registry = ActionHandlerRegistry::bootstrap();
        for kind in super::super::model::BUILTIN_ACTION_KINDS {
            assert!(registry.is_known_kind(kind), "missing builtin kind {kind}");
        }
        assert!(!registry.is_known_kind("unregistered"));
    }

    #[tokio::test]
    async fn notification_handler_never_spawns_and_prefixes_dry_run() {
        let registry = ActionHandlerRegistry::bootstrap();
        let handler = registry.resolve("notification").unwrap();
        let result = handler.execute(&action("notification"), true, &ctx()).await.unwrap();
        assert!(result.message.starts_with("[DRY-RUN]"));

        let result = handler.execute(&action("notification"), false, &ctx()).await.unwrap();
        assert_eq!(result.status, ActionStatus::Completed);
        assert!(result.message.contains("hi"));
    }
}
