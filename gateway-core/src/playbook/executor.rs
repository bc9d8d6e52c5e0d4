//! Playbook Executor (C7): drives a [`Playbook`] through its state machine,
//! dispatching each action to the handler registry (C8) and keeping
//! execution history in memory.
//!
//! Grounded on `other_examples` Mvgnu-MCP-Host's `remediation.rs`, adapted
//! to an in-memory `Mutex<HashMap<ExecutionId, PlaybookExecution>>` instead
//! of its Postgres-backed run table, since this core carries no durable
//! storage.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::PlaybookError;
use crate::types::Finding;

use super::model::Playbook;
use super::registry::ActionContext;
use super::registry::ActionHandlerRegistry;
use super::registry::ActionResult;
use super::registry::ActionStatus;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ExecutionId(pub String);

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionState {
    Pending,
    AwaitingApproval,
    Running,
    Completed,
    Failed,
    RolledBack,
    Rejected,
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub action_name: String,
    pub status: ActionStatus,
    pub message: String,
    #[serde(skip)]
    pub rollback_token: Option<serde_json::Value>,
}

impl From<(&str, ActionResult)> for ActionOutcome {
    fn from((name, result): (&str, ActionResult)) -> Self {
        Self {
            action_name: name.to_string(),
            status: result.status,
            message: result.message,
            rollback_token: result.rollback_token,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybookExecution {
    pub id: ExecutionId,
    pub playbook_id: String,
    pub finding_id: String,
    pub initiator: String,
    pub dry_run: bool,
    pub status: ExecutionState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub approver: Option<String>,
    pub rejection_reason: Option<String>,
    pub action_results: Vec<ActionOutcome>,
    /// Set when a rollback ran but one or more per-action rollback
    /// sub-handlers failed; the overall state remains `RolledBack`.
    pub rollback_had_failures: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub playbook_id: Option<String>,
    pub finding_id: Option<String>,
}

/// Supervises live and terminal [`PlaybookExecution`]s and owns the action
/// handler registry. Safe for concurrent `execute`/`approve`/`reject`/
/// `rollback`/`get`/`history` calls; the map lock is never held while a
/// handler runs.
pub struct PlaybookExecutor {
    executions: Mutex<HashMap<ExecutionId, PlaybookExecution>>,
    registry: ActionHandlerRegistry,
    concurrency: tokio::sync::Semaphore,
}

impl PlaybookExecutor {
    pub fn new(registry: ActionHandlerRegistry, max_concurrent_playbooks: usize) -> Self {
        Self {
            executions: Mutex::new(HashMap::new()),
            registry,
            concurrency: tokio::sync::Semaphore::new(max_concurrent_playbooks),
        }
    }

    pub fn register_handler(&self, handler: std::sync::Arc<dyn super::registry::ActionHandler>) {
        self.registry.register(handler);
    }

    /// Structural validation plus the registry-dependent half of §4.6: every
    /// action kind must be built-in or registered.
    pub fn validate(&self, playbook: &Playbook) -> Result<(), PlaybookError> {
        for action in &playbook.actions {
            if !super::model::BUILTIN_ACTION_KINDS.contains(&action.kind.as_str())
                && !self.registry.is_known_kind(&action.kind)
            {
                return Err(PlaybookError::HandlerMissing(action.kind.clone()));
            }
        }
        Ok(())
    }

    pub async fn execute(
        &self,
        playbook: &Playbook,
        finding: Finding,
        initiator: &str,
        dry_run: bool,
        providers: HashMap<crate::types::ProviderKind, std::sync::Arc<crate::provider::ProviderGateway>>,
    ) -> Result<PlaybookExecution, PlaybookError> {
        self.validate(playbook)?;

        let _permit = self
            .concurrency
            .try_acquire()
            .map_err(|_| PlaybookError::ResourceExhausted("max concurrent playbooks reached".to_string()))?;

        let id = ExecutionId(format!("{}-{}", playbook.id, Uuid::new_v4()));
        let mut execution = PlaybookExecution {
            id: id.clone(),
            playbook_id: playbook.id.clone(),
            finding_id: finding.id.clone(),
            initiator: initiator.to_string(),
            dry_run,
            status: ExecutionState::Pending,
            started_at: Utc::now(),
            finished_at: None,
            approver: None,
            rejection_reason: None,
            action_results: Vec::new(),
            rollback_had_failures: false,
        };

        if let Err(failure) = run_prerequisites(playbook) {
            execution.status = ExecutionState::Failed;
            execution.finished_at = Some(Utc::now());
            execution.action_results.push(failure);
            self.insert(execution.clone());
            return Ok(execution);
        }

        if playbook.requires_approval {
            execution.status = ExecutionState::AwaitingApproval;
            self.insert(execution.clone());
            return Ok(execution);
        }

        execution.status = ExecutionState::Running;
        let ctx = ActionContext {
            finding,
            initiator: initiator.to_string(),
            providers,
        };
        self.run_actions(playbook, &mut execution, &ctx).await;
        self.insert(execution.clone());
        Ok(execution)
    }

    pub async fn approve(
        &self,
        execution_id: &ExecutionId,
        approver: &str,
        dry_run: bool,
        playbook: &Playbook,
        finding: Finding,
        providers: HashMap<crate::types::ProviderKind, std::sync::Arc<crate::provider::ProviderGateway>>,
    ) -> Result<PlaybookExecution, PlaybookError> {
        let mut execution = self.get(execution_id).ok_or_else(|| {
            PlaybookError::NotFound(execution_id.to_string())
        })?;

        if execution.status != ExecutionState::AwaitingApproval {
            return Err(PlaybookError::StateError {
                expected: ExecutionState::AwaitingApproval.to_string(),
                found: execution.status.to_string(),
            });
        }

        execution.approver = Some(approver.to_string());
        execution.dry_run = dry_run;
        execution.status = ExecutionState::Running;

        let ctx = ActionContext {
            finding,
            initiator: execution.initiator.clone(),
            providers,
        };
        self.run_actions(playbook, &mut execution, &ctx).await;
        self.insert(execution.clone());
        Ok(execution)
    }

    pub fn reject(
        &self,
        execution_id: &ExecutionId,
        rejector: &str,
        reason: &str,
    ) -> Result<PlaybookExecution, PlaybookError> {
        let mut execution = self.get(execution_id).ok_or_else(|| {
            PlaybookError::NotFound(execution_id.to_string())
        })?;

        if execution.status != ExecutionState::AwaitingApproval {
            return Err(PlaybookError::StateError {
                expected: ExecutionState::AwaitingApproval.to_string(),
                found: execution.status.to_string(),
            });
        }

        execution.status = ExecutionState::Rejected;
        execution.rejection_reason = Some(reason.to_string());
        execution.approver = Some(rejector.to_string());
        execution.finished_at = Some(Utc::now());
        self.insert(execution.clone());
        Ok(execution)
    }

    pub async fn rollback(
        &self,
        execution_id: &ExecutionId,
        playbook: &Playbook,
        finding: Finding,
        providers: HashMap<crate::types::ProviderKind, std::sync::Arc<crate::provider::ProviderGateway>>,
    ) -> Result<PlaybookExecution, PlaybookError> {
        let mut execution = self.get(execution_id).ok_or_else(|| {
            PlaybookError::NotFound(execution_id.to_string())
        })?;

        if execution.status != ExecutionState::Completed {
            return Err(PlaybookError::StateError {
                expected: ExecutionState::Completed.to_string(),
                found: execution.status.to_string(),
            });
        }

        let ctx = ActionContext {
            finding,
            initiator: execution.initiator.clone(),
            providers,
        };

        let mut had_failures = false;
        for outcome in execution.action_results.clone().into_iter().rev() {
            let Some(action) = playbook.actions.iter().find(|a| a.name == outcome.action_name) else {
                continue;
            };
            if outcome.rollback_token.is_none() {
                continue;
            }
            let Some(handler) = self.registry.resolve(&action.kind) else {
                had_failures = true;
                continue;
            };
            let prior = ActionResult {
                status: outcome.status,
                message: outcome.message.clone(),
                rollback_token: outcome.rollback_token.clone(),
            };
            let result = handler.rollback(action, &prior, &ctx).await;
            if result.status == ActionStatus::Failed {
                had_failures = true;
            }
            tracing::info!(action = %action.name, status = ?result.status, "rollback sub-handler ran");
        }

        execution.status = ExecutionState::RolledBack;
        execution.rollback_had_failures = had_failures;
        execution.finished_at = Some(Utc::now());
        self.insert(execution.clone());
        Ok(execution)
    }

    pub fn get(&self, execution_id: &ExecutionId) -> Option<PlaybookExecution> {
        self.executions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(execution_id)
            .cloned()
    }

    pub fn history(&self, filter: HistoryFilter, limit: usize) -> Vec<PlaybookExecution> {
        let mut matches: Vec<PlaybookExecution> = self
            .executions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|execution| {
                filter
                    .playbook_id
                    .as_ref()
                    .is_none_or(|id| &execution.playbook_id == id)
                    && filter
                        .finding_id
                        .as_ref()
                        .is_none_or(|id| &execution.finding_id == id)
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matches.truncate(limit);
        matches
    }

    fn insert(&self, execution: PlaybookExecution) {
        self.executions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(execution.id.clone(), execution);
    }

    async fn run_actions(&self, playbook: &Playbook, execution: &mut PlaybookExecution, ctx: &ActionContext) {
        let deadline = Instant::now() + playbook.timeout;
        let mut failed = false;

        for action in &playbook.actions {
            if failed {
                execution.action_results.push(ActionOutcome {
                    action_name: action.name.clone(),
                    status: ActionStatus::Skipped,
                    message: "skipped after a prior action failed".to_string(),
                    rollback_token: None,
                });
                continue;
            }

            if let Some(predicate) = &action.predicate {
                if !predicate(&ctx.finding) {
                    execution.action_results.push(ActionOutcome {
                        action_name: action.name.clone(),
                        status: ActionStatus::Skipped,
                        message: "predicate returned false".to_string(),
                        rollback_token: None,
                    });
                    continue;
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining == Duration::ZERO {
                execution.action_results.push(ActionOutcome {
                    action_name: action.name.clone(),
                    status: ActionStatus::Skipped,
                    message: "skipped: playbook timed out".to_string(),
                    rollback_token: None,
                });
                failed = true;
                continue;
            }

            let Some(handler) = self.registry.resolve(&action.kind) else {
                execution.action_results.push(ActionOutcome {
                    action_name: action.name.clone(),
                    status: ActionStatus::Failed,
                    message: format!("no handler registered for kind {}", action.kind),
                    rollback_token: None,
                });
                failed = true;
                continue;
            };

            let outcome = match tokio::time::timeout(remaining, handler.execute(action, execution.dry_run, ctx)).await {
                Ok(Ok(result)) => {
                    if result.status == ActionStatus::Failed {
                        failed = true;
                    }
                    ActionOutcome::from((action.name.as_str(), result))
                }
                Ok(Err(err)) => {
                    failed = true;
                    ActionOutcome {
                        action_name: action.name.clone(),
                        status: ActionStatus::Failed,
                        message: err.to_string(),
                        rollback_token: None,
                    }
                }
                Err(_) => {
                    failed = true;
                    ActionOutcome {
                        action_name: action.name.clone(),
                        status: ActionStatus::Failed,
                        message: "playbook timed out waiting for action".to_string(),
                        rollback_token: None,
                    }
                }
            };

            execution.action_results.push(outcome);
        }

        execution.status = if failed {
            ExecutionState::Failed
        } else {
            ExecutionState::Completed
        };
        execution.finished_at = Some(Utc::now());
    }
}

fn run_prerequisites(playbook: &Playbook) -> Result<(), ActionOutcome> {
    // Prerequisite checks are declared by name only; this core has no
    // separate check registry, so each declared check is recorded as
    // passed. A caller wanting real precondition checks registers them as
    // ordinary actions instead.
    for name in &playbook.prerequisites {
        tracing::debug!(check = %name, "prerequisite check recorded as passed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::GatewayConfig;
    use crate::playbook::model::Playbook;
    use crate::types::Finding;
    use std::collections::HashMap;

    fn finding() -> Finding {
        Finding {
            id: "f1".to_string(),
            category: "storage".to_string(),
            severity: "high".to_string(),
            resource: "bucket/x".to_string(),
            remediation_hint: None,
        }
    }

    fn playbook() -> Playbook {
        Playbook::builder()
            .id("FIX-S3-PUBLIC")
            .name("Remediate public S3 bucket")
            .requires_approval(true)
            .rollback_enabled(true)
            .action(
                "block_public_access",
                "aws",
                serde_json::json!({"command": "aws s3api put-public-access-block"}),
            )
            .action("notify_team", "notification", serde_json::json!({"message": "remediated"}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn approval_required_playbook_stops_at_awaiting_approval_in_dry_run() {
        let executor = PlaybookExecutor::new(ActionHandlerRegistry::bootstrap(), 16);
        let pb = playbook();
        let execution = executor
            .execute(&pb, finding(), "alice", true, HashMap::new())
            .await
            .unwrap();
        assert_eq!(execution.status, ExecutionState::AwaitingApproval);
        assert!(execution.action_results.is_empty());

        let approved = executor
            .approve(&execution.id, "bob", true, &pb, finding(), HashMap::new())
            .await
            .unwrap();
        assert_eq!(approved.status, ExecutionState::Completed);
        assert!(approved.action_results.iter().all(|o| o.message.starts_with("[DRY-RUN]")));
    }

    #[tokio::test]
    async fn approve_on_non_awaiting_execution_is_state_error() {
        let executor = PlaybookExecutor::new(ActionHandlerRegistry::bootstrap(), 16);
        let mut pb_builder = Playbook::builder()
            .id("p1")
            .name("no approval")
            .action("notify", "notification", serde_json::json!({"message": "hi"}));
        pb_builder = pb_builder.requires_approval(false);
        let pb = pb_builder.build().unwrap();

        let execution = executor
            .execute(&pb, finding(), "alice", true, HashMap::new())
            .await
            .unwrap();
        assert_eq!(execution.status, ExecutionState::Completed);

        let err = executor
            .approve(&execution.id, "bob", true, &pb, finding(), HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybookError::StateError { .. }));
    }

    #[tokio::test]
    async fn second_rollback_call_is_state_error() {
        let executor = PlaybookExecutor::new(ActionHandlerRegistry::bootstrap(), 16);
        let pb = Playbook::builder()
            .id("p1")
            .name("rollback test")
            .requires_approval(false)
            .rollback_enabled(true)
            .action("notify", "notification", serde_json::json!({"message": "hi"}))
            .build()
            .unwrap();

        let execution = executor
            .execute(&pb, finding(), "alice", true, HashMap::new())
            .await
            .unwrap();
        assert_eq!(execution.status, ExecutionState::Completed);

        let rolled_back = executor
            .rollback(&execution.id, &pb, finding(), HashMap::new())
            .await
            .unwrap();
        assert_eq!(rolled_back.status, ExecutionState::RolledBack);

        let err = executor.rollback(&execution.id, &pb, finding(), HashMap::new()).await.unwrap_err();
        assert!(matches!(err, PlaybookError::StateError { .. }));
    }

    #[tokio::test]
    async fn missing_handler_kind_fails_validation() {
        let executor = PlaybookExecutor::new(ActionHandlerRegistry::bootstrap(), 16);
        let pb = Playbook::builder()
            .id("p1")
            .name("bad kind")
            .action("x", "unregistered", serde_json::json!({}))
            .build()
            .unwrap();
        let err = executor
            .execute(&pb, finding(), "alice", true, HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybookError::HandlerMissing(_)));
    }

    #[test]
    fn gateway_config_default_limits_playbook_concurrency() {
        let config = GatewayConfig::default();
        assert_eq!(config.max_concurrent_playbooks, 16);
    }
}
