//! Playbook Model (C6): an immutable, builder-constructed description of a
//! remediation procedure. Once built, a [`Playbook`] is `Send + Sync` and
//! trivially shareable across concurrent executions.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::PlaybookError;

/// Built-in action kinds the executor always knows how to resolve.
pub const BUILTIN_ACTION_KINDS: &[&str] = &["aws", "gcp", "azure", "notification", "script"];

pub type Predicate = Arc<dyn Fn(&crate::types::Finding) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Action {
    pub name: String,
    pub kind: String,
    pub params: Value,
    /// Optional guard evaluated against the triggering finding before the
    /// action runs; `None` means the action always runs.
    pub predicate: Option<Predicate>,
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Playbook {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub severity: String,
    pub prerequisites: Vec<String>,
    pub actions: Vec<Action>,
    pub requires_approval: bool,
    pub rollback_enabled: bool,
    pub timeout: Duration,
}

impl Playbook {
    pub fn builder() -> PlaybookBuilder {
        PlaybookBuilder::default()
    }
}

#[derive(Default)]
pub struct PlaybookBuilder {
    id: Option<String>,
    name: Option<String>,
    description: String,
    category: String,
    severity: String,
    prerequisites: Vec<String>,
    actions: Vec<Action>,
    requires_approval: bool,
    rollback_enabled: bool,
    timeout: Option<Duration>,
}

impl PlaybookBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = severity.into();
        self
    }

    pub fn requires_approval(mut self, requires_approval: bool) -> Self {
        self.requires_approval = requires_approval;
        self
    }

    pub fn rollback_enabled(mut self, rollback_enabled: bool) -> Self {
        self.rollback_enabled = rollback_enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn prerequisite(mut self, name: impl Into<String>) -> Self {
        self.prerequisites.push(name.into());
        self
    }

    pub fn action(self, name: impl Into<String>, kind: impl Into<String>, params: Value) -> Self {
        self.action_with_predicate(name, kind, params, None)
    }

    pub fn action_with_predicate(
        mut self,
        name: impl Into<String>,
        kind: impl Into<String>,
        params: Value,
        predicate: Option<Predicate>,
    ) -> Self {
        self.actions.push(Action {
            name: name.into(),
            kind: kind.into(),
            params,
            predicate,
        });
        self
    }

    /// Performs the structural checks that don't require the handler
    /// registry (non-empty id/name, at least one action, unique action
    /// names). Kind-against-registry validation happens in
    /// [`super::executor::PlaybookExecutor::validate`], which alone has
    /// access to the registry.
    pub fn build(self) -> Result<Playbook, PlaybookError> {
        let id = self
            .id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PlaybookError::Validation("playbook id must not be empty".into()))?;
        let name = self
            .name
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PlaybookError::Validation("playbook name must not be empty".into()))?;

        if self.actions.is_empty() {
            return Err(PlaybookError::Validation(
                "playbook must declare at least one action".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for action in &self.actions {
            if !seen.insert(action.name.as_str()) {
                return Err(PlaybookError::Validation(format!(
                    "duplicate action name: {}",
                    action.name
                )));
            }
        }

        Ok(Playbook {
            id,
            name,
            description: self.description,
            category: self.category,
            severity: self.severity,
            prerequisites: self.prerequisites,
            actions: self.actions,
            requires_approval: self.requires_approval,
            rollback_enabled: self.rollback_enabled,
            timeout: self.timeout.unwrap_or(Duration::from_secs(300)),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn build_requires_id_name_and_one_action() {
        let err = Playbook::builder().build().unwrap_err();
        assert!(matches!(err, PlaybookError::Validation(_)));

        let err = Playbook::builder()
            .id("p1")
            .name("example")
            .build()
            .unwrap_err();
        assert!(matches!(err, PlaybookError::Validation(_)));
    }

    #[test]
    fn build_rejects_duplicate_action_names() {
        let err = Playbook::builder()
            .id("p1")
            .name("example")
            .action("notify", "notification", serde_json::json!({}))
            .action("notify", "aws", serde_json::json!({}))
            .build()
            .unwrap_err();
        assert!(matches!(err, PlaybookError::Validation(_)));
    }

    #[test]
    fn build_succeeds_with_minimal_valid_playbook() {
        let playbook = Playbook::builder()
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
            .unwrap();

        assert_eq!(playbook.actions.len(), 2);
        assert!(playbook.requires_approval);
    }
}
