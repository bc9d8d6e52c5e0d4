//! On-disk JSON representations of a [`Playbook`] and [`Finding`], since
//! the core's builder API takes Rust closures for action predicates that
//! have no serialized form. Files loaded through this module never carry
//! predicates.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use gateway_core::Finding;
use gateway_core::playbook::Playbook;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PlaybookFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    pub actions: Vec<ActionFile>,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub rollback_enabled: bool,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ActionFile {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl PlaybookFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading playbook file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing playbook file {}", path.display()))
    }

    pub fn into_playbook(self) -> anyhow::Result<Playbook> {
        let mut builder = Playbook::builder()
            .id(self.id)
            .name(self.name)
            .description(self.description)
            .category(self.category)
            .severity(self.severity)
            .requires_approval(self.requires_approval)
            .rollback_enabled(self.rollback_enabled);

        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        for prereq in self.prerequisites {
            builder = builder.prerequisite(prereq);
        }
        for action in self.actions {
            builder = builder.action(action.name, action.kind, action.params);
        }

        builder.build().map_err(anyhow::Error::from)
    }
}

pub fn load_finding(path: &Path) -> anyhow::Result<Finding> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading finding file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing finding file {}", path.display()))
}
