//! Policy Engine (C1): classifies a tokenized command into a [`RiskTier`]
//! and decides allow/deny under a [`SecurityMode`].
//!
//! Replaces a hardcoded `match cmd0 { ... }` shape with data: a provider
//! supplies a [`PolicyTable`] of read-only verb patterns and a categorized
//! block-list, evaluated in declared order.

use wildmatch::WildMatch;

use crate::error::PolicyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskTier {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskTier::Safe => "safe",
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    Strict,
    Permissive,
}

impl SecurityMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "strict" => Some(SecurityMode::Strict),
            "permissive" => Some(SecurityMode::Permissive),
            _ => None,
        }
    }
}

impl Default for SecurityMode {
    fn default() -> Self {
        SecurityMode::Strict
    }
}

/// One categorized block-list family, e.g. "identity" mutations at
/// `Critical` tier. `matches` is evaluated against the full token stream
/// (not just the verb) so a category can key off argument shape, e.g. a
/// `--public-read` flag on a storage command.
pub struct BlocklistCategory {
    pub name: &'static str,
    pub tier: RiskTier,
    pub matches: fn(&[String]) -> bool,
}

/// Per-provider policy data: which verbs are read-only, and the ordered
/// block-list categories to walk when a verb is not read-only.
pub struct PolicyTable {
    pub read_only_verbs: &'static [&'static str],
    pub blocklist: &'static [BlocklistCategory],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { warnings: Vec<String> },
    Deny { category: String, reason: String },
}

/// Extracts the "verb" of a tokenized command: the last token in the
/// contiguous run of non-flag tokens following the command prefix (index
/// 0). This matches the shape of all three provider CLIs: `aws ec2
/// describe-instances`, `az vm list`, `gcloud compute instances list` all
/// carry their action as the last bare token before any `--flag`.
pub fn extract_verb(tokens: &[String]) -> Option<&str> {
    tokens
        .iter()
        .skip(1)
        .take_while(|t| !t.starts_with('-'))
        .last()
        .map(String::as_str)
}

/// Classifies a tokenized command into a [`RiskTier`] (C1 contract:
/// `classify`).
pub fn classify(table: &PolicyTable, tokens: &[String]) -> RiskTier {
    if let Some(verb) = extract_verb(tokens) {
        if table
            .read_only_verbs
            .iter()
            .any(|pattern| WildMatch::new(pattern).matches(verb))
        {
            return RiskTier::Safe;
        }
    }

    for category in table.blocklist {
        if (category.matches)(tokens) {
            return category.tier;
        }
    }

    RiskTier::Low
}

/// Classifies and validates a tokenized command under `mode` (C1 contract:
/// `validate`). `Safe` commands are always allowed. In `Strict` mode,
/// tiers >= `Medium` whose verb matched a block-list category are denied;
/// in `Permissive` mode the same commands are allowed with a warning.
pub fn validate(table: &PolicyTable, tokens: &[String], mode: SecurityMode) -> Decision {
    let tier = classify(table, tokens);

    if tier == RiskTier::Safe {
        return Decision::Allow {
            warnings: Vec::new(),
        };
    }

    let matched_category = table.blocklist.iter().find(|c| (c.matches)(tokens));

    match (mode, matched_category, tier >= RiskTier::Medium) {
        (SecurityMode::Strict, Some(category), true) => Decision::Deny {
            category: category.name.to_string(),
            reason: format!(
                "{}-mutating command blocked in strict mode (category={})",
                category.name, category.name
            ),
        },
        (SecurityMode::Permissive, Some(category), true) => Decision::Allow {
            warnings: vec![format!(
                "command classified as {tier} risk (category={}); allowed under permissive mode",
                category.name
            )],
        },
        (SecurityMode::Permissive, None, _) if tier >= RiskTier::Medium => Decision::Allow {
            warnings: vec![format!(
                "command classified as {tier} risk; allowed under permissive mode"
            )],
        },
        _ => Decision::Allow {
            warnings: Vec::new(),
        },
    }
}

/// Converts a [`Decision::Deny`] into the `PolicyError` the Provider Gateway
/// surfaces to its caller.
pub fn decision_to_result(decision: Decision) -> Result<Vec<String>, PolicyError> {
    match decision {
        Decision::Allow { warnings } => Ok(warnings),
        Decision::Deny { category, reason } => Err(PolicyError::Denied { category, reason }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn identity_matches(tokens: &[String]) -> bool {
        matches!(
            extract_verb(tokens),
            Some("create-user" | "delete-user" | "attach-role-policy")
        )
    }

    fn table() -> PolicyTable {
        static BLOCKLIST: &[BlocklistCategory] = &[BlocklistCategory {
            name: "identity",
            tier: RiskTier::Critical,
            matches: identity_matches,
        }];
        PolicyTable {
            read_only_verbs: &["describe-*", "list-*", "get-*", "show-*"],
            blocklist: BLOCKLIST,
        }
    }

    #[test]
    fn safe_verbs_classify_safe_and_always_allow() {
        let table = table();
        let cmd = toks("aws ec2 describe-instances");
        assert_eq!(classify(&table, &cmd), RiskTier::Safe);
        assert_eq!(
            validate(&table, &cmd, SecurityMode::Strict),
            Decision::Allow {
                warnings: Vec::new()
            }
        );
    }

    #[test]
    fn blocklisted_verb_denies_in_strict_mode() {
        let table = table();
        let cmd = toks("aws iam create-user --user-name evil");
        assert_eq!(classify(&table, &cmd), RiskTier::Critical);
        let decision = validate(&table, &cmd, SecurityMode::Strict);
        assert_eq!(
            decision,
            Decision::Deny {
                category: "identity".to_string(),
                reason: "identity-mutating command blocked in strict mode (category=identity)"
                    .to_string(),
            }
        );
    }

    #[test]
    fn blocklisted_verb_allowed_with_warning_in_permissive_mode() {
        let table = table();
        let cmd = toks("aws iam create-user --user-name evil");
        let decision = validate(&table, &cmd, SecurityMode::Permissive);
        match decision {
            Decision::Allow { warnings } => assert_eq!(warnings.len(), 1),
            other => panic!("expected allow with warning, got {other:?}"),
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let table = table();
        let cmd = toks("aws iam create-user --user-name evil");
        let first = validate(&table, &cmd, SecurityMode::Strict);
        let second = validate(&table, &cmd, SecurityMode::Strict);
        assert_eq!(first, second);
    }

    #[test]
    fn unmatched_mutating_verb_falls_through_to_low() {
        let table = table();
        let cmd = toks("aws ec2 reboot-instances --instance-id i-1");
        assert_eq!(classify(&table, &cmd), RiskTier::Low);
    }
}
