//! Pipeline Parser (C3): splits a command on unquoted `|`, rejects shell
//! metacharacters anywhere outside quotes, and validates each stage's first
//! token against the provider prefix set (stage 0) or the text-utility
//! allowlist (later stages).
//!
//! Never invokes a shell: tokenization is POSIX word-splitting done by hand
//! plus `shlex` for quote-aware word splitting within a stage, so the
//! executor always spawns a direct child with an explicit argv.

use crate::error::PolicyError;

/// The exact set of text utilities permitted as non-first pipeline stages.
pub const TEXT_UTILITY_ALLOWLIST: &[&str] =
    &["grep", "head", "tail", "cut", "awk", "sort", "uniq", "wc", "sed"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStage {
    pub tokens: Vec<String>,
}

impl PipelineStage {
    pub fn command_word(&self) -> &str {
        self.tokens[0].as_str()
    }
}

/// Splits `command` into raw stage substrings, respecting single/double
/// quotes, and rejects forbidden shell metacharacters (`;`, `&`, backtick,
/// `$(`, `<`, `>`) wherever they appear outside quotes.
fn split_respecting_quotes(command: &str) -> Result<Vec<String>, PolicyError> {
    let mut stages = Vec::new();
    let mut buf = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_double => {
                in_single = !in_single;
                buf.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                buf.push(c);
            }
            '|' if !in_single && !in_double => {
                stages.push(std::mem::take(&mut buf));
            }
            '`' if !in_single && !in_double => {
                return Err(PolicyError::Parse("backticks are not permitted".to_string()));
            }
            ';' if !in_single && !in_double => {
                return Err(PolicyError::Parse("`;` is not permitted".to_string()));
            }
            '&' if !in_single && !in_double => {
                return Err(PolicyError::Parse("`&` is not permitted".to_string()));
            }
            '<' if !in_single && !in_double => {
                return Err(PolicyError::Parse(
                    "input redirection is not permitted".to_string(),
                ));
            }
            '>' if !in_single && !in_double => {
                return Err(PolicyError::Parse(
                    "output redirection is not permitted".to_string(),
                ));
            }
            '$' if !in_single && !in_double && chars.peek() == Some(&'(') => {
                return Err(PolicyError::Parse(
                    "command substitution is not permitted".to_string(),
                ));
            }
            other => buf.push(other),
        }
    }

    if in_single || in_double {
        return Err(PolicyError::Parse("unbalanced quotes".to_string()));
    }

    stages.push(buf);
    Ok(stages)
}

/// Parses `command` into pipeline stages (C3 contract: `parse`).
pub fn parse(command: &str) -> Result<Vec<PipelineStage>, PolicyError> {
    let raw_stages = split_respecting_quotes(command)?;

    let mut stages = Vec::with_capacity(raw_stages.len());
    for raw in raw_stages {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PolicyError::Parse("empty pipeline stage".to_string()));
        }
        let tokens = shlex::split(trimmed)
            .ok_or_else(|| PolicyError::Parse("unbalanced quotes".to_string()))?;
        if tokens.is_empty() {
            return Err(PolicyError::Parse("empty pipeline stage".to_string()));
        }
        stages.push(PipelineStage { tokens });
    }

    Ok(stages)
}

/// Validates already-parsed stages (C3 contract: `validate`): stage 0 must
/// begin with a provider prefix token, every later stage's first token must
/// be in [`TEXT_UTILITY_ALLOWLIST`].
pub fn validate(stages: &[PipelineStage], provider_prefixes: &[&str]) -> Result<(), PolicyError> {
    let first = stages
        .first()
        .ok_or_else(|| PolicyError::Parse("empty command".to_string()))?;

    if !provider_prefixes.contains(&first.command_word()) {
        return Err(PolicyError::UnrecognizedPrefix);
    }

    for stage in &stages[1..] {
        let util = stage.command_word();
        if !TEXT_UTILITY_ALLOWLIST.contains(&util) {
            return Err(PolicyError::Parse(format!(
                "unrecognized pipeline utility: {util}"
            )));
        }
    }

    Ok(())
}
