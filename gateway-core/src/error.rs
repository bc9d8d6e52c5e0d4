use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors raised while classifying or validating a command against the
/// security policy (C1), or while interpreting natural language (C2) or
/// parsing a pipeline (C3).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("{category}-mutating command blocked in strict mode (category={category})")]
    Denied { category: String, reason: String },

    #[error("cannot interpret natural language phrase")]
    UnknownPhrase,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("command does not begin with a recognized provider prefix")]
    UnrecognizedPrefix,
}

/// Errors raised while spawning or supervising a child process (C4).
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("command timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("authentication error: {0}")]
    AuthError(String),

    #[error("command exited with status {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("failed to spawn child process: stdout/stderr pipe unavailable")]
    Spawn,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// Errors raised while running a playbook through its state machine (C7/C8).
#[derive(Error, Debug)]
pub enum PlaybookError {
    #[error("no handler registered for action kind {0:?}")]
    HandlerMissing(String),

    #[error("handler for action {action} failed: {reason}")]
    HandlerError { action: String, reason: String },

    #[error("illegal state transition: expected {expected}, found {found}")]
    StateError { expected: String, found: String },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("playbook timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("invalid playbook definition: {0}")]
    Validation(String),

    #[error("execution {0} not found")]
    NotFound(String),
}

/// Crate-wide error, aggregating the per-component taxonomies the way
/// `CodexErr` aggregates `SandboxErr`.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Playbook(#[from] PlaybookError),
}
