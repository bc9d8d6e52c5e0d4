use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser, Debug)]
#[command(name = "gateway", version, about = "Multi-cloud command gateway and remediation engine")]
pub struct Cli {
    /// Security mode override (defaults to SECURITY_MODE env or strict).
    #[arg(long, global = true, value_enum)]
    pub security_mode: Option<SecurityModeArg>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum SecurityModeArg {
    Strict,
    Permissive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum ProviderArg {
    Aws,
    Gcp,
    Azure,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one command or natural-language phrase through a provider gateway.
    Exec {
        provider: ProviderArg,
        /// Command text or natural-language phrase (joined with spaces).
        #[arg(trailing_var_arg = true, required = true)]
        text: Vec<String>,
        /// AWS profile / Azure subscription id / GCP project id.
        #[arg(long)]
        context: Option<String>,
        /// Print the full `ExecutionResult` as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Playbook lifecycle operations.
    #[command(subcommand)]
    Playbook(PlaybookCommand),
}

#[derive(Subcommand, Debug)]
pub enum PlaybookCommand {
    /// Load a playbook and finding from disk and execute it.
    Run {
        playbook: PathBuf,
        #[arg(long)]
        finding: PathBuf,
        #[arg(long)]
        initiator: String,
        #[arg(long)]
        dry_run: bool,
        /// Immediately approve the run if it enters AwaitingApproval,
        /// continuing to completion within this one invocation. The
        /// engine keeps no state between process invocations, so this
        /// is the only way this CLI can demonstrate the approval flow
        /// end to end.
        #[arg(long)]
        approve: bool,
        #[arg(long)]
        json: bool,
    },
    /// Approve a pending execution (only meaningful within one `run
    /// --approve`-less invocation that also performs the approval; kept
    /// for API symmetry with the embeddable engine).
    Approve {
        execution_id: String,
        #[arg(long)]
        approver: String,
    },
    Reject {
        execution_id: String,
        #[arg(long)]
        rejector: String,
        #[arg(long)]
        reason: String,
    },
    Rollback { execution_id: String },
    History {
        #[arg(long)]
        playbook: Option<String>,
        #[arg(long)]
        finding: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}
