pub mod cli;
pub mod playbook_file;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use cli::Cli;
use cli::Command;
use cli::PlaybookCommand;
use cli::ProviderArg;
use gateway_core::ConfigOverrides;
use gateway_core::GatewayConfig;
use gateway_core::ProviderContext;
use gateway_core::ProviderGateway;
use gateway_core::ProviderKind;
use gateway_core::playbook::ActionHandlerRegistry;
use gateway_core::playbook::HistoryFilter;
use gateway_core::playbook::PlaybookExecutor;

fn provider_kind(arg: ProviderArg) -> ProviderKind {
    match arg {
        ProviderArg::Aws => ProviderKind::Aws,
        ProviderArg::Gcp => ProviderKind::Gcp,
        ProviderArg::Azure => ProviderKind::Azure,
    }
}

fn context_for(kind: ProviderKind, raw: Option<&str>) -> ProviderContext {
    let mut ctx = ProviderContext::default();
    let Some(value) = raw else { return ctx };
    match kind {
        ProviderKind::Aws => ctx.aws_profile = Some(value.to_string()),
        ProviderKind::Azure => ctx.azure_subscription_id = Some(value.to_string()),
        ProviderKind::Gcp => ctx.gcp_project_id = Some(value.to_string()),
    }
    ctx
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Exec {
            provider,
            text,
            context,
            json,
        } => run_exec(cli.security_mode, provider, text, context, json).await,
        Command::Playbook(cmd) => run_playbook(cli.security_mode, cmd).await,
    }
}

async fn run_exec(
    security_mode: Option<cli::SecurityModeArg>,
    provider: ProviderArg,
    text: Vec<String>,
    context: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let kind = provider_kind(provider);
    let config = config_with_override(security_mode);
    let gateway = ProviderGateway::new(kind, config);
    gateway.start(context_for(kind, context.as_deref()));

    let joined = text.join(" ");
    let result = gateway.execute_command(&joined).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("status: {:?}", result.status);
        println!("output:\n{}", result.output);
        if let Some(structured) = &result.structured {
            println!("structured: {structured}");
        }
        for warning in &result.warnings {
            println!("warning: {warning}");
        }
    }

    Ok(())
}

async fn run_playbook(security_mode: Option<cli::SecurityModeArg>, cmd: PlaybookCommand) -> anyhow::Result<()> {
    let config = config_with_override(security_mode);

    match cmd {
        PlaybookCommand::Run {
            playbook,
            finding,
            initiator,
            dry_run,
            approve,
            json,
        } => {
            let playbook = playbook_file::PlaybookFile::load(&playbook)?.into_playbook()?;
            let finding = playbook_file::load_finding(&finding)?;

            let executor = PlaybookExecutor::new(ActionHandlerRegistry::bootstrap(), config.max_concurrent_playbooks);
            let providers = all_provider_gateways(config.clone());

            let mut execution = executor
                .execute(&playbook, finding.clone(), &initiator, dry_run, providers.clone())
                .await
                .context("executing playbook")?;

            if approve && execution.status == gateway_core::playbook::ExecutionState::AwaitingApproval {
                execution = executor
                    .approve(&execution.id, &initiator, dry_run, &playbook, finding, providers)
                    .await
                    .context("approving playbook execution")?;
            }

            print_execution(&execution, json)
        }
        PlaybookCommand::Approve { execution_id, .. } => {
            anyhow::bail!(
                "execution {execution_id} is not known to this process: approve only works within the same `playbook run --approve` invocation, since the engine keeps no state across process runs"
            )
        }
        PlaybookCommand::Reject { execution_id, .. } => {
            anyhow::bail!("execution {execution_id} is not known to this process")
        }
        PlaybookCommand::Rollback { execution_id } => {
            anyhow::bail!("execution {execution_id} is not known to this process")
        }
        PlaybookCommand::History {
            playbook,
            finding,
            limit,
        } => {
            let executor = PlaybookExecutor::new(ActionHandlerRegistry::bootstrap(), config.max_concurrent_playbooks);
            let history = executor.history(
                HistoryFilter {
                    playbook_id: playbook,
                    finding_id: finding,
                },
                limit,
            );
            println!("{}", serde_json::to_string_pretty(&history)?);
            Ok(())
        }
    }
}

fn config_with_override(security_mode: Option<cli::SecurityModeArg>) -> GatewayConfig {
    let overrides = ConfigOverrides {
        security_mode: security_mode.map(|mode| match mode {
            cli::SecurityModeArg::Strict => gateway_core::policy::SecurityMode::Strict,
            cli::SecurityModeArg::Permissive => gateway_core::policy::SecurityMode::Permissive,
        }),
        ..Default::default()
    };
    GatewayConfig::load_with_overrides(overrides)
}

fn all_provider_gateways(config: GatewayConfig) -> HashMap<ProviderKind, Arc<ProviderGateway>> {
    let mut providers = HashMap::new();
    for kind in [ProviderKind::Aws, ProviderKind::Gcp, ProviderKind::Azure] {
        let gateway = Arc::new(ProviderGateway::new(kind, config.clone()));
        gateway.start(ProviderContext::default());
        providers.insert(kind, gateway);
    }
    providers
}

fn print_execution(execution: &gateway_core::playbook::PlaybookExecution, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(execution)?);
    } else {
        println!("execution: {}", execution.id);
        println!("status: {}", execution.status);
        for outcome in &execution.action_results {
            println!("  [{:?}] {}: {}", outcome.status, outcome.action_name, outcome.message);
        }
    }
    Ok(())
}
