//! End-to-end coverage of the Provider Gateway round trip (C2 -> C3 -> C1 ->
//! C4) that the per-module unit tests don't exercise together: NL
//! resolution feeding into policy, and strict-vs-permissive divergence on
//! the same mutating command.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use gateway_core::ExecutionStatus;
use gateway_core::GatewayConfig;
use gateway_core::ProviderContext;
use gateway_core::ProviderGateway;
use gateway_core::ProviderKind;
use gateway_core::policy::SecurityMode;

fn config(mode: SecurityMode) -> GatewayConfig {
    GatewayConfig {
        security_mode: mode,
        ..GatewayConfig::default()
    }
}

#[tokio::test]
async fn natural_language_phrase_resolves_through_policy_before_any_spawn() {
    let gateway = ProviderGateway::new(ProviderKind::Aws, config(SecurityMode::Strict));
    gateway.start(ProviderContext::default());

    // "list my ec2 instances" resolves to a read-only `describe-instances`
    // call, which always classifies `Safe` regardless of security mode.
    // The `aws` binary is not assumed to be on PATH, so this only proves
    // the phrase resolved and cleared policy; the spawn itself may still
    // fail with an `ExecutionError` if the binary is missing, which is not
    // the scenario under test here.
    let result = gateway.execute_command("list my ec2 instances").await;
    assert_ne!(
        result.error_kind,
        gateway_core::types::ErrorKind::ValidationError,
        "a recognized phrase must not be reported as unparseable: {result:?}"
    );
}

#[tokio::test]
async fn strict_mode_denies_critical_command_before_spawning_a_child() {
    let gateway = ProviderGateway::new(ProviderKind::Aws, config(SecurityMode::Strict));
    let result = gateway
        .execute_command("aws iam create-user --user-name evil")
        .await;

    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.error_kind, gateway_core::types::ErrorKind::ValidationError);
    assert!(result.output.contains("identity"));
    // Denial happens before C4 runs, so there is never an exit code.
    assert!(result.exit_code.is_none());
}

#[tokio::test]
async fn permissive_mode_allows_the_same_command_with_a_warning() {
    let gateway = ProviderGateway::new(ProviderKind::Aws, config(SecurityMode::Permissive));
    let result = gateway
        .execute_command("aws iam create-user --user-name evil")
        .await;

    // Permissive mode never denies at the policy layer; any failure beyond
    // this point would come from the `aws` binary itself, not validation.
    assert_ne!(result.error_kind, gateway_core::types::ErrorKind::ValidationError);
}

#[tokio::test]
async fn unrecognized_natural_language_never_reaches_policy_or_exec() {
    let gateway = ProviderGateway::new(ProviderKind::Aws, config(SecurityMode::Strict));
    let result = gateway.execute_command("order me a pizza").await;

    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.error_kind, gateway_core::types::ErrorKind::ValidationError);
    assert!(result.exit_code.is_none());
}

#[tokio::test]
async fn wrong_provider_prefix_is_rejected_at_the_pipeline_layer() {
    let gateway = ProviderGateway::new(ProviderKind::Aws, config(SecurityMode::Strict));
    let result = gateway.execute_command("az vm list").await;

    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.error_kind, gateway_core::types::ErrorKind::ValidationError);
}

#[tokio::test]
async fn context_lifecycle_is_independent_per_gateway_instance() {
    let aws = ProviderGateway::new(ProviderKind::Aws, GatewayConfig::default());
    let gcp = ProviderGateway::new(ProviderKind::Gcp, GatewayConfig::default());

    aws.start(ProviderContext {
        aws_profile: Some("prod".to_string()),
        ..Default::default()
    });
    assert!(aws.is_running());
    assert!(!gcp.is_running());

    aws.stop();
    assert!(!aws.is_running());
}
