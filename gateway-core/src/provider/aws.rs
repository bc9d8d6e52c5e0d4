//! AWS CLI policy table and NL dictionary.

use crate::policy::extract_verb;
use crate::policy::BlocklistCategory;
use crate::policy::PolicyTable;
use crate::policy::RiskTier;
use crate::types::ProviderKind;

use super::ProviderSpec;

fn service(tokens: &[String]) -> Option<&str> {
    tokens.get(1).map(String::as_str)
}

fn identity_matches(tokens: &[String]) -> bool {
    service(tokens) == Some("iam")
        && matches!(
            extract_verb(tokens),
            Some(
                "create-user"
                    | "delete-user"
                    | "attach-role-policy"
                    | "attach-user-policy"
                    | "put-user-policy"
                    | "create-access-key"
                    | "create-login-profile"
                    | "update-assume-role-policy"
            )
        )
}

fn secrets_matches(tokens: &[String]) -> bool {
    matches!(service(tokens), Some("secretsmanager"))
        && matches!(extract_verb(tokens), Some("delete-secret" | "put-secret-value" | "restore-secret"))
        || matches!(service(tokens), Some("ssm"))
            && matches!(extract_verb(tokens), Some("delete-parameter" | "put-parameter"))
}

fn logging_matches(tokens: &[String]) -> bool {
    (matches!(service(tokens), Some("cloudtrail"))
        && matches!(extract_verb(tokens), Some("stop-logging" | "delete-trail")))
        || (matches!(service(tokens), Some("logs"))
            && matches!(extract_verb(tokens), Some("delete-log-group" | "delete-log-stream")))
}

fn network_matches(tokens: &[String]) -> bool {
    matches!(service(tokens), Some("ec2"))
        && matches!(
            extract_verb(tokens),
            Some(
                "delete-security-group"
                    | "authorize-security-group-ingress"
                    | "revoke-security-group-ingress"
                    | "delete-vpc"
                    | "delete-subnet"
                    | "delete-route"
            )
        )
}

fn compute_matches(tokens: &[String]) -> bool {
    matches!(service(tokens), Some("ec2"))
        && matches!(
            extract_verb(tokens),
            Some("terminate-instances" | "stop-instances" | "reboot-instances")
        )
}

fn storage_matches(tokens: &[String]) -> bool {
    matches!(service(tokens), Some("s3api"))
        && matches!(
            extract_verb(tokens),
            Some("delete-bucket" | "put-bucket-acl" | "put-bucket-policy" | "delete-bucket-policy")
        )
}

fn database_matches(tokens: &[String]) -> bool {
    matches!(service(tokens), Some("rds"))
        && matches!(extract_verb(tokens), Some("delete-db-instance" | "modify-db-instance" | "reboot-db-instance"))
}

static BLOCKLIST: &[BlocklistCategory] = &[
    BlocklistCategory { name: "identity", tier: RiskTier::Critical, matches: identity_matches },
    BlocklistCategory { name: "logging", tier: RiskTier::High, matches: logging_matches },
    BlocklistCategory { name: "secrets", tier: RiskTier::High, matches: secrets_matches },
    BlocklistCategory { name: "network", tier: RiskTier::High, matches: network_matches },
    BlocklistCategory { name: "compute", tier: RiskTier::Medium, matches: compute_matches },
    BlocklistCategory { name: "storage", tier: RiskTier::Medium, matches: storage_matches },
    BlocklistCategory { name: "database", tier: RiskTier::Medium, matches: database_matches },
];

const PHRASES: &[(&str, &str)] = &[
    ("list my ec2 instances", "aws ec2 describe-instances"),
    ("describe my ec2 instances", "aws ec2 describe-instances"),
    ("show running instances", "aws ec2 describe-instances --filters Name=instance-state-name,Values=running"),
    ("list my s3 buckets", "aws s3api list-buckets"),
    ("show bucket policy", "aws s3api get-bucket-policy"),
    ("list iam users", "aws iam list-users"),
    ("list iam roles", "aws iam list-roles"),
    ("show my account identity", "aws sts get-caller-identity"),
    ("list security groups", "aws ec2 describe-security-groups"),
    ("list vpcs", "aws ec2 describe-vpcs"),
    ("list subnets", "aws ec2 describe-subnets"),
    ("list rds instances", "aws rds describe-db-instances"),
    ("describe my databases", "aws rds describe-db-instances"),
    ("list lambda functions", "aws lambda list-functions"),
    ("show function configuration", "aws lambda get-function-configuration"),
    ("list secrets", "aws secretsmanager list-secrets"),
    ("list parameters", "aws ssm describe-parameters"),
    ("list cloudtrail trails", "aws cloudtrail describe-trails"),
    ("show logging status", "aws cloudtrail get-trail-status"),
    ("list log groups", "aws logs describe-log-groups"),
    ("list ecs clusters", "aws ecs list-clusters"),
    ("list ecs services", "aws ecs list-services"),
    ("list eks clusters", "aws eks list-clusters"),
    ("describe eks cluster", "aws eks describe-cluster"),
    ("list kubernetes clusters", "aws eks list-clusters"),
    ("list load balancers", "aws elbv2 describe-load-balancers"),
    ("list auto scaling groups", "aws autoscaling describe-auto-scaling-groups"),
    ("show account alias", "aws iam list-account-aliases"),
    ("list access keys", "aws iam list-access-keys"),
    ("list elastic ips", "aws ec2 describe-addresses"),
    ("list snapshots", "aws ec2 describe-snapshots"),
    ("list volumes", "aws ec2 describe-volumes"),
    ("show billing alarms", "aws cloudwatch describe-alarms"),
];

const AUTH_ERROR_PATTERNS: &[&str] = &[
    "Unable to locate credentials",
    "ExpiredToken",
    "UnrecognizedClientException",
    "The security token included in the request is invalid",
];

pub fn spec() -> &'static ProviderSpec {
    static SPEC: ProviderSpec = ProviderSpec {
        kind: ProviderKind::Aws,
        prefixes: &["aws"],
        policy_table: PolicyTable {
            read_only_verbs: &["describe-*", "list-*", "get-*", "head-*"],
            blocklist: BLOCKLIST,
        },
        phrases: PHRASES,
        auth_error_patterns: AUTH_ERROR_PATTERNS,
    };
    &SPEC
}
