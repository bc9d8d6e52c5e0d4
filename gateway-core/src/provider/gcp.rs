//! GCP CLI (`gcloud`/`gsutil`) policy table and NL dictionary.

use crate::policy::extract_verb;
use crate::policy::BlocklistCategory;
use crate::policy::PolicyTable;
use crate::policy::RiskTier;
use crate::types::ProviderKind;

use super::ProviderSpec;

fn group(tokens: &[String]) -> Option<&str> {
    tokens.get(1).map(String::as_str)
}

fn identity_matches(tokens: &[String]) -> bool {
    (matches!(group(tokens), Some("iam"))
        && tokens.iter().any(|t| t == "service-accounts")
        && matches!(extract_verb(tokens), Some("create" | "delete" | "disable")))
        || tokens.iter().any(|t| t == "add-iam-policy-binding" || t == "remove-iam-policy-binding")
}

fn project_matches(tokens: &[String]) -> bool {
    matches!(group(tokens), Some("projects"))
        && matches!(extract_verb(tokens), Some("delete" | "undelete"))
}

fn secrets_matches(tokens: &[String]) -> bool {
    matches!(group(tokens), Some("secrets"))
        && matches!(extract_verb(tokens), Some("delete" | "versions"))
}

fn logging_matches(tokens: &[String]) -> bool {
    matches!(group(tokens), Some("logging"))
        && tokens.iter().any(|t| t == "sinks")
        && matches!(extract_verb(tokens), Some("delete"))
}

fn network_matches(tokens: &[String]) -> bool {
    matches!(group(tokens), Some("compute"))
        && tokens.iter().any(|t| t == "firewall-rules" || t == "networks")
        && matches!(extract_verb(tokens), Some("create" | "delete"))
}

fn compute_matches(tokens: &[String]) -> bool {
    matches!(group(tokens), Some("compute"))
        && tokens.iter().any(|t| t == "instances")
        && matches!(extract_verb(tokens), Some("delete" | "stop" | "reset"))
}

fn storage_matches(tokens: &[String]) -> bool {
    matches!(tokens.first().map(String::as_str), Some("gsutil"))
        && matches!(tokens.get(1).map(String::as_str), Some("rm"))
        || tokens.iter().any(|t| t == "acl")
            && tokens.iter().any(|t| t.contains("AllUsers"))
}

fn database_matches(tokens: &[String]) -> bool {
    matches!(group(tokens), Some("sql"))
        && tokens.iter().any(|t| t == "instances")
        && matches!(extract_verb(tokens), Some("delete"))
}

static BLOCKLIST: &[BlocklistCategory] = &[
    BlocklistCategory { name: "identity", tier: RiskTier::Critical, matches: identity_matches },
    BlocklistCategory { name: "project", tier: RiskTier::Critical, matches: project_matches },
    BlocklistCategory { name: "logging", tier: RiskTier::High, matches: logging_matches },
    BlocklistCategory { name: "secrets", tier: RiskTier::High, matches: secrets_matches },
    BlocklistCategory { name: "network", tier: RiskTier::High, matches: network_matches },
    BlocklistCategory { name: "compute", tier: RiskTier::Medium, matches: compute_matches },
    BlocklistCategory { name: "storage", tier: RiskTier::Medium, matches: storage_matches },
    BlocklistCategory { name: "database", tier: RiskTier::Medium, matches: database_matches },
];

const PHRASES: &[(&str, &str)] = &[
    ("list my compute instances", "gcloud compute instances list"),
    ("list vms", "gcloud compute instances list"),
    ("describe instance", "gcloud compute instances describe"),
    ("list my projects", "gcloud projects list"),
    ("show current project", "gcloud config get-value project"),
    ("list storage buckets", "gcloud storage buckets list"),
    ("list buckets", "gsutil ls"),
    ("list service accounts", "gcloud iam service-accounts list"),
    ("list iam policy bindings", "gcloud projects get-iam-policy"),
    ("show iam policy", "gcloud projects get-iam-policy"),
    ("list firewall rules", "gcloud compute firewall-rules list"),
    ("list networks", "gcloud compute networks list"),
    ("list subnets", "gcloud compute networks subnets list"),
    ("list secrets", "gcloud secrets list"),
    ("list logging sinks", "gcloud logging sinks list"),
    ("export logs", "gcloud logging read"),
    ("list sql instances", "gcloud sql instances list"),
    ("describe sql instance", "gcloud sql instances describe"),
    ("list gke clusters", "gcloud container clusters list"),
    ("describe gke cluster", "gcloud container clusters describe"),
    ("list kubernetes clusters", "gcloud container clusters list"),
    ("list cloud functions", "gcloud functions list"),
    ("describe cloud function", "gcloud functions describe"),
    ("list cloud run services", "gcloud run services list"),
    ("describe cloud run service", "gcloud run services describe"),
    ("list disks", "gcloud compute disks list"),
    ("list snapshots", "gcloud compute snapshots list"),
    ("list images", "gcloud compute images list"),
    ("list load balancers", "gcloud compute forwarding-rules list"),
    ("show billing account", "gcloud billing accounts list"),
    ("list bigquery datasets", "gcloud alpha bq datasets list"),
    ("list pubsub topics", "gcloud pubsub topics list"),
];

const AUTH_ERROR_PATTERNS: &[&str] = &[
    "DefaultCredentialsError",
    "Reauthentication failed",
    "You do not currently have an active account selected",
    "Unable to authenticate",
];

pub fn spec() -> &'static ProviderSpec {
    static SPEC: ProviderSpec = ProviderSpec {
        kind: ProviderKind::Gcp,
        prefixes: &["gcloud", "gsutil"],
        policy_table: PolicyTable {
            read_only_verbs: &["list", "describe", "get", "export"],
            blocklist: BLOCKLIST,
        },
        phrases: PHRASES,
        auth_error_patterns: AUTH_ERROR_PATTERNS,
    };
    &SPEC
}
