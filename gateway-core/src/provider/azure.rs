//! Azure CLI (`az`) policy table and NL dictionary.

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
    matches!(group(tokens), Some("ad" | "role"))
        && matches!(extract_verb(tokens), Some("delete" | "create" | "create-for-rbac"))
}

fn subscription_matches(tokens: &[String]) -> bool {
    matches!(group(tokens), Some("account"))
        && matches!(extract_verb(tokens), Some("set" | "clear"))
}

fn secrets_matches(tokens: &[String]) -> bool {
    tokens.iter().any(|t| t == "secret")
        && matches!(extract_verb(tokens), Some("delete" | "set" | "purge"))
}

fn logging_matches(tokens: &[String]) -> bool {
    tokens.iter().any(|t| t == "diagnostic-settings" || t == "log-profiles")
        && matches!(extract_verb(tokens), Some("delete"))
}

fn network_matches(tokens: &[String]) -> bool {
    tokens.iter().any(|t| t == "nsg" || t == "vnet" || t == "route-table")
        && matches!(extract_verb(tokens), Some("delete" | "create"))
}

fn compute_matches(tokens: &[String]) -> bool {
    matches!(group(tokens), Some("vm"))
        && matches!(extract_verb(tokens), Some("delete" | "deallocate" | "stop" | "restart"))
}

fn storage_matches(tokens: &[String]) -> bool {
    matches!(group(tokens), Some("storage"))
        && matches!(extract_verb(tokens), Some("delete" | "update"))
        && tokens.iter().any(|t| t == "account" || t == "container")
}

fn database_matches(tokens: &[String]) -> bool {
    matches!(group(tokens), Some("sql" | "cosmosdb"))
        && matches!(extract_verb(tokens), Some("delete" | "update"))
        && tokens.iter().any(|t| t == "db" || t == "server")
}

static BLOCKLIST: &[BlocklistCategory] = &[
    BlocklistCategory { name: "identity", tier: RiskTier::Critical, matches: identity_matches },
    BlocklistCategory { name: "project", tier: RiskTier::Critical, matches: subscription_matches },
    BlocklistCategory { name: "logging", tier: RiskTier::High, matches: logging_matches },
    BlocklistCategory { name: "secrets", tier: RiskTier::High, matches: secrets_matches },
    BlocklistCategory { name: "network", tier: RiskTier::High, matches: network_matches },
    BlocklistCategory { name: "compute", tier: RiskTier::Medium, matches: compute_matches },
    BlocklistCategory { name: "storage", tier: RiskTier::Medium, matches: storage_matches },
    BlocklistCategory { name: "database", tier: RiskTier::Medium, matches: database_matches },
];

const PHRASES: &[(&str, &str)] = &[
    ("list my vms", "az vm list"),
    ("show vm details", "az vm show"),
    ("list my virtual machines", "az vm list"),
    ("list resource groups", "az group list"),
    ("show current subscription", "az account show"),
    ("list subscriptions", "az account list"),
    ("list storage accounts", "az storage account list"),
    ("list containers", "az storage container list"),
    ("list network security groups", "az network nsg list"),
    ("show nsg rules", "az network nsg rule list"),
    ("list virtual networks", "az network vnet list"),
    ("list ad users", "az ad user list"),
    ("list role assignments", "az role assignment list"),
    ("list sql servers", "az sql server list"),
    ("list sql databases", "az sql db list"),
    ("list cosmos accounts", "az cosmosdb list"),
    ("list aks clusters", "az aks list"),
    ("show aks cluster", "az aks show"),
    ("list kubernetes clusters", "az aks list"),
    ("list function apps", "az functionapp list"),
    ("show function app", "az functionapp show"),
    ("list key vaults", "az keyvault list"),
    ("list secrets", "az keyvault secret list"),
    ("show activity log", "az monitor activity-log list"),
    ("list diagnostic settings", "az monitor diagnostic-settings list"),
    ("list load balancers", "az network lb list"),
    ("list public ips", "az network public-ip list"),
    ("list disks", "az disk list"),
    ("list snapshots", "az snapshot list"),
    ("show tenant id", "az account show --query tenantId"),
    ("list app services", "az webapp list"),
    ("show web app", "az webapp show"),
];

const AUTH_ERROR_PATTERNS: &[&str] = &[
    "please run `az login`",
    "Please run 'az login'",
    "AADSTS",
    "No subscription found",
];

pub fn spec() -> &'static ProviderSpec {
    static SPEC: ProviderSpec = ProviderSpec {
        kind: ProviderKind::Azure,
        prefixes: &["az"],
        policy_table: PolicyTable {
            read_only_verbs: &["list", "show", "get"],
            blocklist: BLOCKLIST,
        },
        phrases: PHRASES,
        auth_error_patterns: AUTH_ERROR_PATTERNS,
    };
    &SPEC
}
