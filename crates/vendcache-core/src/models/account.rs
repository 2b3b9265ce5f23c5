use serde::{Deserialize, Serialize};

/// A carrier account number registered for shipping labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanId {
    #[serde(default)]
    pub id: i64,
    pub carrier: Option<String>,
    #[serde(rename = "accountNumber")]
    pub account_number: String,
    pub label: Option<String>,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
