use serde::{Deserialize, Serialize};

/// The signed-in user's account profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "userId", default)]
    pub user_id: i64,
    pub email: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: Option<String>,
    #[serde(rename = "emailVerified", default)]
    pub email_verified: bool,
    #[serde(rename = "vendorStore")]
    pub vendor_store: Option<VendorStoreSummary>,
}

/// Present when the account also operates a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorStoreSummary {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub slug: Option<String>,
}

/// A saved delivery address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerAddress {
    #[serde(default)]
    pub id: i64,
    pub label: Option<String>,
    pub recipient: Option<String>,
    #[serde(rename = "addressLine1")]
    pub address_line1: Option<String>,
    #[serde(rename = "addressLine2")]
    pub address_line2: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    #[serde(rename = "postalCode")]
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
}

impl CustomerAddress {
    /// Format the address as a single line.
    pub fn formatted(&self) -> Option<String> {
        let mut parts = Vec::new();
        for field in [
            &self.address_line1,
            &self.address_line2,
            &self.district,
            &self.city,
            &self.postal_code,
        ] {
            if let Some(value) = field {
                if !value.is_empty() {
                    parts.push(value.clone());
                }
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}
