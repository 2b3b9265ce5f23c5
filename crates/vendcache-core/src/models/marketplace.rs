use serde::{Deserialize, Serialize};

/// A listing in the marketplace browse feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceItem {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    #[serde(rename = "sellerName")]
    pub seller_name: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    #[serde(default)]
    pub stock: Option<i64>,
}

/// A node in the category filter tree shown beside search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryFilter {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(rename = "parentId")]
    pub parent_id: Option<i64>,
    #[serde(rename = "itemCount", default)]
    pub item_count: i64,
}

/// A buyer review left on a vendor store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorStoreReview {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "reviewerName")]
    pub reviewer_name: Option<String>,
    #[serde(default)]
    pub rating: f64,
    pub comment: Option<String>,
    #[serde(rename = "orderNumber")]
    pub order_number: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

/// A discount voucher attached to the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    #[serde(default)]
    pub id: i64,
    pub code: String,
    pub description: Option<String>,
    #[serde(rename = "discountPercent")]
    pub discount_percent: Option<f64>,
    #[serde(rename = "discountAmount")]
    pub discount_amount: Option<f64>,
    pub currency: Option<String>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub used: bool,
}

impl Voucher {
    /// Human-readable discount: percentage wins when both are present.
    pub fn discount_display(&self) -> String {
        if let Some(percent) = self.discount_percent {
            return format!("{}% off", percent);
        }
        if let Some(amount) = self.discount_amount {
            return match self.currency.as_deref() {
                Some(currency) => format!("{amount} {currency} off"),
                None => format!("{amount} off"),
            };
        }
        "no discount".to_string()
    }
}

/// A prepaid shipping stamp usable on vendor shipments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalStamp {
    #[serde(default)]
    pub id: i64,
    pub code: String,
    pub carrier: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "orderId")]
    pub order_id: Option<i64>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<String>,
}
