use serde::{Deserialize, Serialize};

/// An in-app notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub body: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "isRead", default)]
    pub is_read: bool,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

/// A platform-wide announcement shown to every account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub body: Option<String>,
    pub audience: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

/// A message on an order's conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "orderId", default)]
    pub order_id: i64,
    #[serde(rename = "authorName")]
    pub author_name: Option<String>,
    pub body: String,
    #[serde(rename = "fromVendor", default)]
    pub from_vendor: bool,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

/// An invoice, waybill or other file attached to the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(rename = "documentType")]
    pub document_type: Option<String>,
    #[serde(rename = "downloadUrl")]
    pub download_url: Option<String>,
    #[serde(rename = "sizeBytes")]
    pub size_bytes: Option<i64>,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: Option<String>,
}
