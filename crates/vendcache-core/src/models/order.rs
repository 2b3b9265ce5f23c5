use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
    Unknown,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Paid => write!(f, "Paid"),
            OrderStatus::Shipped => write!(f, "Shipped"),
            OrderStatus::Delivered => write!(f, "Delivered"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
            OrderStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

fn classify_status(raw: Option<&str>) -> OrderStatus {
    let Some(raw) = raw else {
        return OrderStatus::Unknown;
    };
    match raw.to_ascii_lowercase().as_str() {
        "pending" | "awaiting_payment" => OrderStatus::Pending,
        "paid" | "confirmed" => OrderStatus::Paid,
        "shipped" | "in_transit" => OrderStatus::Shipped,
        "delivered" | "completed" => OrderStatus::Delivered,
        "cancelled" | "canceled" | "refunded" => OrderStatus::Cancelled,
        _ => OrderStatus::Unknown,
    }
}

/// An order placed by the signed-in customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "orderNumber")]
    pub order_number: String,
    pub status: Option<String>,
    #[serde(rename = "totalAmount")]
    pub total_amount: Option<f64>,
    pub currency: Option<String>,
    #[serde(rename = "vendorName")]
    pub vendor_name: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn status(&self) -> OrderStatus {
        classify_status(self.status.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(rename = "unitPrice")]
    pub unit_price: Option<f64>,
}

/// An incoming order on the vendor side of the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorOrder {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "orderNumber")]
    pub order_number: String,
    #[serde(rename = "buyerName")]
    pub buyer_name: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "totalAmount")]
    pub total_amount: Option<f64>,
    pub currency: Option<String>,
    #[serde(rename = "shippingDeadline")]
    pub shipping_deadline: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl VendorOrder {
    pub fn status(&self) -> OrderStatus {
        classify_status(self.status.as_deref())
    }
}
