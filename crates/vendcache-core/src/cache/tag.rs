use serde::{Deserialize, Serialize};

/// Every remotely-fetched dataset the client caches, one tag per dataset.
///
/// Tags key the registry together with a request-parameter string, so one
/// tag can cover many parameterized entries (orders per entity, comments
/// per order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheTag {
    Order,
    VendorOrder,
    CanId,
    Profile,
    Marketplace,
    Notifications,
    Comments,
    Documents,
    Announcements,
    DigitalStamp,
    Voucher,
    CategoryFilter,
    CustomerAddress,
    VendorStoreReview,
}

impl CacheTag {
    /// Every tag, in a stable order. Used for whole-cache sweeps.
    pub const ALL: [CacheTag; 14] = [
        CacheTag::Order,
        CacheTag::VendorOrder,
        CacheTag::CanId,
        CacheTag::Profile,
        CacheTag::Marketplace,
        CacheTag::Notifications,
        CacheTag::Comments,
        CacheTag::Documents,
        CacheTag::Announcements,
        CacheTag::DigitalStamp,
        CacheTag::Voucher,
        CacheTag::CategoryFilter,
        CacheTag::CustomerAddress,
        CacheTag::VendorStoreReview,
    ];

    /// Stable name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            CacheTag::Order => "order",
            CacheTag::VendorOrder => "vendor_order",
            CacheTag::CanId => "can_id",
            CacheTag::Profile => "profile",
            CacheTag::Marketplace => "marketplace",
            CacheTag::Notifications => "notifications",
            CacheTag::Comments => "comments",
            CacheTag::Documents => "documents",
            CacheTag::Announcements => "announcements",
            CacheTag::DigitalStamp => "digital_stamp",
            CacheTag::Voucher => "voucher",
            CacheTag::CategoryFilter => "category_filter",
            CacheTag::CustomerAddress => "customer_address",
            CacheTag::VendorStoreReview => "vendor_store_review",
        }
    }
}

impl std::fmt::Display for CacheTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
