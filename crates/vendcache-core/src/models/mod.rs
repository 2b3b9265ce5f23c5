//! Data models for marketplace entities.
//!
//! This module contains the wire-format structures the API returns,
//! including:
//!
//! - `Order`, `VendorOrder`, `OrderItem`: purchases on both sides of the
//!   account
//! - `Profile`, `CustomerAddress`: account identity and saved addresses
//! - `MarketplaceItem`, `CategoryFilter`, `VendorStoreReview`, `Voucher`,
//!   `DigitalStamp`: storefront data
//! - `Notification`, `Announcement`, `Comment`, `Document`: feeds and files
//! - `CanId`: carrier account numbers for shipping

pub mod account;
pub mod feed;
pub mod marketplace;
pub mod order;
pub mod profile;

pub use account::CanId;
pub use feed::{Announcement, Comment, Document, Notification};
pub use marketplace::{CategoryFilter, DigitalStamp, MarketplaceItem, VendorStoreReview, Voucher};
pub use order::{Order, OrderItem, OrderStatus, VendorOrder};
pub use profile::{CustomerAddress, Profile, VendorStoreSummary};
