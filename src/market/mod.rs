//! 集市领域：类型、领域引擎与单写者 actor

pub mod actor;
pub mod engine;
pub mod types;

pub use actor::MarketHandle;
pub use engine::MarketEngine;
pub use types::{
    category_name, BuyOutcome, CategorySummary, Listing, ListingView, PurchaseRecord, SellOutcome,
    SoldListing, User, DEFAULT_COST_NAME, RESTRICTED_CATEGORY,
};
