pub mod cache;
pub mod matcher;
pub mod service;
pub mod store;

pub use cache::{CacheInfo, WhitelistCache};
pub use service::WhitelistService;
pub use store::WhitelistStore;
