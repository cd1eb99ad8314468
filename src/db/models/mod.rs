pub mod api_key;
pub mod whitelist;

pub use api_key::ApiKeyRecord;
pub use whitelist::{EntryState, UpsertOutcome, WhitelistEntry};
