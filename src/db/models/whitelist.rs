use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted whitelist row. Rows are never physically deleted;
/// removal flips `is_active` off and keeps the row for history.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WhitelistEntry {
    pub id: i64,
    pub address_spec: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Active,
    Inactive,
}

impl From<bool> for EntryState {
    fn from(is_active: bool) -> Self {
        if is_active { EntryState::Active } else { EntryState::Inactive }
    }
}

impl WhitelistEntry {
    pub fn state(&self) -> EntryState {
        EntryState::from(self.is_active)
    }
}

/// What `upsert_active` did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Reactivated,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(is_active: bool) -> WhitelistEntry {
        let now = Utc::now();
        WhitelistEntry {
            id: 1,
            address_spec: "10.0.0.0/24".to_string(),
            description: None,
            is_active,
            created_at: now,
            updated_at: now,
            created_by: Some("cli".to_string()),
        }
    }

    #[test]
    fn test_state_follows_active_flag() {
        assert_eq!(entry(true).state(), EntryState::Active);
        assert_eq!(entry(false).state(), EntryState::Inactive);
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&EntryState::Inactive).unwrap();
        assert_eq!(json, "\"inactive\"");
    }
}
