//! Account records.
//!
//! An [`Account`] is one row of a game table. The same struct is used on the
//! wire, in the insert buffer and in the store, so every field except the
//! identity pair is optional or defaulted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PoolError;
use crate::ids::{validate_account, GameName};

/// A game account, identified by `(game_name, account)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    /// Auto-increment row id. `0` until the row has been persisted.
    #[serde(rename = "ID")]
    pub id: i64,

    /// Game (and table) the account belongs to.
    pub game_name: String,

    /// Account name, unique within the game.
    pub account: String,

    /// Account password, if the operator stores one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Big zone (region).
    pub b_zone: String,

    /// Small zone (server).
    pub s_zone: String,

    /// Rating or level score.
    pub rating: i32,

    /// Operational status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,

    /// Whether an operator currently has the account checked out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_use: Option<bool>,

    /// Free-form level label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Machine the account is bound to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computer_number: Option<String>,

    /// When the row was first created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// When the account was last seen online.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online_time: Option<DateTime<Utc>>,

    /// Cooldown channel 1 timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_talk_time1: Option<DateTime<Utc>>,
    /// Cooldown channel 2 timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_talk_time2: Option<DateTime<Utc>>,
    /// Cooldown channel 3 timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_talk_time3: Option<DateTime<Utc>>,
    /// Cooldown channel 4 timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_talk_time4: Option<DateTime<Utc>>,
    /// Cooldown channel 5 timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_talk_time5: Option<DateTime<Utc>>,
    /// Cooldown channel 6 timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_talk_time6: Option<DateTime<Utc>>,
}

impl Account {
    /// Create an empty account with just its identity set.
    #[must_use]
    pub fn new(game_name: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            game_name: game_name.into(),
            account: account.into(),
            ..Self::default()
        }
    }

    /// Validate the identity pair and return the parsed game name.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Validation`] when the game name is malformed or
    /// the account is empty.
    pub fn validate(&self) -> Result<GameName, PoolError> {
        let game = GameName::new(self.game_name.as_str())?;
        validate_account(&self.account)?;
        Ok(game)
    }

    /// Mark the account as seen at `now`, filling `created_at` on first sight.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.online_time = Some(now);
        self.created_at.get_or_insert(now);
    }

    /// Copy the refreshable fields (zones, rating, online time) from `other`.
    pub fn refresh_from(&mut self, other: &Self) {
        self.b_zone.clone_from(&other.b_zone);
        self.s_zone.clone_from(&other.s_zone);
        self.rating = other.rating;
        self.online_time = other.online_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdError;

    #[test]
    fn decodes_sparse_wire_payload() {
        let account: Account =
            serde_json::from_str(r#"{"game_name":"fifa","account":"fifa1","rating":7}"#).unwrap();
        assert_eq!(account.id, 0);
        assert_eq!(account.game_name, "fifa");
        assert_eq!(account.rating, 7);
        assert!(account.online_time.is_none());
    }

    #[test]
    fn row_id_uses_upper_case_key() {
        let mut account = Account::new("fifa", "fifa1");
        account.id = 42;
        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(value["ID"], 42);
        assert!(value.get("password").is_none());
    }

    #[test]
    fn validate_requires_identity() {
        assert_eq!(
            Account::new("fifa", "fifa1").validate().unwrap().as_str(),
            "fifa"
        );
        assert_eq!(
            Account::new("fifa", "").validate(),
            Err(PoolError::from(IdError::EmptyAccount))
        );
        assert!(Account::new("", "x").validate().is_err());
    }

    #[test]
    fn touch_keeps_first_creation_time() {
        let mut account = Account::new("fifa", "fifa1");
        let first = Utc::now();
        account.touch(first);
        let later = first + chrono::Duration::minutes(5);
        account.touch(later);
        assert_eq!(account.created_at, Some(first));
        assert_eq!(account.online_time, Some(later));
    }
}
