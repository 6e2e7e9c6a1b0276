//! Request bodies and the ad-hoc account filter.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::channel::CooldownChannel;
use crate::error::PoolError;
use crate::ids::GameName;

/// Body of a query, query-no-update, or clear-channel request.
///
/// The account fields are flattened into the same object, so a request looks
/// like `{"game_name": "fifa", "b_zone": "eu", "talk_channel": 2, "cnt": 10}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    /// Only return accounts seen online within this many minutes. `0` disables.
    pub online_duration: u32,

    /// Cooldown channel to gate on. `0` disables.
    pub talk_channel: u32,

    /// Cooldown period in minutes. Falls back to `online_duration`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<u32>,

    /// Maximum number of rows to return. `0` means 1.
    pub cnt: u32,

    /// Consume the descending cursor instead of the ascending one.
    pub is_desc: bool,

    /// Equality filters and the target game.
    #[serde(flatten)]
    pub account: Account,
}

impl QueryRequest {
    /// Create a request for `game` returning up to `cnt` rows.
    #[must_use]
    pub fn new(game: impl Into<String>, cnt: u32) -> Self {
        Self {
            cnt,
            account: Account {
                game_name: game.into(),
                ..Account::default()
            },
            ..Self::default()
        }
    }

    /// Requested row count with the zero default applied.
    #[must_use]
    pub fn count(&self) -> usize {
        usize::try_from(self.cnt.max(1)).unwrap_or(usize::MAX)
    }

    /// Validate the request and turn it into a filter.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Validation`] for a malformed game name or an
    /// unknown talk channel.
    pub fn filter(&self) -> Result<(GameName, AccountFilter), PoolError> {
        let game = GameName::new(self.account.game_name.as_str())?;
        let channel = CooldownChannel::from_id(self.talk_channel)?;

        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        let online_within = (self.online_duration > 0)
            .then(|| Duration::minutes(i64::from(self.online_duration)));
        let cooldown_minutes = self.cooldown.unwrap_or(self.online_duration);

        let filter = AccountFilter {
            account: non_empty(&self.account.account),
            b_zone: non_empty(&self.account.b_zone),
            s_zone: non_empty(&self.account.s_zone),
            rating: (self.account.rating != 0).then_some(self.account.rating),
            online_within,
            cooldown: channel
                .map(|channel| (channel, Duration::minutes(i64::from(cooldown_minutes)))),
            limit: self.count(),
        };
        Ok((game, filter))
    }
}

/// Predicate used by the filter query.
///
/// `None` fields are not applied. Rows are always returned in id order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFilter {
    /// Exact account name.
    pub account: Option<String>,
    /// Exact big zone.
    pub b_zone: Option<String>,
    /// Exact small zone.
    pub s_zone: Option<String>,
    /// Exact rating.
    pub rating: Option<i32>,
    /// Online time must be newer than `now - online_within`.
    pub online_within: Option<Duration>,
    /// Channel timestamp must be unset or not newer than `now - period`.
    pub cooldown: Option<(CooldownChannel, Duration)>,
    /// Maximum number of rows.
    pub limit: usize,
}

impl AccountFilter {
    /// A filter that matches everything, capped at `limit` rows.
    #[must_use]
    pub fn all(limit: usize) -> Self {
        Self {
            account: None,
            b_zone: None,
            s_zone: None,
            rating: None,
            online_within: None,
            cooldown: None,
            limit,
        }
    }

    /// Lower bound on `online_time`, if the online filter is active.
    #[must_use]
    pub fn online_since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.online_within.map(|window| now - window)
    }

    /// Upper bound on the channel timestamp, if the cooldown filter is active.
    #[must_use]
    pub fn cooldown_cutoff(&self, now: DateTime<Utc>) -> Option<(CooldownChannel, DateTime<Utc>)> {
        self.cooldown.map(|(channel, period)| (channel, now - period))
    }

    /// Whether `account` passes every active predicate at `now`.
    #[must_use]
    pub fn matches(&self, account: &Account, now: DateTime<Utc>) -> bool {
        if self.account.as_deref().is_some_and(|a| a != account.account)
            || self.b_zone.as_deref().is_some_and(|z| z != account.b_zone)
            || self.s_zone.as_deref().is_some_and(|z| z != account.s_zone)
            || self.rating.is_some_and(|r| r != account.rating)
        {
            return false;
        }

        if let Some(since) = self.online_since(now) {
            match account.online_time {
                Some(online) if online > since => {}
                _ => return false,
            }
        }

        if let Some((channel, cutoff)) = self.cooldown_cutoff(now) {
            if channel.timestamp(account).is_some_and(|at| at > cutoff) {
                return false;
            }
        }

        true
    }
}

/// Body of a create-table request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRequest {
    /// Game to operate on.
    pub game_name: String,
}

impl GameRequest {
    /// Validate the game name.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Validation`] for a malformed game name.
    pub fn game(&self) -> Result<GameName, PoolError> {
        Ok(GameName::new(self.game_name.as_str())?)
    }
}

/// Body of a clear-channel request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearChannelRequest {
    /// Game to operate on.
    pub game_name: String,
    /// Channel whose timestamps are cleared.
    pub talk_channel: u32,
}

impl ClearChannelRequest {
    /// Validate the game name and channel.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Validation`] for a malformed game name or a
    /// missing or unknown channel.
    pub fn parse(&self) -> Result<(GameName, CooldownChannel), PoolError> {
        let game = GameName::new(self.game_name.as_str())?;
        let channel = CooldownChannel::require(self.talk_channel)?;
        Ok((game, channel))
    }
}

/// Body of a reset-counter request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetCounterRequest {
    /// Game whose cursors are reset.
    pub game_name: String,
    /// New descending position. Defaults to the table's row count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc_counter: Option<i64>,
}

impl ResetCounterRequest {
    /// Validate the game name and descending position.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Validation`] for a malformed game name or a
    /// negative descending position.
    pub fn parse(&self) -> Result<(GameName, Option<i64>), PoolError> {
        let game = GameName::new(self.game_name.as_str())?;
        if self.desc_counter.is_some_and(|d| d < 0) {
            return Err(PoolError::validation("desc_counter must not be negative"));
        }
        Ok((game, self.desc_counter))
    }
}
