//! Cooldown channels.
//!
//! Every account carries six independent "last talked" timestamps. A query
//! that gates on a channel only returns accounts whose timestamp for that
//! channel is older than the cooldown, then stamps the returned rows.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::account::Account;
use crate::error::PoolError;

/// One of the six cooldown channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownChannel {
    /// Channel 1 (`last_talk_time1`).
    Channel1,
    /// Channel 2 (`last_talk_time2`).
    Channel2,
    /// Channel 3 (`last_talk_time3`).
    Channel3,
    /// Channel 4 (`last_talk_time4`).
    Channel4,
    /// Channel 5 (`last_talk_time5`).
    Channel5,
    /// Channel 6 (`last_talk_time6`).
    Channel6,
}

impl CooldownChannel {
    /// All channels in id order.
    pub const ALL: [Self; 6] = [
        Self::Channel1,
        Self::Channel2,
        Self::Channel3,
        Self::Channel4,
        Self::Channel5,
        Self::Channel6,
    ];

    /// Resolve a wire channel id. `0` means "no channel".
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Validation`] for ids above 6.
    pub fn from_id(id: u32) -> Result<Option<Self>, PoolError> {
        match id {
            0 => Ok(None),
            1 => Ok(Some(Self::Channel1)),
            2 => Ok(Some(Self::Channel2)),
            3 => Ok(Some(Self::Channel3)),
            4 => Ok(Some(Self::Channel4)),
            5 => Ok(Some(Self::Channel5)),
            6 => Ok(Some(Self::Channel6)),
            other => Err(PoolError::validation(format!(
                "talk channel {other} does not exist"
            ))),
        }
    }

    /// Resolve a wire channel id that must name a channel.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Validation`] for `0` and ids above 6.
    pub fn require(id: u32) -> Result<Self, PoolError> {
        Self::from_id(id)?.ok_or_else(|| PoolError::validation("talk channel is required"))
    }

    /// The wire id of this channel.
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::Channel1 => 1,
            Self::Channel2 => 2,
            Self::Channel3 => 3,
            Self::Channel4 => 4,
            Self::Channel5 => 5,
            Self::Channel6 => 6,
        }
    }

    /// Column holding this channel's timestamp.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Channel1 => "last_talk_time1",
            Self::Channel2 => "last_talk_time2",
            Self::Channel3 => "last_talk_time3",
            Self::Channel4 => "last_talk_time4",
            Self::Channel5 => "last_talk_time5",
            Self::Channel6 => "last_talk_time6",
        }
    }

    /// Read this channel's timestamp from an account.
    #[must_use]
    pub fn timestamp(self, account: &Account) -> Option<DateTime<Utc>> {
        match self {
            Self::Channel1 => account.last_talk_time1,
            Self::Channel2 => account.last_talk_time2,
            Self::Channel3 => account.last_talk_time3,
            Self::Channel4 => account.last_talk_time4,
            Self::Channel5 => account.last_talk_time5,
            Self::Channel6 => account.last_talk_time6,
        }
    }

    /// Overwrite this channel's timestamp on an account.
    pub fn set_timestamp(self, account: &mut Account, at: Option<DateTime<Utc>>) {
        let slot = match self {
            Self::Channel1 => &mut account.last_talk_time1,
            Self::Channel2 => &mut account.last_talk_time2,
            Self::Channel3 => &mut account.last_talk_time3,
            Self::Channel4 => &mut account.last_talk_time4,
            Self::Channel5 => &mut account.last_talk_time5,
            Self::Channel6 => &mut account.last_talk_time6,
        };
        *slot = at;
    }
}

impl fmt::Display for CooldownChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel{}", self.id())
    }
}
