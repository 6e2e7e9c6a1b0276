//! Identifier types for gamepool.
//!
//! A game name doubles as the name of the table that holds the game's accounts,
//! so it is validated once at the boundary and carried around as [`GameName`]
//! from then on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of a game name (PostgreSQL identifier limit).
pub const MAX_GAME_NAME_LEN: usize = 63;

/// Errors produced while validating identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The game name was empty.
    #[error("game name must not be empty")]
    EmptyGameName,

    /// The game name is not a valid table identifier.
    #[error("game name {0:?} must start with a letter and contain only letters, digits or underscores")]
    InvalidGameName(String),

    /// The game name exceeds [`MAX_GAME_NAME_LEN`].
    #[error("game name is longer than {MAX_GAME_NAME_LEN} characters")]
    GameNameTooLong,

    /// The account name was empty.
    #[error("account must not be empty")]
    EmptyAccount,
}

/// A validated game name.
///
/// Matches `^[a-zA-Z][a-zA-Z0-9_]*$`, which makes it safe to splice into SQL
/// as a quoted identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameName(String);

impl GameName {
    /// Validate and wrap a game name.
    ///
    /// # Errors
    ///
    /// Returns an [`IdError`] if the name is empty, too long, or contains
    /// characters other than ASCII letters, digits and underscores.
    pub fn new(name: impl Into<String>) -> Result<Self, IdError> {
        let name = name.into();
        let mut chars = name.chars();
        match chars.next() {
            None => return Err(IdError::EmptyGameName),
            Some(first) if !first.is_ascii_alphabetic() => {
                return Err(IdError::InvalidGameName(name));
            }
            Some(_) => {}
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(IdError::InvalidGameName(name));
        }
        if name.len() > MAX_GAME_NAME_LEN {
            return Err(IdError::GameNameTooLong);
        }
        Ok(Self(name))
    }

    /// The game name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for GameName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for GameName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameName({})", self.0)
    }
}

impl fmt::Display for GameName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GameName {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GameName> for String {
    fn from(name: GameName) -> Self {
        name.0
    }
}

impl AsRef<str> for GameName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check that an account name is present.
///
/// # Errors
///
/// Returns [`IdError::EmptyAccount`] for an empty or whitespace-only account.
pub fn validate_account(account: &str) -> Result<(), IdError> {
    if account.trim().is_empty() {
        return Err(IdError::EmptyAccount);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_identifier_names() {
        for name in ["fifa", "D2", "game_2024", "a"] {
            let game = GameName::new(name).unwrap();
            assert_eq!(game.as_str(), name);
        }
    }

    #[test]
    fn rejects_empty_name() {
        assert_eq!(GameName::new(""), Err(IdError::EmptyGameName));
    }

    #[test]
    fn rejects_names_that_are_not_identifiers() {
        for name in ["1game", "_game", "game-name", "game name", "g;drop", "ga\"me"] {
            assert!(
                matches!(GameName::new(name), Err(IdError::InvalidGameName(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_overlong_names() {
        let name = "g".repeat(MAX_GAME_NAME_LEN + 1);
        assert_eq!(GameName::new(name), Err(IdError::GameNameTooLong));
    }

    #[test]
    fn serde_validates() {
        let game: GameName = serde_json::from_str("\"demo\"").unwrap();
        assert_eq!(game.to_string(), "demo");
        assert!(serde_json::from_str::<GameName>("\"9lives\"").is_err());
    }

    #[test]
    fn account_must_be_present() {
        assert!(validate_account("a1").is_ok());
        assert_eq!(validate_account(""), Err(IdError::EmptyAccount));
        assert_eq!(validate_account("  "), Err(IdError::EmptyAccount));
    }
}
