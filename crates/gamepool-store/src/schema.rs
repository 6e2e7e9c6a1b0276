//! Database schema definitions.
//!
//! Game tables are created at runtime, one per game name, so their DDL is a
//! template rather than a migration.

use gamepool_core::GameName;

/// Shared table holding the persisted cursor positions.
pub const COUNTERS_TABLE: &str = "game_counters";

/// Columns selected for an account row, in struct order.
pub const ACCOUNT_COLUMNS: &str = "id, account, password, b_zone, s_zone, rating, status, \
     in_use, level, computer_number, created_at, online_time, \
     last_talk_time1, last_talk_time2, last_talk_time3, \
     last_talk_time4, last_talk_time5, last_talk_time6";

/// DDL for the counters table.
pub const CREATE_COUNTERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS game_counters (
    game_name    TEXT PRIMARY KEY,
    asc_counter  BIGINT NOT NULL DEFAULT 0,
    desc_counter BIGINT NULL
)";

/// Quote a validated game name for use as a table identifier.
///
/// `GameName` only admits `[A-Za-z0-9_]`, so quoting cannot be escaped.
#[must_use]
pub fn table_ident(game: &GameName) -> String {
    format!("\"{game}\"")
}

/// DDL for one game table.
#[must_use]
pub fn create_game_table(game: &GameName) -> String {
    let table = table_ident(game);
    format!(
        r"
CREATE TABLE IF NOT EXISTS {table} (
    id              BIGSERIAL PRIMARY KEY,
    account         TEXT NOT NULL UNIQUE,
    password        TEXT NULL,
    b_zone          TEXT NOT NULL DEFAULT '',
    s_zone          TEXT NOT NULL DEFAULT '',
    rating          INTEGER NOT NULL DEFAULT 0,
    status          INTEGER NULL,
    in_use          BOOLEAN NULL,
    level           TEXT NULL,
    computer_number TEXT NULL,
    created_at      TIMESTAMPTZ NULL,
    online_time     TIMESTAMPTZ NULL,
    last_talk_time1 TIMESTAMPTZ NULL,
    last_talk_time2 TIMESTAMPTZ NULL,
    last_talk_time3 TIMESTAMPTZ NULL,
    last_talk_time4 TIMESTAMPTZ NULL,
    last_talk_time5 TIMESTAMPTZ NULL,
    last_talk_time6 TIMESTAMPTZ NULL
)"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_table_is_quoted() {
        let game = GameName::new("Fifa_24").unwrap();
        assert_eq!(table_ident(&game), "\"Fifa_24\"");
        assert!(create_game_table(&game).contains("CREATE TABLE IF NOT EXISTS \"Fifa_24\""));
    }
}
