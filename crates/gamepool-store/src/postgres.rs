//! PostgreSQL storage implementation.
//!
//! Tables:
//! - one table per game, named after the game (see [`crate::schema`])
//! - `game_counters`: persisted cursor positions keyed by game name

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};

use gamepool_core::{Account, AccountFilter, CooldownChannel, Counter, Direction, GameName};

use crate::error::{Result, StoreError};
use crate::schema::{self, table_ident, ACCOUNT_COLUMNS};
use crate::Store;

/// SQLSTATE for "relation does not exist".
const UNDEFINED_TABLE: &str = "42P01";

/// PostgreSQL-backed storage.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `url` with at most `max_connections` pooled connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create the shared counters table.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(schema::CREATE_COUNTERS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a driver error, recognising a missing game table.
fn db_error(game: &GameName, err: sqlx::Error) -> StoreError {
    let undefined = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNDEFINED_TABLE);
    if undefined {
        StoreError::NoSuchGame(game.to_string())
    } else {
        StoreError::Database(err.to_string())
    }
}

fn row_to_account(game: &GameName, row: &PgRow) -> std::result::Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        game_name: game.to_string(),
        account: row.try_get("account")?,
        password: row.try_get("password")?,
        b_zone: row.try_get("b_zone")?,
        s_zone: row.try_get("s_zone")?,
        rating: row.try_get("rating")?,
        status: row.try_get("status")?,
        in_use: row.try_get("in_use")?,
        level: row.try_get("level")?,
        computer_number: row.try_get("computer_number")?,
        created_at: row.try_get("created_at")?,
        online_time: row.try_get("online_time")?,
        last_talk_time1: row.try_get("last_talk_time1")?,
        last_talk_time2: row.try_get("last_talk_time2")?,
        last_talk_time3: row.try_get("last_talk_time3")?,
        last_talk_time4: row.try_get("last_talk_time4")?,
        last_talk_time5: row.try_get("last_talk_time5")?,
        last_talk_time6: row.try_get("last_talk_time6")?,
    })
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit.max(1)).unwrap_or(i64::MAX)
}

impl PgStore {
    async fn fetch_accounts(
        &self,
        game: &GameName,
        mut builder: QueryBuilder<'_, Postgres>,
    ) -> Result<Vec<Account>> {
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error(game, e))?;
        rows.iter()
            .map(|row| row_to_account(game, row))
            .collect::<std::result::Result<_, _>>()
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_game_table(&self, game: &GameName) -> Result<()> {
        sqlx::query(&schema::create_game_table(game))
            .execute(&self.pool)
            .await?;
        tracing::debug!(game = %game, "game table ensured");
        Ok(())
    }

    async fn count_rows(&self, game: &GameName) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) AS n FROM {}", table_ident(game));
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error(game, e))?;
        Ok(row.try_get("n")?)
    }

    async fn upsert_accounts(&self, game: &GameName, accounts: &[Account]) -> Result<u64> {
        if accounts.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            r"
            INSERT INTO {}
                (account, password, b_zone, s_zone, rating, status, in_use, level,
                 computer_number, created_at, online_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (account) DO UPDATE SET
                b_zone = EXCLUDED.b_zone,
                s_zone = EXCLUDED.s_zone,
                rating = EXCLUDED.rating,
                online_time = EXCLUDED.online_time
            ",
            table_ident(game)
        );

        let mut tx = self.pool.begin().await?;
        for account in accounts {
            sqlx::query(&sql)
                .bind(&account.account)
                .bind(&account.password)
                .bind(&account.b_zone)
                .bind(&account.s_zone)
                .bind(account.rating)
                .bind(account.status)
                .bind(account.in_use)
                .bind(&account.level)
                .bind(&account.computer_number)
                .bind(account.created_at)
                .bind(account.online_time)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error(game, e))?;
        }
        tx.commit().await?;

        Ok(accounts.len() as u64)
    }

    async fn update_account(&self, game: &GameName, account: &Account) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET b_zone = $1, s_zone = $2, rating = $3, online_time = $4 \
             WHERE account = $5",
            table_ident(game)
        );
        let result = sqlx::query(&sql)
            .bind(&account.b_zone)
            .bind(&account.s_zone)
            .bind(account.rating)
            .bind(account.online_time)
            .bind(&account.account)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(game, e))?;
        Ok(result.rows_affected())
    }

    async fn delete_account(&self, game: &GameName, account: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE account = $1", table_ident(game));
        let result = sqlx::query(&sql)
            .bind(account)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(game, e))?;
        Ok(result.rows_affected())
    }

    async fn query_accounts(
        &self,
        game: &GameName,
        filter: &AccountFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Account>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE TRUE",
            table_ident(game)
        ));

        if let Some(account) = &filter.account {
            builder.push(" AND account = ").push_bind(account.clone());
        }
        if let Some(b_zone) = &filter.b_zone {
            builder.push(" AND b_zone = ").push_bind(b_zone.clone());
        }
        if let Some(s_zone) = &filter.s_zone {
            builder.push(" AND s_zone = ").push_bind(s_zone.clone());
        }
        if let Some(rating) = filter.rating {
            builder.push(" AND rating = ").push_bind(rating);
        }
        if let Some(since) = filter.online_since(now) {
            builder.push(" AND online_time > ").push_bind(since);
        }
        if let Some((channel, cutoff)) = filter.cooldown_cutoff(now) {
            let column = channel.column();
            builder
                .push(format!(" AND ({column} IS NULL OR {column} <= "))
                .push_bind(cutoff)
                .push(")");
        }
        builder
            .push(" ORDER BY id ASC LIMIT ")
            .push_bind(limit_param(filter.limit));

        self.fetch_accounts(game, builder).await
    }

    async fn fetch_after(
        &self,
        game: &GameName,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<Account>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE id > ",
            table_ident(game)
        ));
        builder
            .push_bind(after_id)
            .push(" ORDER BY id ASC LIMIT ")
            .push_bind(limit_param(limit));
        self.fetch_accounts(game, builder).await
    }

    async fn fetch_before(
        &self,
        game: &GameName,
        at_most: i64,
        limit: usize,
    ) -> Result<Vec<Account>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE id <= ",
            table_ident(game)
        ));
        builder
            .push_bind(at_most)
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(limit_param(limit));
        let mut rows = self.fetch_accounts(game, builder).await?;
        rows.reverse();
        Ok(rows)
    }

    async fn set_channel_time(
        &self,
        game: &GameName,
        ids: &[i64],
        channel: CooldownChannel,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE {} SET {} = $1 WHERE id = ANY($2)",
            table_ident(game),
            channel.column()
        );
        let result = sqlx::query(&sql)
            .bind(at)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(game, e))?;
        Ok(result.rows_affected())
    }

    async fn clear_channel(&self, game: &GameName, channel: CooldownChannel) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET {} = NULL",
            table_ident(game),
            channel.column()
        );
        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(game, e))?;
        Ok(result.rows_affected())
    }

    async fn load_counter(&self, game: &GameName) -> Result<Counter> {
        let row = sqlx::query(
            r"
            INSERT INTO game_counters (game_name) VALUES ($1)
            ON CONFLICT (game_name) DO UPDATE SET game_name = EXCLUDED.game_name
            RETURNING asc_counter, desc_counter
            ",
        )
        .bind(game.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(Counter {
            asc: row.try_get("asc_counter")?,
            desc: row.try_get("desc_counter")?,
        })
    }

    async fn save_counter(&self, game: &GameName, direction: Direction, value: i64) -> Result<()> {
        let sql = match direction {
            Direction::Asc => {
                r"
                INSERT INTO game_counters (game_name, asc_counter) VALUES ($1, $2)
                ON CONFLICT (game_name) DO UPDATE SET asc_counter = EXCLUDED.asc_counter
                "
            }
            Direction::Desc => {
                r"
                INSERT INTO game_counters (game_name, desc_counter) VALUES ($1, $2)
                ON CONFLICT (game_name) DO UPDATE SET desc_counter = EXCLUDED.desc_counter
                "
            }
        };
        sqlx::query(sql)
            .bind(game.as_str())
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
