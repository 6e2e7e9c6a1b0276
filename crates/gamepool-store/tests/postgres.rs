//! PostgreSQL backend tests.
//!
//! These need a reachable database. Run with:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/gamepool_test cargo test -p gamepool-store -- --ignored
//! ```

#![cfg(feature = "postgres")]

use chrono::{Duration, Utc};

use gamepool_core::{Account, AccountFilter, CooldownChannel, Counter, Direction, GameName};
use gamepool_store::{PgStore, Store, StoreError};

async fn connect() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for --ignored tests");
    let store = PgStore::connect(&url, 2).await.expect("Failed to connect");
    store.migrate().await.expect("Failed to migrate");
    store
}

/// A fresh game table with a unique name.
async fn fresh_game(store: &PgStore) -> GameName {
    let suffix = Utc::now().timestamp_nanos_opt().unwrap_or_default().unsigned_abs();
    let game = GameName::new(format!("t{suffix}")).unwrap();
    store.create_game_table(&game).await.unwrap();
    game
}

fn accounts(game: &GameName, n: usize) -> Vec<Account> {
    (1..=n)
        .map(|i| {
            let mut account = Account::new(game.as_str(), format!("acc{i}"));
            account.touch(Utc::now());
            account
        })
        .collect()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn upsert_and_keyset_fetch() {
    let store = connect().await;
    let game = fresh_game(&store).await;

    store.upsert_accounts(&game, &accounts(&game, 10)).await.unwrap();
    assert_eq!(store.count_rows(&game).await.unwrap(), 10);

    let mut refreshed = Account::new(game.as_str(), "acc1");
    refreshed.rating = 5;
    store.upsert_accounts(&game, &[refreshed]).await.unwrap();
    assert_eq!(store.count_rows(&game).await.unwrap(), 10);

    let ids: Vec<i64> = store
        .fetch_after(&game, 0, 4)
        .await
        .unwrap()
        .iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let ids: Vec<i64> = store
        .fetch_before(&game, 10, 3)
        .await
        .unwrap()
        .iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ids, vec![8, 9, 10]);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn cooldown_filter_matches_memory_semantics() {
    let store = connect().await;
    let game = fresh_game(&store).await;
    store.upsert_accounts(&game, &accounts(&game, 3)).await.unwrap();

    let now = Utc::now();
    store
        .set_channel_time(&game, &[2], CooldownChannel::Channel3, now)
        .await
        .unwrap();

    let mut filter = AccountFilter::all(10);
    filter.cooldown = Some((CooldownChannel::Channel3, Duration::minutes(10)));
    let ids: Vec<i64> = store
        .query_accounts(&game, &filter, now)
        .await
        .unwrap()
        .iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ids, vec![1, 3]);

    store.clear_channel(&game, CooldownChannel::Channel3).await.unwrap();
    assert_eq!(store.query_accounts(&game, &filter, now).await.unwrap().len(), 3);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn counters_round_trip() {
    let store = connect().await;
    let game = fresh_game(&store).await;

    assert_eq!(store.load_counter(&game).await.unwrap(), Counter::default());
    store.save_counter(&game, Direction::Asc, 200).await.unwrap();
    store.save_counter(&game, Direction::Desc, 7).await.unwrap();
    assert_eq!(
        store.load_counter(&game).await.unwrap(),
        Counter {
            asc: 200,
            desc: Some(7)
        }
    );
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn missing_table_maps_to_no_such_game() {
    let store = connect().await;
    let game = GameName::new("never_created_game").unwrap();
    let err = store.count_rows(&game).await.unwrap_err();
    assert!(matches!(err, StoreError::NoSuchGame(_)));
}
