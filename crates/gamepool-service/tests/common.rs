//! Common test utilities for gamepool integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::json;

use gamepool_service::{create_router, AppState, CacheConfig, PoolService, ServiceConfig};
use gamepool_store::{MemoryStore, Store};

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The pool behind the server.
    pub service: Arc<PoolService>,
    /// The backing store, for inspecting persisted rows.
    pub store: Arc<MemoryStore>,
}

impl TestHarness {
    /// Create a harness that flushes inserts immediately.
    pub fn new() -> Self {
        Self::with_cache(CacheConfig {
            insert_count: 1,
            ..CacheConfig::default()
        })
    }

    /// Create a harness with custom engine settings.
    pub fn with_cache(cache: CacheConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = ServiceConfig {
            tcp_addr: "127.0.0.1:0".into(),
            http_addr: "127.0.0.1:0".into(),
            cache: cache.clone(),
            ..ServiceConfig::default()
        };

        let service = Arc::new(PoolService::new(
            Arc::clone(&store) as Arc<dyn Store>,
            cache,
        ));
        let state = AppState::new(Arc::clone(&service), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            service,
            store,
        }
    }

    /// Create `game` and insert accounts `acc1..=accN`.
    pub async fn seed(&self, game: &str, rows: usize) {
        self.server
            .post("/createNewGame")
            .json(&json!({ "game_name": game }))
            .await
            .assert_status_ok();

        for i in 1..=rows {
            self.server
                .post("/insert")
                .json(&json!({ "game_name": game, "account": format!("acc{i}") }))
                .await
                .assert_status_ok();
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
