/// Common test utilities for HTTP tests
///
/// Each context owns a private in-memory database with migrations applied,
/// managers `m-1`/`m-2` (active) and `m-off` (inactive), and a router built
/// on top of it.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use roster_api::app::{build_router, AppState};
use roster_api::config::{ApiConfig, Config, DatabaseConfig};
use roster_shared::db::migrations::run_migrations;
use roster_shared::db::pool::{create_pool, DatabaseConfig as PoolConfig};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::Service as _;

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: SqlitePool,
    pub app: axum::Router,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let db = create_pool(PoolConfig::in_memory()).await?;
        run_migrations(&db).await?;

        for (manager_id, active) in [("m-1", true), ("m-2", true), ("m-off", false)] {
            sqlx::query("INSERT INTO managers (manager_id, full_name, is_active) VALUES (?, ?, ?)")
                .bind(manager_id)
                .bind(format!("Manager {manager_id}"))
                .bind(active)
                .execute(&db)
                .await?;
        }

        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
        };

        let app = build_router(AppState::new(db.clone(), config));

        Ok(TestContext { db, app })
    }

    /// Sends a request and returns status plus parsed JSON body
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                panic!("Non-JSON body ({}): {}", status, String::from_utf8_lossy(&body))
            })
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Creates a user through the API and returns its `user_id`
    pub async fn create_user(&self, full_name: &str, mob_num: &str, manager_id: &str) -> String {
        let (status, body) = self
            .post(
                "/create_user",
                serde_json::json!({
                    "full_name": full_name,
                    "mob_num": mob_num,
                    "pan_num": "abcde1234f",
                    "manager_id": manager_id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    /// Total number of rows in `users`
    pub async fn row_count(&self) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await
            .unwrap();
        count
    }
}
