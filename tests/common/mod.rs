#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use datashare_api::auth::TokenService;
use datashare_api::config::AppConfig;
use datashare_api::database::DatabaseManager;
use datashare_api::storage::LocalFileStore;
use datashare_api::types::Role;
use datashare_api::{app, AppState};
use reqwest::StatusCode;
use serde_json::{json, Value};
use sqlx::PgPool;
use tempfile::TempDir;

/// Used when no database is configured; the pool never connects
const UNREACHABLE_DATABASE_URL: &str = "postgres://datashare@127.0.0.1:9/datashare_unused";

/// An in-process server on a free port. Each test gets its own, since the
/// server lives on the test's runtime.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub config: AppConfig,
    pub pool: PgPool,
    pub uploads: TempDir,
    pub pictures: TempDir,
}

impl TestServer {
    /// Server whose pool points nowhere. Enough for anything rejected before
    /// a handler touches the database.
    pub async fn without_database() -> Result<Self> {
        let mut config = base_config();
        config.database.url = UNREACHABLE_DATABASE_URL.to_string();
        let pool = DatabaseManager::connect_lazy(&config.database)?;
        Self::start(config, pool).await
    }

    /// Server backed by `TEST_DATABASE_URL`, or `None` (with a note on
    /// stderr) when the variable is unset.
    pub async fn with_database() -> Result<Option<Self>> {
        let _ = dotenvy::dotenv();
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping database-backed test");
            return Ok(None);
        };

        let mut config = base_config();
        config.database.url = url;
        let pool = DatabaseManager::connect(&config.database).await?;
        DatabaseManager::migrate(&pool).await?;
        Ok(Some(Self::start(config, pool).await?))
    }

    async fn start(mut config: AppConfig, pool: PgPool) -> Result<Self> {
        let uploads = tempfile::tempdir()?;
        let pictures = tempfile::tempdir()?;
        config.storage.dataset_dir = uploads.path().to_path_buf();
        config.storage.picture_dir = pictures.path().to_path_buf();

        let dataset_store = LocalFileStore::open(uploads.path()).await?;
        let picture_store = LocalFileStore::open(pictures.path()).await?;
        let state = AppState::new(config.clone(), pool.clone(), Arc::new(dataset_store), Arc::new(picture_store));

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app(state)).await;
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            config,
            pool,
            uploads,
            pictures,
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            // Root does not touch the database, so any answer means the listener is up
            if let Ok(resp) = self.client.get(self.url("/")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Token service sharing the server's secret, for minting test tokens
    pub fn tokens(&self) -> TokenService {
        TokenService::from_config(&self.config.security)
    }

    /// Sign up a fresh user with a unique email
    pub async fn signup(&self) -> Result<TestUser> {
        let email = unique_email("user");
        let password = "s3cret-passw0rd".to_string();
        let resp = self
            .client
            .post(self.url("/api/signup"))
            .json(&json!({
                "first_name": "Test",
                "last_name": "User",
                "email": email,
                "password": password,
                "agreed": true
            }))
            .send()
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::CREATED, "signup failed: {}", resp.status());

        let body: Value = resp.json().await?;
        let id = body["data"]["user"]["id"].as_i64().context("signup response has no user id")?;
        let token = body["data"]["token"].as_str().context("signup response has no token")?.to_string();
        Ok(TestUser { id, email, password, token })
    }

    /// Sign up, promote in the database, and log in again so the token carries the admin role
    pub async fn admin(&self) -> Result<TestUser> {
        let mut user = self.signup().await?;
        sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(Role::Admin.as_str())
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        user.token = self.login(&user.email, &user.password).await?;
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let resp = self
            .client
            .post(self.url("/api/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::OK, "login failed: {}", resp.status());
        let body: Value = resp.json().await?;
        Ok(body["data"]["token"].as_str().context("login response has no token")?.to_string())
    }

    /// Upload a dataset as `user`, returning the created row
    pub async fn upload(&self, user: &TestUser, name: &str, visibility: &str, contents: &[u8]) -> Result<Value> {
        let form = reqwest::multipart::Form::new()
            .text("datasetName", name.to_string())
            .text("category", "Health")
            .text("visibility", visibility.to_string())
            .text("description", "Test dataset")
            .text("tags", "test,integration")
            .part(
                "datasetFile",
                reqwest::multipart::Part::bytes(contents.to_vec()).file_name("sample.csv"),
            );

        let resp = self
            .client
            .post(self.url("/api/datasets/upload"))
            .bearer_auth(&user.token)
            .multipart(form)
            .send()
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::CREATED, "upload failed: {}", resp.status());
        let body: Value = resp.json().await?;
        Ok(body["data"].clone())
    }
}

pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub token: String,
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.test", prefix, uuid::Uuid::new_v4().simple())
}

fn base_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.run_migrations = false;
    config.api.enable_request_logging = false;
    config.security.enable_cors = false;
    config
}
