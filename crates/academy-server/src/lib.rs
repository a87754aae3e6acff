//! HTTP host for the academy progression API.
//!
//! Wires [`academy_api::api_router`] under `/api`, adds request tracing and
//! a liveness probe, and loads [`ServerConfig`].

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use academy_core::store::ProgressionStore;
use axum::{Router, routing::get};
use config::{ConfigBuilder, builder::DefaultState};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

/// Environment variables with this prefix override file values,
/// e.g. `ACADEMY_PORT=9000`.
pub const ENV_PREFIX: &str = "ACADEMY";

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  /// SQLite database file. A leading `~/` is expanded.
  pub store_path: PathBuf,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_string(),
      port:       8080,
      store_path: PathBuf::from("~/.local/share/academy/academy.db"),
    }
  }
}

impl ServerConfig {
  /// Read `path` if it exists, then apply `ACADEMY_*` overrides.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    Self::from_builder(
      config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix(ENV_PREFIX)),
    )
  }

  fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, config::ConfigError> {
    builder.build()?.try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: `/api/...` plus `GET /health`.
pub fn app<S>(store: Arc<S>) -> Router
where
  S: ProgressionStore + 'static,
{
  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", academy_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use academy_store_sqlite::SqliteStore;
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use config::{File, FileFormat};
  use tower::ServiceExt as _;

  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    ServerConfig::from_builder(
      config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
    )
    .unwrap()
  }

  #[test]
  fn empty_file_uses_defaults() {
    assert_eq!(parse(""), ServerConfig::default());
  }

  #[test]
  fn file_values_override_defaults() {
    let cfg = parse(
      r#"
        port = 9100
        store_path = "/var/lib/academy.db"
      "#,
    );
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 9100);
    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/academy.db"));
    assert_eq!(cfg.address(), "127.0.0.1:9100");
  }

  #[test]
  fn missing_config_file_is_not_an_error() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/academy.toml")).unwrap();
    assert!(!cfg.host.is_empty());
  }

  #[test]
  fn absolute_paths_are_left_alone() {
    let p = Path::new("/tmp/academy.db");
    assert_eq!(expand_tilde(p), p.to_path_buf());
  }

  async fn fetch(uri: &str) -> (StatusCode, Vec<u8>) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = app(store).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
  }

  #[tokio::test]
  async fn health_probe_answers() {
    let (status, body) = fetch("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
  }

  #[tokio::test]
  async fn api_is_nested_under_prefix() {
    let id = "00000000-0000-0000-0000-000000000000";
    let (status, body) = fetch(&format!("/api/curricula/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains(id));

    let (status, body) = fetch(&format!("/curricula/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());
  }
}
