use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use casetrack_db::SqliteDatabase;
use casetrack_service::LocalService;
use casetrack_store::StoreConfig;

use crate::auth::AuthConfig;
use crate::routes::AppState;

/// A test router plus direct handles for seeding state behind the HTTP
/// surface. `db_path` points at the backing SQLite file so tests can reach
/// past the typed layer with raw SQL (e.g. to plant legacy column data).
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub db_path: PathBuf,
}

fn temp_store() -> Arc<dyn casetrack_store::BlobStore> {
    let store_config = StoreConfig {
        endpoint_url: None,
        region: None,
        bucket: None,
        access_key_id: None,
        secret_access_key: None,
        local_data_dir: Some(
            tempfile::tempdir()
                .unwrap()
                .keep()
                .to_string_lossy()
                .to_string(),
        ),
    };
    casetrack_store::create_store(&store_config).unwrap()
}

/// Build a test app with file-backed SQLite, temp local store, no auth.
pub async fn test_app() -> TestApp {
    let db_path = tempfile::tempdir().unwrap().keep().join("casetrack.db");
    let db = Arc::new(SqliteDatabase::open_path(&db_path).unwrap());
    let service = LocalService::new(db.clone());
    let state = crate::routes::build_state(service, db, temp_store(), None);
    TestApp {
        router: crate::routes::build_router(state.clone()),
        state,
        db_path,
    }
}

/// Build a test router with auth enabled, returning (router, api_key).
pub async fn test_router_with_auth() -> (Router, String) {
    let db = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    let service = LocalService::new(db.clone());
    let api_key = crate::auth::generate_api_key();
    let auth = Arc::new(AuthConfig {
        env_key_hash: Some(crate::auth::sha256_hex(&api_key)),
        db: db.clone(),
    });
    let state = crate::routes::build_state(service, db, temp_store(), Some(auth));
    (crate::routes::build_router(state), api_key)
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn an axum test server on a random port. Returns the TestServer
/// with the `base_url` (e.g. "http://127.0.0.1:12345").
pub async fn spawn_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let app = test_app().await.router;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        _handle: handle,
    }
}
