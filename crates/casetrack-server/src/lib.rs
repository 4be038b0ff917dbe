pub mod archive;
pub mod auth;
pub mod routes;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;

use casetrack_db::Database;
use casetrack_service::LocalService;
use casetrack_store::BlobStore;

use auth::AuthConfig;

pub async fn serve(
    listener: TcpListener,
    db: Arc<dyn Database>,
    store: Arc<dyn BlobStore>,
    auth: Option<Arc<AuthConfig>>,
) -> Result<()> {
    let service = LocalService::new(db.clone());
    let state = routes::build_state(service, db, store, auth);
    let app = routes::build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
