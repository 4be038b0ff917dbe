pub mod attachments;
pub mod cases;
pub mod health;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;

use casetrack_db::Database;
use casetrack_service::LocalService;
use casetrack_store::BlobStore;

use crate::auth::{auth_middleware, AuthConfig};

pub struct InnerAppState {
    pub service: LocalService,
    pub db: Arc<dyn Database>,
    pub store: Arc<dyn BlobStore>,
    pub auth: Option<Arc<AuthConfig>>,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_state(
    service: LocalService,
    db: Arc<dyn Database>,
    store: Arc<dyn BlobStore>,
    auth: Option<Arc<AuthConfig>>,
) -> AppState {
    Arc::new(InnerAppState {
        service,
        db,
        store,
        auth,
    })
}

pub fn build_router(state: AppState) -> Router {
    let public = Router::new().merge(health::routes());

    let protected = Router::new()
        .merge(cases::routes())
        .merge(attachments::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        // Uploads are capped at 10 MB by the handler; the transport limit sits
        // above that so the handler's own check produces the 400.
        .layer(DefaultBodyLimit::max(12 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
