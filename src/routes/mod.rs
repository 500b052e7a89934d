// Routes module - builds the HTTP surface
// Public handlers live in crate::handlers, admin commands in admin

pub mod admin;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::SharedState;
use crate::handlers::*;

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // ===== PROPOSITIONS =====
        .route("/propositions", get(list_propositions).post(create_proposition))
        .route("/propositions/:id", get(get_proposition))
        .route("/propositions/:id/entries", post(place_entry))
        .route("/propositions/:id/quote", get(quote))
        .route("/propositions/:id/settle", post(creator_settle))
        .route("/propositions/:id/disputes", post(file_dispute))

        // ===== WALLETS =====
        .route("/wallets/:user", get(get_wallets))
        .route("/wallets/:user/deposit", post(deposit))
        .route("/wallets/:user/withdraw", post(withdraw))
        .route("/wallets/:user/journal", get(get_journal))

        // ===== ADMIN =====
        .route("/admin/propositions/:id/close", post(admin::close))
        .route("/admin/propositions/:id/void", post(admin::void))
        .route("/admin/propositions/:id/cancel", post(admin::cancel))
        .route("/admin/propositions/:id/settle", post(admin::settle))
        .route("/admin/propositions/:id/reset", post(admin::reset))
        .route("/admin/propositions/:id/reconcile", get(admin::reconcile))
        .route("/admin/settlements/:id", get(admin::get_settlement))
        .route("/admin/settlements/:id/retry", post(admin::retry_finalize))
        .route("/admin/finalize-jobs", get(admin::list_finalize_jobs))
        .route("/admin/disputes", get(admin::list_disputes))
        .route("/admin/disputes/:id/resolve", post(admin::resolve_dispute))
        .route("/admin/audit", get(admin::get_audit_log))

        // ===== HEALTH CHECK =====
        .route("/health", get(health_check))

        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
