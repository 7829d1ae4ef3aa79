//! Application router configuration with protected and unprotected route definitions.

use axum::{Router, middleware, routing::get};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    auth_middleware::auth_guard,
    endpoints,
    expense::{get_expenses_page, get_index_page, post_expense},
    log_in::{get_log_in_page, post_log_in},
    log_out::get_log_out,
    not_found::get_404_not_found,
    register_user::{get_register_page, post_register},
    summary::get_summary,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(
            endpoints::LOG_IN_VIEW,
            get(get_log_in_page).post(post_log_in),
        )
        .route(
            endpoints::REGISTER_VIEW,
            get(get_register_page).post(post_register),
        )
        .route(endpoints::LOG_OUT, get(get_log_out));

    let protected_routes = Router::new()
        .route(endpoints::ROOT, get(get_index_page).post(post_expense))
        .route(endpoints::EXPENSES_VIEW, get(get_expenses_page))
        .route(endpoints::SUMMARY_API, get(get_summary))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .fallback(get_404_not_found)
        .with_state(state)
}
