//! The fallback route for unknown URIs.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::html::error_view;

/// Route handler for unknown URIs.
pub async fn get_404_not_found() -> Response {
    get_404_not_found_response()
}

/// The 404 page as a response, for use outside of a route handler.
pub fn get_404_not_found_response() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(
            error_view(
                "Not Found",
                "404",
                "The page you are looking for does not exist.",
                "Check the address for typos, or head back home.",
            )
            .into_string(),
        ),
    )
        .into_response()
}
