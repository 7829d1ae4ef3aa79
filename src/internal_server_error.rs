//! The 500 error page returned when something goes wrong server-side.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::html::error_view;

/// A 500 page with a configurable description and suggested fix.
pub struct InternalServerError<'a> {
    pub description: &'a str,
    pub fix: &'a str,
}

impl Default for InternalServerError<'_> {
    fn default() -> Self {
        Self {
            description: "Something went wrong on our end.",
            fix: "Try again in a moment. If the problem persists, contact the site administrator.",
        }
    }
}

impl IntoResponse for InternalServerError<'_> {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(
                error_view("Internal Server Error", "500", self.description, self.fix)
                    .into_string(),
            ),
        )
            .into_response()
    }
}
