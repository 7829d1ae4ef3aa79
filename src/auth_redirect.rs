//! Helpers for redirect URLs during authentication flows.
//!
//! When an unauthenticated client requests a protected page, the log-in
//! redirect carries the originally requested destination in a `redirect_url`
//! query parameter so the client can be returned there after logging in.

use axum::{extract::Request, http::Uri};
use tracing::error;

use crate::endpoints;

fn is_safe_redirect_url(redirect_url: &str) -> bool {
    if !redirect_url.starts_with('/') || redirect_url.starts_with("//") {
        return false;
    }

    let path = redirect_url
        .split_once('?')
        .map(|(path, _)| path)
        .unwrap_or(redirect_url);

    path != endpoints::LOG_IN_VIEW
}

/// Validate a redirect target taken from client input.
///
/// Only same-origin paths are accepted, and never the log-in page itself,
/// which would create a redirect loop.
pub fn normalize_redirect_url(raw_url: &str) -> Option<String> {
    let uri = raw_url.parse::<Uri>().ok()?;
    if uri.scheme().is_some() || uri.authority().is_some() {
        return None;
    }
    let path_and_query = uri.path_and_query()?.as_str();

    is_safe_redirect_url(path_and_query).then(|| path_and_query.to_owned())
}

/// Build the log-in page URL that preserves the destination of `request`.
pub fn build_log_in_redirect_url(request: &Request) -> Option<String> {
    let path_and_query = request.uri().path_and_query()?.as_str();
    let redirect_target = normalize_redirect_url(path_and_query)?;

    build_log_in_redirect_url_from_target(&redirect_target)
}

pub(crate) fn build_log_in_redirect_url_from_target(redirect_target: &str) -> Option<String> {
    match serde_urlencoded::to_string([("redirect_url", redirect_target)]) {
        Ok(param) => Some(format!("{}?{}", endpoints::LOG_IN_VIEW, param)),
        Err(error) => {
            error!("Could not encode redirect URL {redirect_target}: {error}");
            None
        }
    }
}
