//! The log-in page and the route handler for log-in requests.
//!
//! The auth_cookie module handles the lower level cookie logic.

use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    app_state::create_cookie_key,
    auth_cookie::{DEFAULT_COOKIE_DURATION, invalidate_auth_cookie, set_auth_cookie},
    auth_redirect::normalize_redirect_url,
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, alert_error, base, log_in_register, password_input, text_input},
    internal_server_error::InternalServerError,
    user::{User, get_user_by_username},
};

/// The message shown when the username or the password is wrong.
///
/// The same message is used for both cases so that the response does not
/// reveal which usernames are registered.
pub const INVALID_CREDENTIALS_ERROR_MSG: &str = "Invalid username or password";

/// How long the auth cookie should last if the user ticks "remember me" at log-in.
const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(30);

/// The state needed to perform a log-in.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The key for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// How long auth cookies are valid for.
    pub cookie_duration: Duration,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl LogInState {
    /// Create the cookie key from a string and set the default cookie duration.
    pub fn new(cookie_secret: &str, db_connection: Arc<Mutex<Connection>>) -> Self {
        Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            db_connection,
        }
    }
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// The query parameters accepted by the log-in page.
#[derive(Deserialize)]
pub struct LogInQuery {
    /// Where to send the client after a successful log-in.
    pub redirect_url: Option<String>,
}

/// The raw data entered by the user in the log-in form.
///
/// The username and password are stored as plain strings. There is no need
/// for validation here since they will be compared against the records in the
/// database, which have been verified.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    /// Username entered during log-in.
    pub username: String,
    /// Password entered during log-in.
    pub password: String,
    /// Whether to extend the initial auth cookie duration.
    ///
    /// This value comes from a checkbox, so it either has a string value or
    /// is not set. The `Some` variant should be interpreted as `true`
    /// regardless of the string value.
    pub remember_me: Option<String>,
    /// Where to send the client after a successful log-in.
    pub redirect_url: Option<String>,
}

fn log_in_page(
    error_message: Option<&str>,
    username_value: &str,
    redirect_url: Option<&str>,
) -> Markup {
    base(
        "Log in",
        &log_in_register(
            "Log in",
            &html! {
                form method="post" action=(endpoints::LOG_IN_VIEW)
                {
                    @if let Some(message) = error_message {
                        (alert_error(message))
                    }

                    (text_input("text", "username", "Username", username_value))
                    (password_input("password", "Password"))

                    div
                    {
                        label
                        {
                            input type="checkbox" name="remember_me";
                            " Remember me"
                        }
                    }

                    @if let Some(redirect_url) = redirect_url {
                        input type="hidden" name="redirect_url" value=(redirect_url);
                    }

                    button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Log in" }

                    p
                    {
                        "Don't have an account? "
                        a href=(endpoints::REGISTER_VIEW) { "Register" }
                    }
                }
            },
        ),
    )
}

/// Display the log-in page.
///
/// A `redirect_url` query parameter set by the auth middleware is carried
/// through the form as a hidden field so the client ends up where they were
/// originally headed.
pub async fn get_log_in_page(Query(query): Query<LogInQuery>) -> Response {
    let redirect_url = query
        .redirect_url
        .as_deref()
        .and_then(normalize_redirect_url);

    Html(log_in_page(None, "", redirect_url.as_deref()).into_string()).into_response()
}

/// Handler for log-in requests via the POST method.
///
/// On a successful log-in the auth cookie is set and the client is redirected
/// to the home page, or to the validated `redirect_url` from the form.
/// Otherwise, the page is re-rendered with an error message.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn post_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    Form(log_in_data): Form<LogInData>,
) -> Response {
    let redirect_url = log_in_data
        .redirect_url
        .as_deref()
        .and_then(normalize_redirect_url);

    // Usernames are stored trimmed, so look up the trimmed form too.
    let user: User = match get_user_by_username(
        log_in_data.username.trim(),
        &state
            .db_connection
            .lock()
            .expect("Could not acquire lock to database connection"),
    ) {
        Ok(user) => user,
        Err(Error::NotFound) => {
            return log_in_error_response(&log_in_data, redirect_url.as_deref());
        }
        Err(error) => {
            tracing::error!("Unhandled error while looking up user: {error}");
            return InternalServerError::default().into_response();
        }
    };

    let is_password_valid = match user.password_hash.verify(&log_in_data.password) {
        Ok(is_password_valid) => is_password_valid,
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            return InternalServerError::default().into_response();
        }
    };

    if !is_password_valid {
        return log_in_error_response(&log_in_data, redirect_url.as_deref());
    }

    let cookie_duration = if log_in_data.remember_me.is_some() {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    let destination = redirect_url.as_deref().unwrap_or(endpoints::ROOT);

    match set_auth_cookie(jar.clone(), user.id, cookie_duration) {
        Ok(updated_jar) => (updated_jar, Redirect::to(destination)).into_response(),
        Err(error) => {
            tracing::error!("Error setting auth cookie: {error}");
            (
                invalidate_auth_cookie(jar),
                InternalServerError::default().into_response(),
            )
                .into_response()
        }
    }
}

fn log_in_error_response(log_in_data: &LogInData, redirect_url: Option<&str>) -> Response {
    (
        StatusCode::OK,
        Html(
            log_in_page(
                Some(INVALID_CREDENTIALS_ERROR_MSG),
                &log_in_data.username,
                redirect_url,
            )
            .into_string(),
        ),
    )
        .into_response()
}


#[cfg(test)]
mod log_in_tests {
    use std::{
        collections::HashSet,
        sync::{Arc, Mutex},
    };

    use axum::{
        Form, Router,
        body::Body,
        extract::State,
        http::{Response, StatusCode, header::SET_COOKIE},
        routing::post,
    };
    use axum_extra::extract::{PrivateCookieJar, cookie::Cookie};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use time::{Duration, OffsetDateTime};

    use crate::{
        PasswordHash,
        auth_cookie::{COOKIE_EXPIRY, COOKIE_USER_ID},
        endpoints,
        user::{UserID, create_user_table},
    };

    use super::{
        INVALID_CREDENTIALS_ERROR_MSG, LogInData, LogInState, REMEMBER_ME_COOKIE_DURATION,
        post_log_in,
    };

    const TEST_USERNAME: &str = "alice";
    const TEST_PASSWORD: &str = "averysecurepassword";

    fn get_test_state(with_user: bool) -> LogInState {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        create_user_table(&connection).expect("Could not create user table");

        if with_user {
            let password_hash = PasswordHash::from_raw_password(TEST_PASSWORD, 4)
                .expect("Could not hash test password");

            connection
                .execute(
                    "INSERT INTO user (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
                    (
                        UserID::new(1).as_i64(),
                        TEST_USERNAME,
                        "alice@example.com",
                        password_hash.as_ref(),
                    ),
                )
                .expect("Could not create test user");
        }

        LogInState::new("foobar", Arc::new(Mutex::new(connection)))
    }

    async fn new_log_in_request(state: LogInState, log_in_form: LogInData) -> Response<Body> {
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        post_log_in(State(state), jar, Form(log_in_form)).await
    }

    fn log_in_form(username: &str, password: &str) -> LogInData {
        LogInData {
            username: username.to_owned(),
            password: password.to_owned(),
            remember_me: None,
            redirect_url: None,
        }
    }

    #[track_caller]
    fn assert_redirect(response: &Response<Body>, want_location: &str) {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            want_location,
            "want redirect to {want_location}"
        );
    }

    #[track_caller]
    fn assert_set_cookie(response: &Response<Body>) {
        let mut found_cookies = HashSet::new();

        for cookie_headers in response.headers().get_all(SET_COOKIE) {
            let cookie_string = cookie_headers.to_str().unwrap();
            let cookie = Cookie::parse(cookie_string).unwrap();

            match cookie.name() {
                COOKIE_USER_ID | COOKIE_EXPIRY => {
                    assert!(cookie.expires_datetime() > Some(OffsetDateTime::now_utc()));
                    found_cookies.insert(cookie.name().to_string());
                }
                _ => panic!("Unexpected cookie found: {}", cookie.name()),
            }
        }

        assert!(
            found_cookies.contains(COOKIE_USER_ID),
            "could not find cookie '{COOKIE_USER_ID}' in {found_cookies:?}"
        );
        assert!(
            found_cookies.contains(COOKIE_EXPIRY),
            "could not find cookie '{COOKIE_EXPIRY}' in {found_cookies:?}"
        );
    }

    async fn assert_body_contains_message(response: Response<Body>, message: &str) {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8_lossy(&body).to_string();

        assert!(
            text.contains(message),
            "response body should contain the text '{message}' but got {text}"
        );
    }

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let state = get_test_state(true);

        let response = new_log_in_request(state, log_in_form(TEST_USERNAME, TEST_PASSWORD)).await;

        assert_redirect(&response, endpoints::ROOT);
        assert_set_cookie(&response);
    }

    #[tokio::test]
    async fn log_in_trims_whitespace_around_username() {
        let state = get_test_state(true);

        let response = new_log_in_request(state, log_in_form("  alice  ", TEST_PASSWORD)).await;

        assert_redirect(&response, endpoints::ROOT);
        assert_set_cookie(&response);
    }

    #[tokio::test]
    async fn log_in_fails_with_unknown_username() {
        let state = get_test_state(true);

        let response = new_log_in_request(state, log_in_form("mallory", TEST_PASSWORD)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_body_contains_message(response, INVALID_CREDENTIALS_ERROR_MSG).await;
    }

    #[tokio::test]
    async fn log_in_fails_with_incorrect_password() {
        let state = get_test_state(true);

        let response = new_log_in_request(state, log_in_form(TEST_USERNAME, "wrongpassword")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_body_contains_message(response, INVALID_CREDENTIALS_ERROR_MSG).await;
    }

    #[tokio::test]
    async fn unknown_username_and_wrong_password_give_the_same_message() {
        let unknown_username =
            new_log_in_request(get_test_state(true), log_in_form("mallory", TEST_PASSWORD)).await;
        let wrong_password = new_log_in_request(
            get_test_state(true),
            log_in_form(TEST_USERNAME, "wrongpassword"),
        )
        .await;

        assert_eq!(unknown_username.status(), wrong_password.status());
        assert_body_contains_message(unknown_username, INVALID_CREDENTIALS_ERROR_MSG).await;
        assert_body_contains_message(wrong_password, INVALID_CREDENTIALS_ERROR_MSG).await;
    }

    #[tokio::test]
    async fn log_in_redirects_to_validated_redirect_url() {
        let state = get_test_state(true);
        let mut form = log_in_form(TEST_USERNAME, TEST_PASSWORD);
        form.redirect_url = Some("/expenses".to_owned());

        let response = new_log_in_request(state, form).await;

        assert_redirect(&response, endpoints::EXPENSES_VIEW);
    }

    #[tokio::test]
    async fn log_in_ignores_unsafe_redirect_url() {
        let state = get_test_state(true);
        let mut form = log_in_form(TEST_USERNAME, TEST_PASSWORD);
        form.redirect_url = Some("https://evil.example/".to_owned());

        let response = new_log_in_request(state, form).await;

        assert_redirect(&response, endpoints::ROOT);
    }

    /// Test helper macro to assert that two date times are within two seconds
    /// of each other. Used instead of a function so that the file and line
    /// number of the caller is included in the error message instead of the
    /// helper.
    macro_rules! assert_date_time_close {
        ($left:expr, $right:expr$(,)?) => {
            assert!(
                ($left - $right).abs() < Duration::seconds(2),
                "got date time {:?}, want {:?}",
                $left,
                $right
            );
        };
    }

    #[tokio::test]
    async fn remember_me_extends_auth_cookie_through_form() {
        let state = get_test_state(true);
        let app = Router::new()
            .route(endpoints::LOG_IN_VIEW, post(post_log_in))
            .with_state(state);
        let server = TestServer::new(app);
        let form = [
            ("username", TEST_USERNAME),
            ("password", TEST_PASSWORD),
            ("remember_me", "on"),
        ];

        let response = server.post(endpoints::LOG_IN_VIEW).form(&form).await;

        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);

        let auth_cookie = response.cookie(COOKIE_USER_ID);
        assert_date_time_close!(
            auth_cookie.expires_datetime().unwrap(),
            OffsetDateTime::now_utc() + REMEMBER_ME_COOKIE_DURATION
        );
    }

    #[tokio::test]
    async fn form_deserialises_without_remember_me() {
        let state = get_test_state(false);
        let app = Router::new()
            .route(endpoints::LOG_IN_VIEW, post(post_log_in))
            .with_state(state);
        let server = TestServer::new(app);
        let form = [("username", "alice"), ("password", "test")];

        let response = server.post(endpoints::LOG_IN_VIEW).form(&form).await;

        assert_ne!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
