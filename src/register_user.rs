//! The registration page and the route handler for creating accounts.

use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error, PasswordHash,
    app_state::create_cookie_key,
    auth_cookie::{DEFAULT_COOKIE_DURATION, set_auth_cookie},
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, alert_error, base, log_in_register, password_input, text_input},
    internal_server_error::InternalServerError,
    user::{create_user, email_exists, username_exists},
};

/// The minimum password length accepted at registration.
const MIN_PASSWORD_LENGTH: usize = 6;

pub const MISSING_FIELDS_ERROR_MSG: &str = "Please fill in all fields";
pub const PASSWORD_MISMATCH_ERROR_MSG: &str = "Passwords do not match";
pub const PASSWORD_TOO_SHORT_ERROR_MSG: &str = "Password must be at least 6 characters long";

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The key for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// How long auth cookies are valid for.
    pub cookie_duration: Duration,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl RegistrationState {
    /// Create the cookie key from a string and set the default cookie duration.
    pub fn new(cookie_secret: &str, db_connection: Arc<Mutex<Connection>>) -> Self {
        Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            db_connection,
        }
    }
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<RegistrationState> for Key {
    fn from_ref(state: &RegistrationState) -> Self {
        state.cookie_key.clone()
    }
}

/// The raw data entered by the user in the registration form.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

fn register_page(error_message: Option<&str>, username_value: &str, email_value: &str) -> Markup {
    base(
        "Register",
        &log_in_register(
            "Register",
            &html! {
                form method="post" action=(endpoints::REGISTER_VIEW)
                {
                    @if let Some(message) = error_message {
                        (alert_error(message))
                    }

                    (text_input("text", "username", "Username", username_value))
                    (text_input("email", "email", "Email", email_value))
                    (password_input("password", "Password"))
                    (password_input("confirm_password", "Confirm Password"))

                    button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Register" }

                    p
                    {
                        "Already have an account? "
                        a href=(endpoints::LOG_IN_VIEW) { "Log in" }
                    }
                }
            },
        ),
    )
}

/// Display the registration page.
pub async fn get_register_page() -> Response {
    Html(register_page(None, "", "").into_string()).into_response()
}

/// Handler for registration requests via the POST method.
///
/// Validation failures re-render the page with an error message, keeping the
/// submitted username and email but never the passwords. On success the new
/// user is logged in straight away and redirected to the home page.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn post_register(
    State(state): State<RegistrationState>,
    jar: PrivateCookieJar,
    Form(register_form): Form<RegisterForm>,
) -> Response {
    // Usernames and email addresses are stored without surrounding
    // whitespace. Passwords are taken as submitted.
    let register_form = RegisterForm {
        username: register_form.username.trim().to_owned(),
        email: register_form.email.trim().to_owned(),
        ..register_form
    };

    match validate_registration(&register_form, &state) {
        Ok(None) => {}
        Ok(Some(error_message)) => {
            return registration_error_response(&register_form, &error_message);
        }
        Err(error) => {
            tracing::error!("An error occurred while validating a registration: {error}");
            return InternalServerError::default().into_response();
        }
    }

    let password_hash =
        match PasswordHash::from_raw_password(&register_form.password, PasswordHash::DEFAULT_COST) {
            Ok(hash) => hash,
            Err(error) => {
                tracing::error!("An error occurred while hashing a password: {error}");
                return InternalServerError::default().into_response();
            }
        };

    let user = match create_user(
        &register_form.username,
        &register_form.email,
        password_hash,
        &state
            .db_connection
            .lock()
            .expect("Could not acquire lock to database connection"),
    ) {
        Ok(user) => user,
        // Uniqueness is checked above, but a concurrent registration can
        // still trip the database constraint.
        Err(error @ (Error::DuplicateUsername | Error::DuplicateEmail)) => {
            return registration_error_response(&register_form, &error.to_string());
        }
        Err(error) => {
            tracing::error!("An unhandled error occurred while inserting a new user: {error}");
            return InternalServerError::default().into_response();
        }
    };

    match set_auth_cookie(jar, user.id, state.cookie_duration) {
        Ok(updated_jar) => (updated_jar, Redirect::to(endpoints::ROOT)).into_response(),
        Err(error) => {
            tracing::error!("An error occurred while setting the auth cookie: {error}");
            InternalServerError::default().into_response()
        }
    }
}

/// Check a registration form against the validation rules, in order.
///
/// Returns the first failure as a user-facing message, or `None` when the
/// form is valid.
fn validate_registration(
    register_form: &RegisterForm,
    state: &RegistrationState,
) -> Result<Option<String>, Error> {
    if register_form.username.is_empty()
        || register_form.email.is_empty()
        || register_form.password.is_empty()
        || register_form.confirm_password.is_empty()
    {
        return Ok(Some(MISSING_FIELDS_ERROR_MSG.to_owned()));
    }

    if register_form.password != register_form.confirm_password {
        return Ok(Some(PASSWORD_MISMATCH_ERROR_MSG.to_owned()));
    }

    if register_form.password.len() < MIN_PASSWORD_LENGTH {
        return Ok(Some(PASSWORD_TOO_SHORT_ERROR_MSG.to_owned()));
    }

    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire lock to database connection");

    if username_exists(&register_form.username, &connection)? {
        return Ok(Some(Error::DuplicateUsername.to_string()));
    }

    if email_exists(&register_form.email, &connection)? {
        return Ok(Some(Error::DuplicateEmail.to_string()));
    }

    Ok(None)
}

fn registration_error_response(register_form: &RegisterForm, error_message: &str) -> Response {
    (
        StatusCode::OK,
        Html(
            register_page(
                Some(error_message),
                &register_form.username,
                &register_form.email,
            )
            .into_string(),
        ),
    )
        .into_response()
}
