//! The API endpoint URIs.

/// The home page: an add-expense form plus the most recent expenses.
/// POST requests to this route create a new expense.
pub const ROOT: &str = "/";
/// The page listing the user's full expense history.
pub const EXPENSES_VIEW: &str = "/expenses";
/// The route for getting the log in page and posting credentials.
pub const LOG_IN_VIEW: &str = "/login";
/// The route for getting the registration page and posting a new account.
pub const REGISTER_VIEW: &str = "/register";
/// The route for logging out the current user.
pub const LOG_OUT: &str = "/logout";
/// The route for static files.
pub const STATIC: &str = "/static";

/// The route returning category and daily spending totals as JSON.
pub const SUMMARY_API: &str = "/api/summary";
