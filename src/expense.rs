//! Expense management for the expense tracking application.
//!
//! This module contains everything related to expenses:
//! - The `Expense` model and `ExpenseBuilder` for creating expenses
//! - Database functions for storing and querying expenses
//! - View handlers for the home page and the expense history page

use std::{
    ops::RangeInclusive,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use maud::{Markup, html};
use rusqlite::{Connection, Row};
use serde::Deserialize;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

use crate::{
    AppState, Error,
    database_id::DatabaseId,
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, TABLE_STYLE, alert_error,
        base,
    },
    navigation::NavBar,
    summary::{Summary, summarize},
    user::UserID,
};

/// The message shown when the amount does not parse as a number.
pub const INVALID_AMOUNT_ERROR_MSG: &str = "Invalid amount";
/// The message shown when the amount parses but is not greater than zero.
pub const NON_POSITIVE_AMOUNT_ERROR_MSG: &str = "Amount must be > 0";
/// The message shown when the date cannot be parsed.
pub const INVALID_DATE_ERROR_MSG: &str = "Invalid date";

/// The category assigned when the submitted category is empty after trimming.
pub const DEFAULT_CATEGORY: &str = "Other";

/// How many expenses the home page shows.
const RECENT_EXPENSES_LIMIT: u64 = 20;

/// How many days the home page summary panel covers.
const HOME_SUMMARY_DAYS: i64 = 30;

// ============================================================================
// MODELS
// ============================================================================

/// A single record of money spent.
///
/// To create a new `Expense`, use [Expense::build].
#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    /// The ID of the expense.
    pub id: DatabaseId,
    /// The amount of money spent, always greater than zero.
    pub amount: f64,
    /// The category the expense belongs to, e.g. "Food".
    pub category: String,
    /// A free-text note describing the expense. May be empty.
    pub note: String,
    /// When the expense happened, in UTC.
    pub created_at: OffsetDateTime,
    /// The ID of the user the expense belongs to.
    pub user_id: UserID,
}

impl Expense {
    /// Create a new expense.
    ///
    /// Shortcut for [ExpenseBuilder] for discoverability.
    pub fn build(amount: f64, user_id: UserID) -> ExpenseBuilder {
        ExpenseBuilder {
            amount,
            user_id,
            category: None,
            note: None,
            created_at: None,
        }
    }
}

/// A builder for creating [Expense] instances.
///
/// Optional fields get sensible defaults: the category becomes
/// [DEFAULT_CATEGORY], the note becomes an empty string and `created_at`
/// becomes the current UTC time.
#[derive(Debug, PartialEq, Clone)]
pub struct ExpenseBuilder {
    /// The amount of money spent.
    pub amount: f64,
    /// The ID of the user the expense belongs to.
    pub user_id: UserID,
    category: Option<String>,
    note: Option<String>,
    created_at: Option<OffsetDateTime>,
}

impl ExpenseBuilder {
    /// Set the category for the expense.
    ///
    /// The category is trimmed. An empty category after trimming falls back
    /// to [DEFAULT_CATEGORY].
    pub fn category(mut self, category: &str) -> Self {
        let category = category.trim();

        self.category = if category.is_empty() {
            None
        } else {
            Some(category.to_owned())
        };

        self
    }

    /// Set the note for the expense.
    pub fn note(mut self, note: &str) -> Self {
        self.note = Some(note.to_owned());
        self
    }

    /// Set when the expense happened.
    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

// ============================================================================
// DATE HANDLING
// ============================================================================

/// The format expense timestamps are stored in, always UTC.
///
/// Plain `YYYY-MM-DD HH:MM:SS` text keeps lexicographic comparison and
/// SQLite's `date()` function consistent with chronological order.
const STORED_DATE_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub(crate) fn format_stored_date_time(
    date_time: OffsetDateTime,
) -> Result<String, time::error::Format> {
    date_time.to_offset(UtcOffset::UTC).format(STORED_DATE_TIME_FORMAT)
}

fn parse_stored_date_time(text: &str) -> Result<OffsetDateTime, time::error::Parse> {
    PrimitiveDateTime::parse(text, STORED_DATE_TIME_FORMAT).map(PrimitiveDateTime::assume_utc)
}

/// Parse a date entered by the user.
///
/// Accepts RFC 3339 (converted to UTC), `2024-01-15 13:30[:00]`,
/// `2024-01-15`, `Jan 15 2024`, `15 Jan 2024` and `01/15/2024`.
/// Date-only input is taken as midnight UTC.
pub(crate) fn parse_expense_date(text: &str) -> Option<OffsetDateTime> {
    if let Ok(date_time) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(date_time.to_offset(UtcOffset::UTC));
    }

    const DATE_TIME_FORMATS: [&[BorrowedFormatItem<'static>]; 2] = [
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
    ];

    for format in DATE_TIME_FORMATS {
        if let Ok(date_time) = PrimitiveDateTime::parse(text, format) {
            return Some(date_time.assume_utc());
        }
    }

    const DATE_FORMATS: [&[BorrowedFormatItem<'static>]; 4] = [
        format_description!("[year]-[month]-[day]"),
        format_description!("[month repr:short case_sensitive:false] [day padding:none] [year]"),
        format_description!("[day padding:none] [month repr:short case_sensitive:false] [year]"),
        format_description!("[month]/[day]/[year]"),
    ];

    for format in DATE_FORMATS {
        if let Ok(date) = Date::parse(text, format) {
            return Some(date.midnight().assume_utc());
        }
    }

    None
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the expense table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                note TEXT NOT NULL,
                created_at TEXT NOT NULL,
                user_id INTEGER NOT NULL REFERENCES user(id)
                )",
        (),
    )?;

    Ok(())
}

/// Create a new expense in the database from a builder.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn create_expense(builder: ExpenseBuilder, connection: &Connection) -> Result<Expense, Error> {
    let created_at = builder.created_at.unwrap_or_else(OffsetDateTime::now_utc);
    let created_at_text = format_stored_date_time(created_at)
        .map_err(|error| Error::InvalidDateFormat(error.to_string(), created_at.to_string()))?;

    let expense = connection
        .prepare(
            "INSERT INTO expense (amount, category, note, created_at, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, amount, category, note, created_at, user_id",
        )?
        .query_row(
            (
                builder.amount,
                builder.category.as_deref().unwrap_or(DEFAULT_CATEGORY),
                builder.note.as_deref().unwrap_or(""),
                created_at_text,
                builder.user_id.as_i64(),
            ),
            map_expense_row,
        )?;

    Ok(expense)
}

/// Retrieve the `limit` most recent expenses belonging to `user_id`.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_recent_expenses(
    user_id: UserID,
    limit: u64,
    connection: &Connection,
) -> Result<Vec<Expense>, Error> {
    let query = format!(
        "SELECT id, amount, category, note, created_at, user_id FROM expense
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT {limit}"
    );

    connection
        .prepare(&query)?
        .query_map([user_id.as_i64()], map_expense_row)?
        .map(|expense_result| expense_result.map_err(Error::SqlError))
        .collect()
}

/// Retrieve all expenses belonging to `user_id`, most recent first.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_all_expenses(user_id: UserID, connection: &Connection) -> Result<Vec<Expense>, Error> {
    connection
        .prepare(
            "SELECT id, amount, category, note, created_at, user_id FROM expense
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?
        .query_map([user_id.as_i64()], map_expense_row)?
        .map(|expense_result| expense_result.map_err(Error::SqlError))
        .collect()
}

/// Retrieve the distinct categories used by `user_id`, sorted by name.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn get_categories(user_id: UserID, connection: &Connection) -> Result<Vec<String>, Error> {
    connection
        .prepare(
            "SELECT DISTINCT category FROM expense
             WHERE user_id = ?1
             ORDER BY category ASC",
        )?
        .query_map([user_id.as_i64()], |row| row.get(0))?
        .map(|category_result| category_result.map_err(Error::SqlError))
        .collect()
}

/// Get the total number of expenses belonging to `user_id`.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn count_expenses(user_id: UserID, connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM expense WHERE user_id = ?1",
            [user_id.as_i64()],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count as usize)
        .map_err(|error| error.into())
}

/// Sum the amounts of `user_id`'s expenses within `date_range` (inclusive),
/// grouped by category and sorted by category name.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn sum_by_category_in_range(
    user_id: UserID,
    date_range: &RangeInclusive<OffsetDateTime>,
    connection: &Connection,
) -> Result<Vec<(String, f64)>, Error> {
    let (start, end) = format_range(date_range)?;

    connection
        .prepare(
            "SELECT category, SUM(amount) FROM expense
             WHERE user_id = ?1 AND created_at BETWEEN ?2 AND ?3
             GROUP BY category
             ORDER BY category ASC",
        )?
        .query_map((user_id.as_i64(), start, end), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .map(|total_result| total_result.map_err(Error::SqlError))
        .collect()
}

/// Sum the amounts of `user_id`'s expenses within `date_range` (inclusive),
/// grouped by calendar day and sorted by day.
///
/// Only days with at least one expense appear in the result.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn sum_by_day_in_range(
    user_id: UserID,
    date_range: &RangeInclusive<OffsetDateTime>,
    connection: &Connection,
) -> Result<Vec<(Date, f64)>, Error> {
    let (start, end) = format_range(date_range)?;

    connection
        .prepare(
            "SELECT date(created_at), SUM(amount) FROM expense
             WHERE user_id = ?1 AND created_at BETWEEN ?2 AND ?3
             GROUP BY date(created_at)
             ORDER BY date(created_at) ASC",
        )?
        .query_map((user_id.as_i64(), start, end), |row| {
            let day_text: String = row.get(0)?;
            let day = Date::parse(&day_text, DATE_FORMAT).map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(error),
                )
            })?;

            Ok((day, row.get(1)?))
        })?
        .map(|total_result| total_result.map_err(Error::SqlError))
        .collect()
}

fn format_range(date_range: &RangeInclusive<OffsetDateTime>) -> Result<(String, String), Error> {
    let start = format_stored_date_time(*date_range.start()).map_err(|error| {
        Error::InvalidDateFormat(error.to_string(), date_range.start().to_string())
    })?;
    let end = format_stored_date_time(*date_range.end())
        .map_err(|error| Error::InvalidDateFormat(error.to_string(), date_range.end().to_string()))?;

    Ok((start, end))
}

/// Map a database row to an Expense.
fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let id = row.get(0)?;
    let amount = row.get(1)?;
    let category = row.get(2)?;
    let note = row.get(3)?;

    let created_at_text: String = row.get(4)?;
    let created_at = parse_stored_date_time(&created_at_text).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(error))
    })?;

    let user_id = UserID::new(row.get(5)?);

    Ok(Expense {
        id,
        amount,
        category,
        note,
        created_at,
        user_id,
    })
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The state needed by the expense route handlers.
#[derive(Debug, Clone)]
pub struct ExpenseState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ExpenseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The form data for creating an expense.
///
/// All fields come in as text so that parse failures can be turned into
/// inline error messages instead of a 422 from the form extractor.
#[derive(Debug, Deserialize)]
pub struct ExpenseForm {
    /// The amount of money spent, in dollars.
    pub amount: String,
    /// The category the expense belongs to.
    pub category: Option<String>,
    /// A free-text note describing the expense.
    pub note: Option<String>,
    /// When the expense happened. Blank means now.
    pub date: Option<String>,
}

/// Render the home page: the add-expense form, the caller's most recent
/// expenses and a summary of the last 30 days.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_index_page(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire lock to database connection");

    render_index_page(user_id, None, &connection)
}

/// A route handler for creating a new expense, redirects to the home page on
/// success.
///
/// Validation failures re-render the home page with an error message and do
/// not persist anything, including the rest of the submitted form.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn post_expense(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    Form(expense_form): Form<ExpenseForm>,
) -> Response {
    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire lock to database connection");

    let amount = match expense_form.amount.trim().parse::<f64>() {
        Ok(amount) => amount,
        Err(_) => return render_index_page(user_id, Some(INVALID_AMOUNT_ERROR_MSG), &connection),
    };

    if !amount.is_finite() || amount <= 0.0 {
        return render_index_page(user_id, Some(NON_POSITIVE_AMOUNT_ERROR_MSG), &connection);
    }

    let date_text = expense_form
        .date
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty());

    let created_at = match date_text {
        Some(text) => match parse_expense_date(text) {
            Some(date_time) => date_time,
            None => return render_index_page(user_id, Some(INVALID_DATE_ERROR_MSG), &connection),
        },
        None => OffsetDateTime::now_utc(),
    };

    let builder = Expense::build(amount, user_id)
        .category(expense_form.category.as_deref().unwrap_or(""))
        .note(expense_form.note.as_deref().unwrap_or("").trim())
        .created_at(created_at);

    match create_expense(builder, &connection) {
        Ok(_) => Redirect::to(endpoints::ROOT).into_response(),
        Err(error) => {
            tracing::error!("An error occurred while creating an expense: {error}");
            error.into_response()
        }
    }
}

/// Render the caller's full expense history, most recent first.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_expenses_page(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire lock to database connection");

    let expenses = match get_all_expenses(user_id, &connection) {
        Ok(expenses) => expenses,
        Err(error) => return error.into_response(),
    };

    let content = html! {
        (NavBar::new(endpoints::EXPENSES_VIEW).into_html())

        main
        {
            h1 { "Expenses" }

            @if expenses.is_empty() {
                p { "No expenses recorded yet." }
            } @else {
                (expense_table(&expenses))
            }
        }
    };

    Html(base("Expenses", &content).into_string()).into_response()
}

// ============================================================================
// VIEWS
// ============================================================================

fn render_index_page(
    user_id: UserID,
    error_message: Option<&str>,
    connection: &Connection,
) -> Response {
    let categories = match get_categories(user_id, connection) {
        Ok(categories) => categories,
        Err(error) => return error.into_response(),
    };

    let recent_expenses = match get_recent_expenses(user_id, RECENT_EXPENSES_LIMIT, connection) {
        Ok(expenses) => expenses,
        Err(error) => return error.into_response(),
    };

    let summary = match summarize(user_id, HOME_SUMMARY_DAYS, connection) {
        Ok(summary) => summary,
        Err(error) => return error.into_response(),
    };

    let content = html! {
        (NavBar::new(endpoints::ROOT).into_html())

        main
        {
            h1 { "Home" }

            @if let Some(message) = error_message {
                (alert_error(message))
            }

            (expense_form(&categories))
            (summary_panel(&summary))

            section
            {
                h2 { "Recent expenses" }

                @if recent_expenses.is_empty() {
                    p { "No expenses recorded yet." }
                } @else {
                    (expense_table(&recent_expenses))
                }
            }
        }
    };

    (StatusCode::OK, Html(base("Home", &content).into_string())).into_response()
}

fn expense_form(categories: &[String]) -> Markup {
    html! {
        form method="post" action=(endpoints::ROOT)
        {
            div
            {
                label for="amount" class=(FORM_LABEL_STYLE) { "Amount" }
                input type="text" name="amount" id="amount" inputmode="decimal"
                    class=(FORM_TEXT_INPUT_STYLE) required;
            }

            div
            {
                label for="category" class=(FORM_LABEL_STYLE) { "Category" }
                input type="text" name="category" id="category" list="categories"
                    class=(FORM_TEXT_INPUT_STYLE);

                datalist id="categories"
                {
                    @for category in categories {
                        option value=(category) {}
                    }
                }
            }

            div
            {
                label for="note" class=(FORM_LABEL_STYLE) { "Note" }
                input type="text" name="note" id="note" class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="date" class=(FORM_LABEL_STYLE) { "Date" }
                input type="text" name="date" id="date" placeholder="2024-01-15"
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Add expense" }
        }
    }
}

fn summary_panel(summary: &Summary) -> Markup {
    html! {
        section class="summary-panel"
        {
            h2 { "Last " (summary.days) " days" }

            p { "Total spent: $" (format_amount(summary.total_spent)) }

            @if !summary.categories.is_empty() {
                table class=(TABLE_STYLE)
                {
                    thead
                    {
                        tr
                        {
                            th { "Category" }
                            th { "Total" }
                        }
                    }

                    tbody
                    {
                        @for category_total in &summary.categories {
                            tr
                            {
                                td { (category_total.category) }
                                td { "$" (format_amount(category_total.total)) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn expense_table(expenses: &[Expense]) -> Markup {
    html! {
        table class=(TABLE_STYLE)
        {
            thead
            {
                tr
                {
                    th { "Date" }
                    th { "Amount" }
                    th { "Category" }
                    th { "Note" }
                }
            }

            tbody
            {
                @for expense in expenses {
                    tr
                    {
                        td { (format_stored_date_time(expense.created_at).unwrap_or_default()) }
                        td { "$" (format_amount(expense.amount)) }
                        td { (expense.category) }
                        td { (expense.note) }
                    }
                }
            }
        }
    }
}

fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}

#[cfg(test)]
mod date_parsing_tests {
    use time::macros::datetime;

    use super::parse_expense_date;

    #[test]
    fn parses_iso_date_as_midnight_utc() {
        assert_eq!(
            parse_expense_date("2024-01-15"),
            Some(datetime!(2024-01-15 00:00 UTC))
        );
    }

    #[test]
    fn parses_date_time() {
        assert_eq!(
            parse_expense_date("2024-01-15 13:30"),
            Some(datetime!(2024-01-15 13:30 UTC))
        );
        assert_eq!(
            parse_expense_date("2024-01-15 13:30:45"),
            Some(datetime!(2024-01-15 13:30:45 UTC))
        );
    }

    #[test]
    fn parses_natural_dates() {
        assert_eq!(
            parse_expense_date("Jan 15 2024"),
            Some(datetime!(2024-01-15 00:00 UTC))
        );
        assert_eq!(
            parse_expense_date("15 Jan 2024"),
            Some(datetime!(2024-01-15 00:00 UTC))
        );
        assert_eq!(
            parse_expense_date("01/15/2024"),
            Some(datetime!(2024-01-15 00:00 UTC))
        );
    }

    #[test]
    fn converts_rfc_3339_offsets_to_utc() {
        assert_eq!(
            parse_expense_date("2024-01-15T12:00:00+02:00"),
            Some(datetime!(2024-01-15 10:00 UTC))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_expense_date("yesterday-ish"), None);
        assert_eq!(parse_expense_date("2024-13-40"), None);
    }
}


#[cfg(test)]
mod expense_handler_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Form,
        body::Body,
        extract::State,
        http::{Response, StatusCode},
    };
    use rusqlite::Connection;

    use crate::{
        endpoints,
        user::{UserID, create_user_table},
    };

    use super::{
        Expense, ExpenseForm, ExpenseState, INVALID_AMOUNT_ERROR_MSG, INVALID_DATE_ERROR_MSG,
        NON_POSITIVE_AMOUNT_ERROR_MSG, count_expenses, create_expense, create_expense_table,
        get_expenses_page, get_index_page, post_expense,
    };

    fn get_test_state() -> ExpenseState {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        create_user_table(&connection).expect("Could not create user table");
        create_expense_table(&connection).expect("Could not create expense table");

        connection
            .execute(
                "INSERT INTO user (id, username, email, password) VALUES (1, 'alice', 'alice@example.com', 'hash')",
                (),
            )
            .expect("Could not create test user");

        ExpenseState {
            db_connection: Arc::new(Mutex::new(connection)),
        }
    }

    fn expense_form(amount: &str) -> ExpenseForm {
        ExpenseForm {
            amount: amount.to_owned(),
            category: None,
            note: None,
            date: None,
        }
    }

    async fn new_post_request(state: ExpenseState, form: ExpenseForm) -> Response<Body> {
        post_expense(State(state), Extension(UserID::new(1)), Form(form)).await
    }

    fn expense_count(state: &ExpenseState) -> usize {
        count_expenses(UserID::new(1), &state.db_connection.lock().unwrap()).unwrap()
    }

    async fn assert_error_message(response: Response<Body>, message: &str) {
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        // Compare the rendered text rather than the raw HTML so that
        // characters such as '>' are matched after entity escaping.
        let document = scraper::Html::parse_document(&String::from_utf8_lossy(&body));
        let alert_selector = scraper::Selector::parse(".alert-error").unwrap();
        let alert_text = document
            .select(&alert_selector)
            .map(|alert| alert.text().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ");

        assert!(
            alert_text.contains(message),
            "alert should contain '{message}' but got '{alert_text}'"
        );
    }

    #[tokio::test]
    async fn valid_expense_is_created_and_redirects_home() {
        let state = get_test_state();
        let form = ExpenseForm {
            amount: "12.50".to_owned(),
            category: Some("Food".to_owned()),
            note: Some("lunch".to_owned()),
            date: Some("2024-01-15".to_owned()),
        };

        let response = new_post_request(state.clone(), form).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            endpoints::ROOT
        );
        assert_eq!(expense_count(&state), 1);
    }

    #[tokio::test]
    async fn non_numeric_amount_is_rejected() {
        let state = get_test_state();

        let response = new_post_request(state.clone(), expense_form("abc")).await;

        assert_error_message(response, INVALID_AMOUNT_ERROR_MSG).await;
        assert_eq!(expense_count(&state), 0);
    }

    #[tokio::test]
    async fn zero_amount_is_rejected() {
        let state = get_test_state();

        let response = new_post_request(state.clone(), expense_form("0")).await;

        assert_error_message(response, NON_POSITIVE_AMOUNT_ERROR_MSG).await;
        assert_eq!(expense_count(&state), 0);
    }

    #[tokio::test]
    async fn negative_amount_is_rejected() {
        let state = get_test_state();

        let response = new_post_request(state.clone(), expense_form("-5")).await;

        assert_error_message(response, NON_POSITIVE_AMOUNT_ERROR_MSG).await;
        assert_eq!(expense_count(&state), 0);
    }

    #[tokio::test]
    async fn unparseable_date_is_rejected() {
        let state = get_test_state();
        let mut form = expense_form("10");
        form.date = Some("not a date".to_owned());

        let response = new_post_request(state.clone(), form).await;

        assert_error_message(response, INVALID_DATE_ERROR_MSG).await;
        assert_eq!(expense_count(&state), 0);
    }

    #[tokio::test]
    async fn missing_category_becomes_other() {
        let state = get_test_state();

        let response = new_post_request(state.clone(), expense_form("10")).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let connection = state.db_connection.lock().unwrap();
        let category: String = connection
            .query_row("SELECT category FROM expense", (), |row| row.get(0))
            .unwrap();
        assert_eq!(category, "Other");
    }

    #[tokio::test]
    async fn index_page_shows_form_categories_and_recent_expenses() {
        let state = get_test_state();
        {
            let connection = state.db_connection.lock().unwrap();
            create_expense(
                Expense::build(12.5, UserID::new(1))
                    .category("Food")
                    .note("lunch"),
                &connection,
            )
            .unwrap();
        }

        let response = get_index_page(State(state), Extension(UserID::new(1))).await;

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let document = scraper::Html::parse_document(&String::from_utf8_lossy(&body));

        let form_selector = scraper::Selector::parse("form").unwrap();
        assert_eq!(document.select(&form_selector).count(), 1);

        let option_selector = scraper::Selector::parse("datalist#categories option").unwrap();
        let options: Vec<_> = document
            .select(&option_selector)
            .filter_map(|option| option.value().attr("value"))
            .collect();
        assert_eq!(options, vec!["Food"]);

        let cell_selector = scraper::Selector::parse("td").unwrap();
        let cells: String = document
            .select(&cell_selector)
            .flat_map(|cell| cell.text())
            .collect();
        assert!(cells.contains("lunch"), "want expense note in {cells}");
    }

    #[tokio::test]
    async fn expenses_page_lists_full_history() {
        let state = get_test_state();
        {
            let connection = state.db_connection.lock().unwrap();
            for amount in [1.0, 2.0, 3.0] {
                create_expense(Expense::build(amount, UserID::new(1)), &connection).unwrap();
            }
        }

        let response = get_expenses_page(State(state), Extension(UserID::new(1))).await;

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let document = scraper::Html::parse_document(&String::from_utf8_lossy(&body));

        let row_selector = scraper::Selector::parse("tbody tr").unwrap();
        assert_eq!(document.select(&row_selector).count(), 3);
    }
}
