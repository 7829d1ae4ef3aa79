//! Spending summaries: per-category totals and a zero-filled daily series
//! over a trailing window of calendar days.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{
    Duration, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description,
};

use crate::{
    AppState, Error,
    expense::{sum_by_category_in_range, sum_by_day_in_range},
    user::UserID,
};

/// The window size used when the caller does not supply one.
pub const DEFAULT_SUMMARY_DAYS: i64 = 30;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// The total amount spent in one category within the summary window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// The category name.
    pub category: String,
    /// The sum of the matching amounts.
    pub total: f64,
}

/// The total amount spent on one calendar day within the summary window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    /// The calendar day as an ISO 8601 date.
    pub date: String,
    /// The sum of the day's amounts, `0.0` when nothing was spent.
    pub total: f64,
}

/// A summary of one user's spending over a trailing window of days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Per-category totals, sorted by category name. Categories without
    /// matching expenses are absent.
    pub categories: Vec<CategoryTotal>,
    /// Exactly one entry per calendar day in the window, ascending.
    pub daily: Vec<DailyTotal>,
    /// The sum of all matched amounts.
    pub total_spent: f64,
    /// The window size actually used.
    pub days: i64,
}

/// The largest window `summarize` will compute, roughly ten years.
///
/// `days` comes straight from a query parameter. Without a cap, a huge
/// value would push the window start outside the range of dates that
/// [time] can represent.
pub const MAX_SUMMARY_DAYS: i64 = 3650;

/// Summarize `user_id`'s spending over the `days` calendar days ending now
/// (UTC).
///
/// `days` is clamped to `1..=MAX_SUMMARY_DAYS`, and the clamped value is
/// echoed in the result. Every day in the window appears in `daily`,
/// pre-filled with `0.0` before the grouped sums are merged in, so the
/// series always has exactly `days` entries in ascending date order.
///
/// # Errors
/// This function will return an [Error::SqlError] if there is an SQL error.
pub fn summarize(user_id: UserID, days: i64, connection: &Connection) -> Result<Summary, Error> {
    let days = days.clamp(1, MAX_SUMMARY_DAYS);
    let end = OffsetDateTime::now_utc();
    let start = end - Duration::days(days - 1);
    let date_range = start..=end;

    let category_totals = sum_by_category_in_range(user_id, &date_range, connection)?;
    let day_totals = sum_by_day_in_range(user_id, &date_range, connection)?;

    let mut daily = Vec::with_capacity(days as usize);
    for offset in 0..days {
        let day = (start + Duration::days(offset)).date();
        let total = day_totals
            .iter()
            .find(|(grouped_day, _)| *grouped_day == day)
            .map(|(_, total)| *total)
            .unwrap_or(0.0);

        let date = day
            .format(DATE_FORMAT)
            .map_err(|error| Error::InvalidDateFormat(error.to_string(), day.to_string()))?;

        daily.push(DailyTotal { date, total });
    }

    // An empty f64 sum is negative zero, which would serialize as `-0.0`.
    let total_spent: f64 = category_totals.iter().map(|(_, total)| total).sum::<f64>() + 0.0;

    let categories = category_totals
        .into_iter()
        .map(|(category, total)| CategoryTotal { category, total })
        .collect();

    Ok(Summary {
        categories,
        daily,
        total_spent,
        days,
    })
}

/// The state needed by the summary route handler.
#[derive(Debug, Clone)]
pub struct SummaryState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SummaryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query parameters accepted by the summary API.
#[derive(Deserialize)]
pub struct SummaryQuery {
    /// The window size in days. Defaults to [DEFAULT_SUMMARY_DAYS].
    pub days: Option<i64>,
}

/// A route handler returning the caller's spending summary as JSON.
///
/// # Panics
///
/// Panics if the lock for the database connection is already held by the same thread.
pub async fn get_summary(
    State(state): State<SummaryState>,
    Extension(user_id): Extension<UserID>,
    Query(query): Query<SummaryQuery>,
) -> Response {
    let days = query.days.unwrap_or(DEFAULT_SUMMARY_DAYS);

    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire lock to database connection");

    match summarize(user_id, days, &connection) {
        Ok(summary) => Json(summary).into_response(),
        Err(error) => error.into_response(),
    }
}
