//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{Error, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The name the user logs in with. Unique and case-sensitive.
    pub username: String,
    /// The user's email address. Unique.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns [Error::DuplicateUsername] or [Error::DuplicateEmail] if the
/// username or email already belongs to an account, or [Error::SqlError] if
/// some other SQL related error occurred.
pub fn create_user(
    username: &str,
    email: &str,
    password_hash: PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (username, email, password) VALUES (?1, ?2, ?3)",
        (username, email, password_hash.as_ref()),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        username: username.to_owned(),
        email: email.to_owned(),
        password_hash,
    })
}

/// Get the user from the database with a username equal to `username`.
///
/// The lookup is case-sensitive.
///
/// # Errors
///
/// This function will return an error if:
/// - `username` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_username(username: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, username, email, password FROM user WHERE username = :username",
        )?
        .query_row(&[(":username", username)], |row| {
            Ok(User {
                id: UserID::new(row.get(0)?),
                username: row.get(1)?,
                email: row.get(2)?,
                password_hash: PasswordHash::new_unchecked(&row.get::<_, String>(3)?),
            })
        })
        .map_err(|error| error.into())
}

/// Check whether a user with the given username exists.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn username_exists(username: &str, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM user WHERE username = :username)",
            &[(":username", username)],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Check whether a user with the given email address exists.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn email_exists(email: &str, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM user WHERE email = :email)",
            &[(":email", email)],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|count| count as usize)
        .map_err(|error| error.into())
}
