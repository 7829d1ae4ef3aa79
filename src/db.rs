//! Creates the application's database schema.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{Error, expense::create_expense_table, user::create_user_table};

/// Create the tables for the domain models if they do not exist.
///
/// # Errors
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_expense_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
