//! Thin query wrappers, one per table. Every write surfaces constraint
//! failures as [`DbError::Violation`]; nothing is retried.

mod book;
mod borrowing;
mod reference;
mod user;

pub use book::BookDao;
pub use borrowing::BorrowingDao;
pub use reference::{Reference, ReferenceDao};
pub use user::UserDao;

use sqlx::SqliteConnection;
use tracing::warn;

use crate::error::DbError;
use crate::sql::{row_exists, Table};

// sqlite reports "FOREIGN KEY constraint failed" without saying which key;
// probe each reference and name the first one that points at nothing
pub(crate) async fn name_missing_reference(
	conn: &mut SqliteConnection,
	err: DbError,
	table: &str,
	references: &[(&str, Table, Option<i64>)],
) -> DbError {
	if !err.is_foreign_key() {
		return err;
	}
	for (column, target, id) in references {
		let Some(id) = id else { continue };
		match row_exists(conn, *target, *id).await {
			Ok(false) => return err.foreign_key_on(table, column),
			Ok(true) => {},
			Err(probe) => {
				warn!(%probe, table, column, "could not resolve foreign key column");
				return err;
			},
		}
	}
	err
}
