use tracing::debug;

use super::name_missing_reference;
use crate::clock::{to_micros, SharedClock};
use crate::error::DbError;
use crate::sql::{Table, DB};
use crate::types::{Bid, BorrowStatus, Borrowing, BorrowingId, BorrowingQuery, NewBorrowing, Uid};

const INSERT_BORROWING: &str = r#"
INSERT INTO borrowings
	(user_id, book_id, borrow_date, due_date, status, notes)
VALUES
	(?, ?, ?, ?, ?, ?)
RETURNING
	borrowing_id, user_id, book_id, borrow_date, due_date, return_date, status, notes
"#;

const SELECT_BORROWING_BY_ID: &str = r#"
SELECT
	borrowing_id, user_id, book_id, borrow_date, due_date, return_date, status, notes
FROM
	borrowings
WHERE
	borrowing_id = ?
"#;

const SELECT_BORROWINGS_BY_USER: &str = r#"
SELECT
	borrowing_id, user_id, book_id, borrow_date, due_date, return_date, status, notes
FROM
	borrowings
WHERE
	user_id = ?
ORDER BY
	borrowing_id
"#;

const MARK_RETURNED: &str = r#"
UPDATE borrowings SET
	status = ?, return_date = ?
WHERE
	borrowing_id = ?
RETURNING
	borrowing_id, user_id, book_id, borrow_date, due_date, return_date, status, notes
"#;

const MARK_OVERDUE: &str = r#"
UPDATE borrowings SET
	status = ?
WHERE
	status = ? AND due_date < ?
"#;

// the CHECK on available_copies turns "no copy left" into a violation
const TAKE_COPY: &str = "UPDATE books SET available_copies = available_copies - 1, updated_at = ? WHERE book_id = ?";
const PUT_BACK_COPY: &str = "UPDATE books SET available_copies = available_copies + 1, updated_at = ? WHERE book_id = ?";

#[derive(Debug, Clone)]
pub struct BorrowingDao {
	db: DB,
	clock: SharedClock,
}

impl BorrowingDao {
	pub fn new(db: DB, clock: SharedClock) -> Self {
		BorrowingDao{ db, clock }
	}

	/// Insert the borrowing and take one copy of the book, in one transaction.
	pub async fn create(&self, borrowing: &NewBorrowing) -> Result<Borrowing, DbError> {
		let now = self.clock.now();
		let borrow_date = borrowing.borrow_date.unwrap_or(now);

		let mut tx = self.db.begin().await?;
		let inserted = sqlx::query_as::<_, BorrowingQuery>(INSERT_BORROWING)
			.bind(borrowing.user_id)
			.bind(borrowing.book_id)
			.bind(to_micros(borrow_date))
			.bind(to_micros(borrowing.due_date))
			.bind(&borrowing.status)
			.bind(&borrowing.notes)
			.fetch_one(&mut *tx)
			.await;

		let row = match inserted {
			Ok(row) => row,
			// dropping tx rolls back
			Err(err) => return Err(name_missing_reference(&mut tx, err.into(), "borrowings", &[
				("user_id", Table::Users, Some(borrowing.user_id)),
				("book_id", Table::Books, Some(borrowing.book_id)),
			]).await),
		};

		sqlx::query(TAKE_COPY)
			.bind(to_micros(now))
			.bind(borrowing.book_id)
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		let borrowing = Borrowing::from_query(row);
		debug!(
			borrowing_id = borrowing.borrowing_id,
			user_id = borrowing.user_id,
			book_id = borrowing.book_id,
			"created borrowing"
		);
		Ok(borrowing)
	}

	pub async fn find_by_id(&self, borrowing_id: BorrowingId) -> Result<Option<Borrowing>, DbError> {
		let row: Option<BorrowingQuery> = sqlx::query_as(SELECT_BORROWING_BY_ID)
			.bind(borrowing_id)
			.fetch_optional(self.db.pool())
			.await?;
		Ok(row.map(Borrowing::from_query))
	}

	pub async fn find_by_user(&self, user_id: Uid) -> Result<Vec<Borrowing>, DbError> {
		let rows: Vec<BorrowingQuery> = sqlx::query_as(SELECT_BORROWINGS_BY_USER)
			.bind(user_id)
			.fetch_all(self.db.pool())
			.await?;
		Ok(rows.into_iter().map(Borrowing::from_query).collect())
	}

	/// Close the borrowing and give its copy back to the book.
	pub async fn return_book(&self, borrowing_id: BorrowingId) -> Result<Borrowing, DbError> {
		let now = to_micros(self.clock.now());
		let mut tx = self.db.begin().await?;

		let current: Option<BorrowingQuery> = sqlx::query_as(SELECT_BORROWING_BY_ID)
			.bind(borrowing_id)
			.fetch_optional(&mut *tx)
			.await?;
		let current = current
			.map(Borrowing::from_query)
			.ok_or(DbError::NotFound{ table: Table::Borrowings.name(), id: borrowing_id })?;
		if current.is_returned() {
			return Err(DbError::InvalidState(format!("borrowing {borrowing_id} was already returned")));
		}

		let row: BorrowingQuery = sqlx::query_as(MARK_RETURNED)
			.bind(BorrowStatus::Returned.as_str())
			.bind(now)
			.bind(borrowing_id)
			.fetch_one(&mut *tx)
			.await?;
		sqlx::query(PUT_BACK_COPY)
			.bind(now)
			.bind(current.book_id)
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		debug!(borrowing_id, book_id = current.book_id, "returned borrowing");
		Ok(Borrowing::from_query(row))
	}

	/// Flag every open borrowing whose due date has passed. Returns how many
	/// rows changed.
	pub async fn mark_overdue(&self) -> Result<u64, DbError> {
		let done = sqlx::query(MARK_OVERDUE)
			.bind(BorrowStatus::Overdue.as_str())
			.bind(BorrowStatus::Borrowed.as_str())
			.bind(to_micros(self.clock.now()))
			.execute(self.db.pool())
			.await?;
		debug!(marked = done.rows_affected(), "marked overdue borrowings");
		Ok(done.rows_affected())
	}

	/// Plain row removal; copies are not given back.
	pub async fn delete(&self, borrowing_id: BorrowingId) -> Result<bool, DbError> {
		let done = sqlx::query("DELETE FROM borrowings WHERE borrowing_id = ?")
			.bind(borrowing_id)
			.execute(self.db.pool())
			.await?;
		debug!(borrowing_id, removed = done.rows_affected(), "deleted borrowing");
		Ok(done.rows_affected() > 0)
	}

	pub async fn count(&self) -> Result<i64, DbError> {
		self.db.count(Table::Borrowings).await
	}

	pub async fn count_for_book(&self, book_id: Bid) -> Result<i64, DbError> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM borrowings WHERE book_id = ?")
			.bind(book_id)
			.fetch_one(self.db.pool())
			.await?;
		Ok(count)
	}
}
