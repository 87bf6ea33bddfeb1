use tracing::debug;

use super::name_missing_reference;
use crate::clock::{to_micros, SharedClock};
use crate::error::{DbError, ViolationKind};
use crate::sql::{Table, DB};
use crate::types::{Bid, Book, BookQuery, NewBook};

const INSERT_BOOK: &str = r#"
INSERT INTO books
	(isbn, title, author_id, publisher_id, category_id, publication_year, pages, language,
	description, total_copies, available_copies, price_cents, location, status, created_at, updated_at)
VALUES
	(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
RETURNING
	book_id, isbn, title, author_id, publisher_id, category_id, publication_year, pages, language,
	description, total_copies, available_copies, price_cents, location, status, created_at, updated_at
"#;

const SELECT_BOOK_BY_ID: &str = r#"
SELECT
	book_id, isbn, title, author_id, publisher_id, category_id, publication_year, pages, language,
	description, total_copies, available_copies, price_cents, location, status, created_at, updated_at
FROM
	books
WHERE
	book_id = ?
"#;

const SELECT_BOOK_BY_ISBN: &str = r#"
SELECT
	book_id, isbn, title, author_id, publisher_id, category_id, publication_year, pages, language,
	description, total_copies, available_copies, price_cents, location, status, created_at, updated_at
FROM
	books
WHERE
	isbn = ?
"#;

const UPDATE_BOOK: &str = r#"
UPDATE books SET
	isbn = ?, title = ?, author_id = ?, publisher_id = ?, category_id = ?, publication_year = ?,
	pages = ?, language = ?, description = ?, total_copies = ?, available_copies = ?,
	price_cents = ?, location = ?, status = ?, updated_at = ?
WHERE
	book_id = ?
"#;

const UPDATE_AVAILABLE_COPIES: &str = r#"
UPDATE books SET
	available_copies = ?, updated_at = ?
WHERE
	book_id = ?
"#;

#[derive(Debug, Clone)]
pub struct BookDao {
	db: DB,
	clock: SharedClock,
}

impl BookDao {
	pub fn new(db: DB, clock: SharedClock) -> Self {
		BookDao{ db, clock }
	}

	pub async fn create(&self, book: &NewBook) -> Result<Book, DbError> {
		let now = to_micros(self.clock.now());
		let mut conn = self.db.pool().acquire().await?;
		let inserted = sqlx::query_as::<_, BookQuery>(INSERT_BOOK)
			.bind(&book.isbn)
			.bind(&book.title)
			.bind(book.author_id)
			.bind(book.publisher_id)
			.bind(book.category_id)
			.bind(book.publication_year)
			.bind(book.pages)
			.bind(&book.language)
			.bind(&book.description)
			.bind(book.total_copies)
			.bind(book.available_copies)
			.bind(book.price_cents)
			.bind(&book.location)
			.bind(&book.status)
			.bind(now)
			.bind(now)
			.fetch_one(&mut *conn)
			.await;

		match inserted {
			Ok(row) => {
				let book = Book::from_query(row);
				debug!(book_id = book.book_id, isbn = %book.isbn, "created book");
				Ok(book)
			},
			Err(err) => Err(name_missing_reference(&mut conn, err.into(), "books", &[
				("author_id", Table::Authors, book.author_id),
				("publisher_id", Table::Publishers, book.publisher_id),
				("category_id", Table::Categories, book.category_id),
			]).await),
		}
	}

	pub async fn find_by_id(&self, book_id: Bid) -> Result<Option<Book>, DbError> {
		let row: Option<BookQuery> = sqlx::query_as(SELECT_BOOK_BY_ID)
			.bind(book_id)
			.fetch_optional(self.db.pool())
			.await?;
		Ok(row.map(Book::from_query))
	}

	pub async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, DbError> {
		let row: Option<BookQuery> = sqlx::query_as(SELECT_BOOK_BY_ISBN)
			.bind(isbn)
			.fetch_optional(self.db.pool())
			.await?;
		Ok(row.map(Book::from_query))
	}

	pub async fn update(&self, book: &Book) -> Result<Book, DbError> {
		let mut conn = self.db.pool().acquire().await?;
		let done = sqlx::query(UPDATE_BOOK)
			.bind(&book.isbn)
			.bind(&book.title)
			.bind(book.author_id)
			.bind(book.publisher_id)
			.bind(book.category_id)
			.bind(book.publication_year)
			.bind(book.pages)
			.bind(&book.language)
			.bind(&book.description)
			.bind(book.total_copies)
			.bind(book.available_copies)
			.bind(book.price_cents)
			.bind(&book.location)
			.bind(&book.status)
			.bind(to_micros(self.clock.now()))
			.bind(book.book_id)
			.execute(&mut *conn)
			.await;

		let done = match done {
			Ok(done) => done,
			Err(err) => return Err(name_missing_reference(&mut conn, err.into(), "books", &[
				("author_id", Table::Authors, book.author_id),
				("publisher_id", Table::Publishers, book.publisher_id),
				("category_id", Table::Categories, book.category_id),
			]).await),
		};
		drop(conn);

		self.reread(book.book_id, done.rows_affected()).await
	}

	pub async fn update_available_copies(&self, book_id: Bid, available: i64) -> Result<Book, DbError> {
		let done = sqlx::query(UPDATE_AVAILABLE_COPIES)
			.bind(available)
			.bind(to_micros(self.clock.now()))
			.bind(book_id)
			.execute(self.db.pool())
			.await?;
		self.reread(book_id, done.rows_affected()).await
	}

	/// Rejected with a foreign-key violation while any borrowing points at
	/// the book (ON DELETE RESTRICT).
	pub async fn delete(&self, book_id: Bid) -> Result<bool, DbError> {
		let done = sqlx::query("DELETE FROM books WHERE book_id = ?")
			.bind(book_id)
			.execute(self.db.pool())
			.await
			.map_err(|err| match DbError::from(err) {
				DbError::Violation(v) if v.kind == ViolationKind::ForeignKey => {
					DbError::Violation(v.on("borrowings", "book_id").with_constraint("restrict"))
				},
				other => other,
			})?;
		debug!(book_id, removed = done.rows_affected(), "deleted book");
		Ok(done.rows_affected() > 0)
	}

	pub async fn count(&self) -> Result<i64, DbError> {
		self.db.count(Table::Books).await
	}

	// updates go through the audit trigger, so always hand back the stored row
	async fn reread(&self, book_id: Bid, rows_affected: u64) -> Result<Book, DbError> {
		let not_found = DbError::NotFound{ table: Table::Books.name(), id: book_id };
		if rows_affected == 0 {
			return Err(not_found);
		}
		debug!(book_id, "updated book");
		self.find_by_id(book_id).await?.ok_or(not_found)
	}
}
