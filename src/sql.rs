use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, SqliteConnection, Transaction};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::DbError;

/*
DROP TABLE IF EXISTS borrowings;
DROP TABLE IF EXISTS books;
DROP TABLE IF EXISTS users;
DROP TABLE IF EXISTS categories;
DROP TABLE IF EXISTS publishers;
DROP TABLE IF EXISTS authors;
*/

// timestamps are INTEGER microseconds since the epoch; the store's own "now"
// is CAST((julianday('now') - 2440587.5) * 86400000000 AS INTEGER)
pub const TABLE_SCHEMA: &str = r#"

CREATE TABLE IF NOT EXISTS authors (
	author_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS publishers (
	publisher_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS categories (
	category_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS users (
	user_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	username TEXT NOT NULL,
	email TEXT NOT NULL,
	full_name TEXT,
	phone TEXT,
	role TEXT NOT NULL DEFAULT 'member',
	status TEXT NOT NULL DEFAULT 'active',
	created_at INTEGER NOT NULL DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000000 AS INTEGER)),
	updated_at INTEGER NOT NULL DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000000 AS INTEGER)),
	CONSTRAINT uq_users_username UNIQUE (username),
	CONSTRAINT uq_users_email UNIQUE (email),
	CONSTRAINT chk_users_role CHECK (role IN ('member', 'librarian', 'admin')),
	CONSTRAINT chk_users_status CHECK (status IN ('active', 'inactive', 'suspended'))
);

CREATE TABLE IF NOT EXISTS books (
	book_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	isbn TEXT NOT NULL,
	title TEXT NOT NULL,
	author_id INTEGER REFERENCES authors(author_id),
	publisher_id INTEGER REFERENCES publishers(publisher_id),
	category_id INTEGER REFERENCES categories(category_id),
	publication_year INTEGER,
	pages INTEGER,
	language TEXT,
	description TEXT,
	total_copies INTEGER NOT NULL DEFAULT 1,
	available_copies INTEGER NOT NULL DEFAULT 1,
	price_cents INTEGER,
	location TEXT,
	status TEXT NOT NULL DEFAULT 'available',
	created_at INTEGER NOT NULL DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000000 AS INTEGER)),
	updated_at INTEGER NOT NULL DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000000 AS INTEGER)),
	CONSTRAINT uq_books_isbn UNIQUE (isbn),
	CONSTRAINT chk_books_total_copies CHECK (total_copies >= 0),
	CONSTRAINT chk_books_available_copies CHECK (available_copies >= 0 AND available_copies <= total_copies),
	CONSTRAINT chk_books_publication_year CHECK (publication_year IS NULL OR publication_year >= 1450),
	CONSTRAINT chk_books_pages CHECK (pages IS NULL OR pages > 0),
	CONSTRAINT chk_books_price_cents CHECK (price_cents IS NULL OR price_cents >= 0),
	CONSTRAINT chk_books_status CHECK (status IN ('available', 'borrowed', 'unavailable', 'maintenance', 'lost'))
);

CREATE TABLE IF NOT EXISTS borrowings (
	borrowing_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
	book_id INTEGER NOT NULL REFERENCES books(book_id) ON DELETE RESTRICT,
	borrow_date INTEGER NOT NULL DEFAULT (CAST((julianday('now') - 2440587.5) * 86400000000 AS INTEGER)),
	due_date INTEGER NOT NULL,
	return_date INTEGER,
	status TEXT NOT NULL DEFAULT 'borrowed',
	notes TEXT,
	CONSTRAINT chk_borrowings_due_date CHECK (due_date > borrow_date),
	CONSTRAINT chk_borrowings_return_date CHECK (return_date IS NULL OR return_date >= borrow_date),
	CONSTRAINT chk_borrowings_status CHECK (status IN ('borrowed', 'returned', 'overdue'))
);

CREATE INDEX IF NOT EXISTS idx_borrowings_user ON borrowings(user_id);
CREATE INDEX IF NOT EXISTS idx_borrowings_book ON borrowings(book_id);

-- sqlite refuses 'now' inside CHECK, so the upper bound lives in triggers
CREATE TRIGGER IF NOT EXISTS trg_books_publication_year_insert
BEFORE INSERT ON books
FOR EACH ROW WHEN NEW.publication_year > CAST(strftime('%Y', 'now') AS INTEGER)
BEGIN
	SELECT RAISE(ABORT, 'CHECK constraint failed: chk_books_publication_year');
END;

CREATE TRIGGER IF NOT EXISTS trg_books_publication_year_update
BEFORE UPDATE OF publication_year ON books
FOR EACH ROW WHEN NEW.publication_year > CAST(strftime('%Y', 'now') AS INTEGER)
BEGIN
	SELECT RAISE(ABORT, 'CHECK constraint failed: chk_books_publication_year');
END;

-- an update that did not move updated_at forward gets bumped past the old value
CREATE TRIGGER IF NOT EXISTS trg_users_updated_at
AFTER UPDATE ON users
FOR EACH ROW WHEN NEW.updated_at <= OLD.updated_at
BEGIN
	UPDATE users
	SET updated_at = MAX(OLD.updated_at + 1, CAST((julianday('now') - 2440587.5) * 86400000000 AS INTEGER))
	WHERE user_id = NEW.user_id;
END;

CREATE TRIGGER IF NOT EXISTS trg_books_updated_at
AFTER UPDATE ON books
FOR EACH ROW WHEN NEW.updated_at <= OLD.updated_at
BEGIN
	UPDATE books
	SET updated_at = MAX(OLD.updated_at + 1, CAST((julianday('now') - 2440587.5) * 86400000000 AS INTEGER))
	WHERE book_id = NEW.book_id;
END;

"#;

pub const SEED_REFERENCE_DATA: &str = r#"
INSERT OR IGNORE INTO authors (author_id, name) VALUES (1, 'Anonim');
INSERT OR IGNORE INTO publishers (publisher_id, name) VALUES (1, 'Penerbit Umum');
INSERT OR IGNORE INTO categories (category_id, name) VALUES (1, 'Umum');
"#;

/// Named CHECK constraints: (constraint, table, column).
pub const CHECK_CONSTRAINTS: &[(&str, &str, &str)] = &[
	("chk_users_role", "users", "role"),
	("chk_users_status", "users", "status"),
	("chk_books_total_copies", "books", "total_copies"),
	("chk_books_available_copies", "books", "available_copies"),
	("chk_books_publication_year", "books", "publication_year"),
	("chk_books_pages", "books", "pages"),
	("chk_books_price_cents", "books", "price_cents"),
	("chk_books_status", "books", "status"),
	("chk_borrowings_due_date", "borrowings", "due_date"),
	("chk_borrowings_return_date", "borrowings", "return_date"),
	("chk_borrowings_status", "borrowings", "status"),
];

pub const MIN_PUBLICATION_YEAR: i32 = 1450;

pub fn check_target(constraint: &str) -> Option<(&'static str, &'static str)> {
	CHECK_CONSTRAINTS.iter()
		.find(|(name, _, _)| *name == constraint)
		.map(|(_, table, column)| (*table, *column))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
	Users,
	Books,
	Borrowings,
	Authors,
	Publishers,
	Categories,
}

impl Table {
	pub fn name(self) -> &'static str {
		match self {
			Table::Users => "users",
			Table::Books => "books",
			Table::Borrowings => "borrowings",
			Table::Authors => "authors",
			Table::Publishers => "publishers",
			Table::Categories => "categories",
		}
	}

	pub fn key(self) -> &'static str {
		match self {
			Table::Users => "user_id",
			Table::Books => "book_id",
			Table::Borrowings => "borrowing_id",
			Table::Authors => "author_id",
			Table::Publishers => "publisher_id",
			Table::Categories => "category_id",
		}
	}
}

impl std::fmt::Display for Table {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

#[derive(Debug, Clone)]
pub struct DB {
	pool: SqlitePool,
}

impl DB {
	pub async fn open(config: &Config) -> Result<DB, DbError> {
		let options = SqliteConnectOptions::from_str(&config.database_url)?
			.foreign_keys(true)
			.create_if_missing(true);

		let mut pool = SqlitePoolOptions::new()
			.max_connections(config.max_connections)
			.acquire_timeout(config.acquire_timeout);
		if config.is_in_memory() {
			// the database dies with its last connection
			pool = pool.min_connections(1)
				.idle_timeout(None)
				.max_lifetime(None);
		}

		let pool = pool.connect_with(options).await?;
		debug!(url = %config.database_url, max_connections = config.max_connections, "opened store");
		Ok(DB{ pool })
	}

	pub async fn open_in_memory() -> Result<DB, DbError> {
		DB::open(&Config::in_memory()).await
	}

	/// Create tables, indexes and triggers. Safe to run twice.
	pub async fn schema(&self) -> Result<(), DbError> {
		self.pool.execute(TABLE_SCHEMA).await?;
		info!("schema applied");
		Ok(())
	}

	/// Id 1 in every catalogue table, which fake books point at.
	pub async fn seed_reference_data(&self) -> Result<(), DbError> {
		self.pool.execute(SEED_REFERENCE_DATA).await?;
		info!("reference data seeded");
		Ok(())
	}

	/// Run a statement outside the data-access layer. Constraint failures are
	/// classified the same way DAO errors are. On Ok returns rows changed.
	pub async fn execute_raw(&self, command: &str) -> Result<u64, DbError> {
		debug!(command, "raw statement");
		let done = self.pool.execute(command).await?;
		Ok(done.rows_affected())
	}

	pub async fn count(&self, table: Table) -> Result<i64, DbError> {
		let sql = format!("SELECT COUNT(*) FROM {}", table.name());
		let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
		Ok(count)
	}

	pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, DbError> {
		Ok(self.pool.begin().await?)
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	pub async fn close(self) {
		self.pool.close().await;
	}
}

pub(crate) async fn row_exists(conn: &mut SqliteConnection, table: Table, id: i64) -> Result<bool, DbError> {
	let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?)", table.name(), table.key());
	let (exists,): (i64,) = sqlx::query_as(&sql)
		.bind(id)
		.fetch_one(conn)
		.await?;
	Ok(exists != 0)
}
