//! Per-test context for the integrity suite: a private store, the DAOs wired
//! to one mock clock, a faker, and the ids to delete when the test is done.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::clock::{Clock, MockClock, SharedClock};
use crate::config::Config;
use crate::dao::{BookDao, BorrowingDao, ReferenceDao, UserDao};
use crate::error::DbError;
use crate::fake::Faker;
use crate::sql::DB;
use crate::types::{Bid, Book, Borrowing, BorrowingId, NewBook, NewBorrowing, NewUser, Uid, User};

/// Loan period for every borrowing the context drafts.
pub const DEFAULT_LOAN_DAYS: i64 = 14;

/// Install a subscriber that writes through the test harness. Repeat calls
/// are no-ops.
pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "lsys_integrity=debug".into()),
		)
		.with_test_writer()
		.try_init();
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CreatedIds {
	pub users: Vec<Uid>,
	pub books: Vec<Bid>,
	pub borrowings: Vec<BorrowingId>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
	pub removed: usize,
	/// deletes that errored and were skipped
	pub failed: usize,
}

#[derive(Debug)]
pub struct TestContext {
	pub db: DB,
	pub clock: MockClock,
	pub users: UserDao,
	pub books: BookDao,
	pub borrowings: BorrowingDao,
	pub references: ReferenceDao,
	pub faker: Faker,
	created: CreatedIds,
}

impl TestContext {
	/// Fresh in-memory store with schema and reference rows.
	pub async fn setup() -> Result<Self, DbError> {
		TestContext::with_config(&Config::in_memory()).await
	}

	pub async fn with_config(config: &Config) -> Result<Self, DbError> {
		init_tracing();
		let db = DB::open(config).await?;
		db.schema().await?;
		db.seed_reference_data().await?;

		let clock = MockClock::new(Utc::now());
		let shared: SharedClock = Arc::new(clock.clone());
		info!(url = %config.database_url, "integrity context ready");

		Ok(TestContext{
			users: UserDao::new(db.clone(), shared.clone()),
			books: BookDao::new(db.clone(), shared.clone()),
			borrowings: BorrowingDao::new(db.clone(), shared),
			references: ReferenceDao::new(db.clone()),
			faker: Faker::new(),
			created: CreatedIds::default(),
			clock,
			db,
		})
	}

	pub fn new_user(&mut self) -> NewUser {
		self.faker.user()
	}

	pub fn new_book(&mut self) -> NewBook {
		self.faker.book()
	}

	/// Due one loan period after the clock's now.
	pub fn new_borrowing(&self, user_id: Uid, book_id: Bid) -> NewBorrowing {
		NewBorrowing::new(user_id, book_id, self.clock.now() + Duration::days(DEFAULT_LOAN_DAYS))
	}

	pub async fn create_user(&mut self) -> Result<User, DbError> {
		let draft = self.new_user();
		let user = self.users.create(&draft).await?;
		self.track_user(user.user_id);
		Ok(user)
	}

	pub async fn create_book(&mut self) -> Result<Book, DbError> {
		let draft = self.new_book();
		let book = self.books.create(&draft).await?;
		self.track_book(book.book_id);
		Ok(book)
	}

	pub async fn create_borrowing(&mut self, user_id: Uid, book_id: Bid) -> Result<Borrowing, DbError> {
		let draft = self.new_borrowing(user_id, book_id);
		let borrowing = self.borrowings.create(&draft).await?;
		self.track_borrowing(borrowing.borrowing_id);
		Ok(borrowing)
	}

	pub fn track_user(&mut self, id: Uid) {
		self.created.users.push(id);
	}

	pub fn track_book(&mut self, id: Bid) {
		self.created.books.push(id);
	}

	pub fn track_borrowing(&mut self, id: BorrowingId) {
		self.created.borrowings.push(id);
	}

	pub fn created(&self) -> &CreatedIds {
		&self.created
	}

	/// Delete everything this context created: borrowings first, then books,
	/// then users. A failed delete is logged and skipped so the rest still go.
	pub async fn teardown(self) -> CleanupReport {
		let mut report = CleanupReport::default();

		for id in &self.created.borrowings {
			tally(&mut report, "borrowing", *id, self.borrowings.delete(*id).await);
		}
		for id in &self.created.books {
			tally(&mut report, "book", *id, self.books.delete(*id).await);
		}
		for id in &self.created.users {
			tally(&mut report, "user", *id, self.users.delete(*id).await);
		}

		info!(removed = report.removed, failed = report.failed, "test data cleaned up");
		self.db.close().await;
		report
	}
}

fn tally(report: &mut CleanupReport, what: &str, id: i64, result: Result<bool, DbError>) {
	match result {
		Ok(true) => report.removed += 1,
		Ok(false) => {},
		Err(err) => {
			warn!(%err, what, id, "cleanup delete failed");
			report.failed += 1;
		},
	}
}
