//! Round trips through the DAOs beyond the integrity rules: returns, overdue
//! marking, catalogue rows, lookups, and cleanup of a context's test data.

use chrono::Duration;
use lsys_integrity::clock::Clock;
use lsys_integrity::harness::TestContext;
use lsys_integrity::types::BorrowStatus;
use lsys_integrity::{Config, DbError, Reference, Table, ViolationKind, DB};

#[tokio::test]
async fn returning_a_book_gives_the_copy_back() {
	let mut ctx = TestContext::setup().await.unwrap();
	let user = ctx.create_user().await.unwrap();
	let book = ctx.create_book().await.unwrap();
	let borrowing = ctx.create_borrowing(user.user_id, book.book_id).await.unwrap();

	ctx.clock.advance(Duration::days(3));
	let returned = ctx.borrowings.return_book(borrowing.borrowing_id).await.unwrap();

	assert_eq!(returned.status, BorrowStatus::Returned.as_str());
	assert_eq!(returned.return_date, Some(ctx.clock.now()));
	assert!(returned.is_returned());
	let stored = ctx.books.find_by_id(book.book_id).await.unwrap().unwrap();
	assert_eq!(stored.available_copies, book.available_copies);
	ctx.teardown().await;
}

#[tokio::test]
async fn returning_twice_is_rejected() {
	let mut ctx = TestContext::setup().await.unwrap();
	let user = ctx.create_user().await.unwrap();
	let book = ctx.create_book().await.unwrap();
	let borrowing = ctx.create_borrowing(user.user_id, book.book_id).await.unwrap();

	ctx.borrowings.return_book(borrowing.borrowing_id).await.unwrap();
	let err = ctx.borrowings.return_book(borrowing.borrowing_id).await.unwrap_err();

	assert!(matches!(err, DbError::InvalidState(_)), "{err:?}");
	// the second attempt must not hand out a phantom copy
	let stored = ctx.books.find_by_id(book.book_id).await.unwrap().unwrap();
	assert_eq!(stored.available_copies, 3);
	ctx.teardown().await;
}

#[tokio::test]
async fn returning_unknown_borrowing_is_not_found() {
	let ctx = TestContext::setup().await.unwrap();

	let err = ctx.borrowings.return_book(424_242).await.unwrap_err();

	assert!(matches!(err, DbError::NotFound{ table: "borrowings", id: 424_242 }), "{err:?}");
	ctx.teardown().await;
}

#[tokio::test]
async fn overdue_marking_follows_the_clock() {
	let mut ctx = TestContext::setup().await.unwrap();
	let user = ctx.create_user().await.unwrap();
	let book = ctx.create_book().await.unwrap();
	let open = ctx.create_borrowing(user.user_id, book.book_id).await.unwrap();
	let closed = ctx.create_borrowing(user.user_id, book.book_id).await.unwrap();
	ctx.borrowings.return_book(closed.borrowing_id).await.unwrap();

	assert_eq!(ctx.borrowings.mark_overdue().await.unwrap(), 0);

	ctx.clock.advance(Duration::days(15));
	assert_eq!(ctx.borrowings.mark_overdue().await.unwrap(), 1);
	assert_eq!(ctx.borrowings.mark_overdue().await.unwrap(), 0);

	let open = ctx.borrowings.find_by_id(open.borrowing_id).await.unwrap().unwrap();
	let closed = ctx.borrowings.find_by_id(closed.borrowing_id).await.unwrap().unwrap();
	assert_eq!(open.status, "overdue");
	assert_eq!(closed.status, "returned");
	ctx.teardown().await;
}

#[tokio::test]
async fn borrowings_are_listed_per_user_in_order() {
	let mut ctx = TestContext::setup().await.unwrap();
	let reader = ctx.create_user().await.unwrap();
	let other = ctx.create_user().await.unwrap();
	let book = ctx.create_book().await.unwrap();

	let first = ctx.create_borrowing(reader.user_id, book.book_id).await.unwrap();
	ctx.create_borrowing(other.user_id, book.book_id).await.unwrap();
	let second = ctx.create_borrowing(reader.user_id, book.book_id).await.unwrap();

	let ids: Vec<i64> = ctx.borrowings.find_by_user(reader.user_id).await.unwrap()
		.into_iter()
		.map(|b| b.borrowing_id)
		.collect();
	assert_eq!(ids, vec![first.borrowing_id, second.borrowing_id]);
	ctx.teardown().await;
}

#[tokio::test]
async fn lookups_by_natural_key() {
	let mut ctx = TestContext::setup().await.unwrap();
	let user = ctx.create_user().await.unwrap();
	let book = ctx.create_book().await.unwrap();

	assert_eq!(ctx.users.find_by_username(&user.username).await.unwrap(), Some(user.clone()));
	assert_eq!(ctx.books.find_by_isbn(&book.isbn).await.unwrap(), Some(book.clone()));
	assert_eq!(ctx.users.find_by_username("nobody_here").await.unwrap(), None);
	assert_eq!(ctx.books.find_by_isbn("0000000000000").await.unwrap(), None);
	assert_eq!(ctx.users.count().await.unwrap(), 1);
	assert_eq!(ctx.books.count().await.unwrap(), 1);
	ctx.teardown().await;
}

#[tokio::test]
async fn updating_missing_rows_is_not_found() {
	let mut ctx = TestContext::setup().await.unwrap();
	let mut user = ctx.create_user().await.unwrap();
	let mut book = ctx.create_book().await.unwrap();
	user.user_id += 1000;
	book.book_id += 1000;

	let user_err = ctx.users.update(&user).await.unwrap_err();
	let book_err = ctx.books.update(&book).await.unwrap_err();
	let copies_err = ctx.books.update_available_copies(book.book_id, 1).await.unwrap_err();

	assert!(matches!(user_err, DbError::NotFound{ table: "users", .. }), "{user_err:?}");
	assert!(matches!(book_err, DbError::NotFound{ table: "books", .. }), "{book_err:?}");
	assert!(matches!(copies_err, DbError::NotFound{ table: "books", .. }), "{copies_err:?}");
	ctx.teardown().await;
}

#[tokio::test]
async fn book_update_writes_every_column() {
	let mut ctx = TestContext::setup().await.unwrap();
	let mut book = ctx.create_book().await.unwrap();
	let publisher = ctx.references.create(Reference::Publisher, "Balai Pustaka").await.unwrap();

	ctx.clock.advance(Duration::seconds(2));
	book.title = "Judul Baru".to_string();
	book.publisher_id = Some(publisher);
	book.status = "maintenance".to_string();
	book.total_copies = 8;
	let updated = ctx.books.update(&book).await.unwrap();

	assert_eq!(updated.title, "Judul Baru");
	assert_eq!(updated.publisher_id, Some(publisher));
	assert_eq!(updated.status, "maintenance");
	assert_eq!(updated.total_copies, 8);
	assert_eq!(updated.updated_at, ctx.clock.now());
	ctx.teardown().await;
}

#[tokio::test]
async fn book_with_unknown_author_names_the_column() {
	let mut ctx = TestContext::setup().await.unwrap();
	let mut draft = ctx.new_book();
	draft.author_id = Some(9_999);

	let err = ctx.books.create(&draft).await.unwrap_err();
	let v = err.violation().unwrap();

	assert_eq!(v.kind, ViolationKind::ForeignKey);
	assert_eq!(v.table.as_deref(), Some("books"));
	assert_eq!(v.column.as_deref(), Some("author_id"));
	ctx.teardown().await;
}

#[tokio::test]
async fn book_update_to_unknown_category_names_the_column() {
	let mut ctx = TestContext::setup().await.unwrap();
	let mut book = ctx.create_book().await.unwrap();

	book.category_id = Some(77);
	let err = ctx.books.update(&book).await.unwrap_err();

	assert!(err.is_foreign_key(), "{err:?}");
	assert_eq!(err.violation().and_then(|v| v.column.as_deref()), Some("category_id"));
	ctx.teardown().await;
}

#[tokio::test]
async fn catalogue_rows() {
	let ctx = TestContext::setup().await.unwrap();

	for reference in [Reference::Author, Reference::Publisher, Reference::Category] {
		assert!(ctx.references.exists(reference, 1).await.unwrap(), "{reference:?} seed");
		assert!(!ctx.references.exists(reference, 500).await.unwrap());
	}

	let author = ctx.references.create(Reference::Author, "Pramoedya Ananta Toer").await.unwrap();
	assert!(ctx.references.exists(Reference::Author, author).await.unwrap());
	assert_eq!(ctx.db.count(Table::Authors).await.unwrap(), 2);

	let err = ctx.references.create(Reference::Author, "Pramoedya Ananta Toer").await.unwrap_err();
	let v = err.violation().unwrap();
	assert_eq!(v.kind, ViolationKind::Unique);
	assert_eq!(v.table.as_deref(), Some("authors"));
	assert_eq!(v.column.as_deref(), Some("name"));
	ctx.teardown().await;
}

#[tokio::test]
async fn teardown_removes_tracked_rows() {
	let mut ctx = TestContext::setup().await.unwrap();
	let user = ctx.create_user().await.unwrap();
	let book = ctx.create_book().await.unwrap();
	ctx.create_borrowing(user.user_id, book.book_id).await.unwrap();
	assert_eq!(ctx.created().users, vec![user.user_id]);
	assert_eq!(ctx.created().books, vec![book.book_id]);
	assert_eq!(ctx.created().borrowings.len(), 1);

	let report = ctx.teardown().await;

	assert_eq!(report.removed, 3);
	assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn teardown_tolerates_rows_already_gone() {
	let mut ctx = TestContext::setup().await.unwrap();
	let user = ctx.create_user().await.unwrap();
	let book = ctx.create_book().await.unwrap();
	ctx.create_borrowing(user.user_id, book.book_id).await.unwrap();

	// cascade takes the borrowing with it
	assert!(ctx.users.delete(user.user_id).await.unwrap());
	let report = ctx.teardown().await;

	assert_eq!(report.removed, 1);
	assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn teardown_keeps_going_past_a_failed_delete() {
	let mut ctx = TestContext::setup().await.unwrap();
	let user = ctx.create_user().await.unwrap();
	let book = ctx.create_book().await.unwrap();
	// untracked borrowing pins the book
	let draft = ctx.new_borrowing(user.user_id, book.book_id);
	ctx.borrowings.create(&draft).await.unwrap();

	let report = ctx.teardown().await;

	assert_eq!(report.failed, 1);
	assert_eq!(report.removed, 1);
}

#[tokio::test]
async fn file_backed_store_starts_clean_and_ends_clean() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("perpustakaan.db");
	let config = Config::new(format!("sqlite://{}", path.display()));

	let mut ctx = TestContext::with_config(&config).await.unwrap();
	let user = ctx.create_user().await.unwrap();
	let book = ctx.create_book().await.unwrap();
	ctx.create_borrowing(user.user_id, book.book_id).await.unwrap();
	let report = ctx.teardown().await;
	assert_eq!(report.failed, 0);
	assert!(path.exists());

	let db = DB::open(&config).await.unwrap();
	for table in [Table::Users, Table::Books, Table::Borrowings] {
		assert_eq!(db.count(table).await.unwrap(), 0, "{table}");
	}
	// catalogue seed survives the cleanup
	assert_eq!(db.count(Table::Authors).await.unwrap(), 1);
	db.close().await;
}

#[tokio::test]
async fn records_serialize_with_lowercase_enums() {
	let mut ctx = TestContext::setup().await.unwrap();
	let user = ctx.create_user().await.unwrap();

	let json = serde_json::to_value(&user).unwrap();

	assert_eq!(json["role"], "member");
	assert_eq!(json["status"], "active");
	assert_eq!(json["user_id"], user.user_id);
	ctx.teardown().await;
}
