use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::clock::from_micros;

pub type Uid = i64;
pub type Bid = i64;
pub type BorrowingId = i64;
pub type RefId = i64;

// enumerations mirrored by the CHECK constraints in sql::TABLE_SCHEMA
macro_rules! column_enum {
	($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(rename_all = "lowercase")]
		pub enum $name { $($variant),+ }

		impl $name {
			pub const ALL: &'static [$name] = &[$($name::$variant),+];

			pub fn as_str(self) -> &'static str {
				match self {
					$($name::$variant => $text),+
				}
			}
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
				f.write_str(self.as_str())
			}
		}

		impl std::str::FromStr for $name {
			type Err = UnknownValue;
			fn from_str(s: &str) -> Result<Self, Self::Err> {
				match s {
					$($text => Ok($name::$variant),)+
					_ => Err(UnknownValue{ kind: stringify!($name), value: s.to_string() }),
				}
			}
		}

		impl From<$name> for String {
			fn from(value: $name) -> String {
				value.as_str().to_string()
			}
		}
	};
}

column_enum!(UserRole {
	Member => "member",
	Librarian => "librarian",
	Admin => "admin",
});

column_enum!(UserStatus {
	Active => "active",
	Inactive => "inactive",
	Suspended => "suspended",
});

column_enum!(BookStatus {
	Available => "available",
	Borrowed => "borrowed",
	Unavailable => "unavailable",
	Maintenance => "maintenance",
	Lost => "lost",
});

column_enum!(BorrowStatus {
	Borrowed => "borrowed",
	Returned => "returned",
	Overdue => "overdue",
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownValue {
	pub kind: &'static str,
	pub value: String,
}

// role and status travel as plain text so values outside the enumerations
// can still be submitted and rejected by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub user_id: Uid,
	pub username: String,
	pub email: String,
	pub full_name: Option<String>,
	pub phone: Option<String>,
	pub role: String,
	pub status: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserQuery {
	pub user_id: Uid,
	pub username: String,
	pub email: String,
	pub full_name: Option<String>,
	pub phone: Option<String>,
	pub role: String,
	pub status: String,
	pub created_at: i64,
	pub updated_at: i64,
}

impl User {
	pub fn from_query(info: UserQuery) -> Self {
		User{
			user_id: info.user_id,
			username: info.username,
			email: info.email,
			full_name: info.full_name,
			phone: info.phone,
			role: info.role,
			status: info.status,
			created_at: from_micros(info.created_at),
			updated_at: from_micros(info.updated_at),
		}
	}
}

/// A user row as submitted for insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
	pub username: Option<String>,
	pub email: Option<String>,
	pub full_name: Option<String>,
	pub phone: Option<String>,
	pub role: String,
	pub status: String,
}

impl NewUser {
	pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
		NewUser{
			username: Some(username.into()),
			email: Some(email.into()),
			full_name: None,
			phone: None,
			role: UserRole::Member.into(),
			status: UserStatus::Active.into(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
	pub book_id: Bid,
	pub isbn: String,
	pub title: String,
	pub author_id: Option<RefId>,
	pub publisher_id: Option<RefId>,
	pub category_id: Option<RefId>,
	pub publication_year: Option<i32>,
	pub pages: Option<i32>,
	pub language: Option<String>,
	pub description: Option<String>,
	pub total_copies: i64,
	pub available_copies: i64,
	/// minor currency units
	pub price_cents: Option<i64>,
	pub location: Option<String>,
	pub status: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct BookQuery {
	pub book_id: Bid,
	pub isbn: String,
	pub title: String,
	pub author_id: Option<RefId>,
	pub publisher_id: Option<RefId>,
	pub category_id: Option<RefId>,
	pub publication_year: Option<i32>,
	pub pages: Option<i32>,
	pub language: Option<String>,
	pub description: Option<String>,
	pub total_copies: i64,
	pub available_copies: i64,
	pub price_cents: Option<i64>,
	pub location: Option<String>,
	pub status: String,
	pub created_at: i64,
	pub updated_at: i64,
}

impl Book {
	pub fn from_query(info: BookQuery) -> Self {
		Book{
			book_id: info.book_id,
			isbn: info.isbn,
			title: info.title,
			author_id: info.author_id,
			publisher_id: info.publisher_id,
			category_id: info.category_id,
			publication_year: info.publication_year,
			pages: info.pages,
			language: info.language,
			description: info.description,
			total_copies: info.total_copies,
			available_copies: info.available_copies,
			price_cents: info.price_cents,
			location: info.location,
			status: info.status,
			created_at: from_micros(info.created_at),
			updated_at: from_micros(info.updated_at),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
	pub isbn: Option<String>,
	pub title: Option<String>,
	pub author_id: Option<RefId>,
	pub publisher_id: Option<RefId>,
	pub category_id: Option<RefId>,
	pub publication_year: Option<i32>,
	pub pages: Option<i32>,
	pub language: Option<String>,
	pub description: Option<String>,
	pub total_copies: i64,
	pub available_copies: i64,
	pub price_cents: Option<i64>,
	pub location: Option<String>,
	pub status: String,
}

impl NewBook {
	/// A single available copy, no catalogue references.
	pub fn new(isbn: impl Into<String>, title: impl Into<String>) -> Self {
		NewBook{
			isbn: Some(isbn.into()),
			title: Some(title.into()),
			author_id: None,
			publisher_id: None,
			category_id: None,
			publication_year: None,
			pages: None,
			language: None,
			description: None,
			total_copies: 1,
			available_copies: 1,
			price_cents: None,
			location: None,
			status: BookStatus::Available.into(),
		}
	}

	pub fn with_copies(mut self, total: i64, available: i64) -> Self {
		self.total_copies = total;
		self.available_copies = available;
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Borrowing {
	pub borrowing_id: BorrowingId,
	pub user_id: Uid,
	pub book_id: Bid,
	pub borrow_date: DateTime<Utc>,
	pub due_date: DateTime<Utc>,
	pub return_date: Option<DateTime<Utc>>,
	pub status: String,
	pub notes: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct BorrowingQuery {
	pub borrowing_id: BorrowingId,
	pub user_id: Uid,
	pub book_id: Bid,
	pub borrow_date: i64,
	pub due_date: i64,
	pub return_date: Option<i64>,
	pub status: String,
	pub notes: Option<String>,
}

impl Borrowing {
	pub fn from_query(info: BorrowingQuery) -> Self {
		Borrowing{
			borrowing_id: info.borrowing_id,
			user_id: info.user_id,
			book_id: info.book_id,
			borrow_date: from_micros(info.borrow_date),
			due_date: from_micros(info.due_date),
			return_date: info.return_date.map(from_micros),
			status: info.status,
			notes: info.notes,
		}
	}

	pub fn is_returned(&self) -> bool {
		self.status == BorrowStatus::Returned.as_str()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBorrowing {
	pub user_id: Uid,
	pub book_id: Bid,
	/// defaults to the DAO clock's now
	pub borrow_date: Option<DateTime<Utc>>,
	pub due_date: DateTime<Utc>,
	pub status: String,
	pub notes: Option<String>,
}

impl NewBorrowing {
	pub fn new(user_id: Uid, book_id: Bid, due_date: DateTime<Utc>) -> Self {
		NewBorrowing{
			user_id,
			book_id,
			borrow_date: None,
			due_date,
			status: BorrowStatus::Borrowed.into(),
			notes: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	#[test]
	fn superadmin_is_not_a_role() {
		let err = UserRole::from_str("superadmin").unwrap_err();
		assert_eq!(err.kind, "UserRole");
		assert_eq!(err.to_string(), "'superadmin' is not a valid UserRole");
	}

	#[test]
	fn enums_parse_their_own_text() {
		for status in BookStatus::ALL {
			assert_eq!(BookStatus::from_str(status.as_str()), Ok(*status));
		}
		assert_eq!(BorrowStatus::from_str("overdue"), Ok(BorrowStatus::Overdue));
	}

	#[test]
	fn enums_serialize_as_stored_text() {
		assert_eq!(serde_json::to_string(&UserRole::Librarian).unwrap(), "\"librarian\"");
		assert_eq!(serde_json::to_string(&BookStatus::Maintenance).unwrap(), "\"maintenance\"");
	}

	#[test]
	fn drafts_start_with_defaults() {
		let user = NewUser::new("budi", "budi@example.id");
		assert_eq!(user.role, "member");
		assert_eq!(user.status, "active");

		let book = NewBook::new("9786020000001", "Laskar Pelangi").with_copies(5, 3);
		assert_eq!((book.total_copies, book.available_copies), (5, 3));
		assert_eq!(book.status, "available");
	}
}
