use serde::Serialize;
use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::sql;

/// Rule family a rejected write broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViolationKind {
	ForeignKey,
	Check,
	Unique,
	NotNull,
}

impl ViolationKind {
	pub fn tag(self) -> &'static str {
		match self {
			ViolationKind::ForeignKey => "foreign-key",
			ViolationKind::Check => "check",
			ViolationKind::Unique => "unique",
			ViolationKind::NotNull => "not-null",
		}
	}
}

impl std::fmt::Display for ViolationKind {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(self.tag())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
	pub kind: ViolationKind,
	pub table: Option<String>,
	pub column: Option<String>,
	pub constraint: Option<String>,
	/// the store's own wording
	pub message: String,
}

impl Violation {
	/// Classify a store message. `None` when it is not a constraint failure.
	pub fn from_message(kind: Option<ViolationKind>, message: &str) -> Option<Violation> {
		let (prefix_kind, detail) = split_message(message);
		let kind = kind.or(prefix_kind)?;
		let mut violation = Violation{
			kind,
			table: None,
			column: None,
			constraint: None,
			message: message.to_string(),
		};

		match kind {
			// "UNIQUE constraint failed: users.username" (first column of composite keys)
			ViolationKind::Unique | ViolationKind::NotNull => {
				if let Some(first) = detail.and_then(|d| d.split(',').next()) {
					if let Some((table, column)) = first.trim().split_once('.') {
						violation.table = Some(table.to_string());
						violation.column = Some(column.to_string());
					}
				}
			},
			// "CHECK constraint failed: chk_books_available_copies"
			ViolationKind::Check => {
				if let Some(name) = detail.map(str::trim) {
					if let Some((table, column)) = sql::check_target(name) {
						violation.table = Some(table.to_string());
						violation.column = Some(column.to_string());
					}
					violation.constraint = Some(name.to_string());
				}
			},
			// sqlite never says which key failed; DAOs fill it in
			ViolationKind::ForeignKey => {},
		}
		Some(violation)
	}

	pub fn on(mut self, table: &str, column: &str) -> Self {
		self.table = Some(table.to_string());
		self.column = Some(column.to_string());
		self
	}

	pub fn with_constraint(mut self, constraint: &str) -> Self {
		self.constraint = Some(constraint.to_string());
		self
	}

	/// Case-insensitive substring match over the rendered violation.
	pub fn mentions(&self, needle: &str) -> bool {
		self.to_string().to_lowercase().contains(&needle.to_lowercase())
	}
}

impl std::fmt::Display for Violation {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{} violation", self.kind)?;
		match (&self.table, &self.column) {
			(Some(table), Some(column)) => write!(f, " on {table}.{column}")?,
			(Some(table), None) => write!(f, " on {table}")?,
			_ => {},
		}
		if let Some(constraint) = &self.constraint {
			write!(f, " [{constraint}]")?;
		}
		write!(f, ": {}", self.message)
	}
}

fn split_message(message: &str) -> (Option<ViolationKind>, Option<&str>) {
	const PREFIXES: [(&str, ViolationKind); 4] = [
		("UNIQUE constraint failed", ViolationKind::Unique),
		("NOT NULL constraint failed", ViolationKind::NotNull),
		("CHECK constraint failed", ViolationKind::Check),
		("FOREIGN KEY constraint failed", ViolationKind::ForeignKey),
	];
	for (prefix, kind) in PREFIXES {
		if let Some(rest) = message.strip_prefix(prefix) {
			let detail = rest.strip_prefix(':').map(str::trim).filter(|d| !d.is_empty());
			return (Some(kind), detail);
		}
	}
	(None, None)
}

#[derive(Debug, Error)]
pub enum DbError {
	#[error("{0}")]
	Violation(Violation),

	#[error("no row {id} in {table}")]
	NotFound { table: &'static str, id: i64 },

	#[error("invalid state: {0}")]
	InvalidState(String),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("database error: {0}")]
	Sqlx(#[source] sqlx::Error),
}

impl DbError {
	pub fn violation(&self) -> Option<&Violation> {
		match self {
			DbError::Violation(violation) => Some(violation),
			_ => None,
		}
	}

	pub fn kind(&self) -> Option<ViolationKind> {
		self.violation().map(|v| v.kind)
	}

	pub fn is_foreign_key(&self) -> bool {
		self.kind() == Some(ViolationKind::ForeignKey)
	}

	/// Attach the offending column to a foreign-key violation.
	pub(crate) fn foreign_key_on(self, table: &str, column: &str) -> Self {
		match self {
			DbError::Violation(v) if v.kind == ViolationKind::ForeignKey => DbError::Violation(v.on(table, column)),
			other => other,
		}
	}
}

impl From<sqlx::Error> for DbError {
	fn from(err: sqlx::Error) -> Self {
		if let sqlx::Error::Database(db_err) = &err {
			let kind = match db_err.kind() {
				ErrorKind::UniqueViolation => Some(ViolationKind::Unique),
				ErrorKind::ForeignKeyViolation => Some(ViolationKind::ForeignKey),
				ErrorKind::NotNullViolation => Some(ViolationKind::NotNull),
				ErrorKind::CheckViolation => Some(ViolationKind::Check),
				// trigger-raised failures arrive as SQLITE_CONSTRAINT_TRIGGER
				_ => None,
			};
			if let Some(violation) = Violation::from_message(kind, db_err.message()) {
				return DbError::Violation(violation);
			}
		}
		DbError::Sqlx(err)
	}
}

impl From<Violation> for DbError {
	fn from(violation: Violation) -> Self {
		DbError::Violation(violation)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unique_message_names_column() {
		let v = Violation::from_message(Some(ViolationKind::Unique), "UNIQUE constraint failed: books.isbn").unwrap();
		assert_eq!(v.table.as_deref(), Some("books"));
		assert_eq!(v.column.as_deref(), Some("isbn"));
		assert!(v.mentions("unique"));
		assert!(v.mentions("ISBN"));
	}

	#[test]
	fn not_null_classified_by_prefix_alone() {
		let v = Violation::from_message(None, "NOT NULL constraint failed: users.email").unwrap();
		assert_eq!(v.kind, ViolationKind::NotNull);
		assert_eq!(v.column.as_deref(), Some("email"));
		assert!(v.mentions("null"));
	}

	#[test]
	fn named_check_resolves_column() {
		let v = Violation::from_message(None, "CHECK constraint failed: chk_books_available_copies").unwrap();
		assert_eq!(v.kind, ViolationKind::Check);
		assert_eq!(v.table.as_deref(), Some("books"));
		assert_eq!(v.column.as_deref(), Some("available_copies"));
		assert_eq!(v.constraint.as_deref(), Some("chk_books_available_copies"));
	}

	#[test]
	fn foreign_key_gets_column_from_caller() {
		let v = Violation::from_message(None, "FOREIGN KEY constraint failed").unwrap();
		assert_eq!(v.column, None);

		let err = DbError::Violation(v).foreign_key_on("borrowings", "user_id");
		assert!(err.is_foreign_key());
		assert_eq!(
			err.to_string(),
			"foreign-key violation on borrowings.user_id: FOREIGN KEY constraint failed"
		);
	}

	#[test]
	fn other_messages_are_not_violations() {
		assert_eq!(Violation::from_message(None, "database is locked"), None);
		assert_eq!(Violation::from_message(None, "no such table: loans"), None);
	}
}
