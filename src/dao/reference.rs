use tracing::debug;

use crate::error::DbError;
use crate::sql::{row_exists, Table, DB};
use crate::types::RefId;

/// Catalogue tables a book points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
	Author,
	Publisher,
	Category,
}

impl Reference {
	pub fn table(self) -> Table {
		match self {
			Reference::Author => Table::Authors,
			Reference::Publisher => Table::Publishers,
			Reference::Category => Table::Categories,
		}
	}
}

#[derive(Debug, Clone)]
pub struct ReferenceDao {
	db: DB,
}

impl ReferenceDao {
	pub fn new(db: DB) -> Self {
		ReferenceDao{ db }
	}

	/// Names are unique per table.
	pub async fn create(&self, reference: Reference, name: &str) -> Result<RefId, DbError> {
		let table = reference.table();
		let sql = format!("INSERT INTO {} (name) VALUES (?) RETURNING {}", table.name(), table.key());
		let (id,): (RefId,) = sqlx::query_as(&sql)
			.bind(name)
			.fetch_one(self.db.pool())
			.await?;
		debug!(%table, id, name, "created reference row");
		Ok(id)
	}

	pub async fn exists(&self, reference: Reference, id: RefId) -> Result<bool, DbError> {
		let mut conn = self.db.pool().acquire().await?;
		row_exists(&mut conn, reference.table(), id).await
	}
}
