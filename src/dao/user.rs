use tracing::debug;

use crate::clock::{to_micros, SharedClock};
use crate::error::DbError;
use crate::sql::{Table, DB};
use crate::types::{NewUser, Uid, User, UserQuery};

const INSERT_USER: &str = r#"
INSERT INTO users
	(username, email, full_name, phone, role, status, created_at, updated_at)
VALUES
	(?, ?, ?, ?, ?, ?, ?, ?)
RETURNING
	user_id, username, email, full_name, phone, role, status, created_at, updated_at
"#;

const SELECT_USER_BY_ID: &str = r#"
SELECT
	user_id, username, email, full_name, phone, role, status, created_at, updated_at
FROM
	users
WHERE
	user_id = ?
"#;

const SELECT_USER_BY_USERNAME: &str = r#"
SELECT
	user_id, username, email, full_name, phone, role, status, created_at, updated_at
FROM
	users
WHERE
	username = ?
"#;

const UPDATE_USER: &str = r#"
UPDATE users SET
	username = ?, email = ?, full_name = ?, phone = ?, role = ?, status = ?, updated_at = ?
WHERE
	user_id = ?
"#;

#[derive(Debug, Clone)]
pub struct UserDao {
	db: DB,
	clock: SharedClock,
}

impl UserDao {
	pub fn new(db: DB, clock: SharedClock) -> Self {
		UserDao{ db, clock }
	}

	pub async fn create(&self, user: &NewUser) -> Result<User, DbError> {
		let now = to_micros(self.clock.now());
		let row: UserQuery = sqlx::query_as(INSERT_USER)
			.bind(&user.username)
			.bind(&user.email)
			.bind(&user.full_name)
			.bind(&user.phone)
			.bind(&user.role)
			.bind(&user.status)
			.bind(now)
			.bind(now)
			.fetch_one(self.db.pool())
			.await?;

		let user = User::from_query(row);
		debug!(user_id = user.user_id, username = %user.username, "created user");
		Ok(user)
	}

	pub async fn find_by_id(&self, user_id: Uid) -> Result<Option<User>, DbError> {
		let row: Option<UserQuery> = sqlx::query_as(SELECT_USER_BY_ID)
			.bind(user_id)
			.fetch_optional(self.db.pool())
			.await?;
		Ok(row.map(User::from_query))
	}

	pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
		let row: Option<UserQuery> = sqlx::query_as(SELECT_USER_BY_USERNAME)
			.bind(username)
			.fetch_optional(self.db.pool())
			.await?;
		Ok(row.map(User::from_query))
	}

	/// Write every mutable column of `user` and return the row as stored,
	/// including the refreshed `updated_at`.
	pub async fn update(&self, user: &User) -> Result<User, DbError> {
		let done = sqlx::query(UPDATE_USER)
			.bind(&user.username)
			.bind(&user.email)
			.bind(&user.full_name)
			.bind(&user.phone)
			.bind(&user.role)
			.bind(&user.status)
			.bind(to_micros(self.clock.now()))
			.bind(user.user_id)
			.execute(self.db.pool())
			.await?;

		let not_found = DbError::NotFound{ table: Table::Users.name(), id: user.user_id };
		if done.rows_affected() == 0 {
			return Err(not_found);
		}
		debug!(user_id = user.user_id, "updated user");
		// re-read: the audit trigger may have moved updated_at after the write
		self.find_by_id(user.user_id).await?.ok_or(not_found)
	}

	/// Borrowings of the user go with it (ON DELETE CASCADE).
	pub async fn delete(&self, user_id: Uid) -> Result<bool, DbError> {
		let done = sqlx::query("DELETE FROM users WHERE user_id = ?")
			.bind(user_id)
			.execute(self.db.pool())
			.await?;
		debug!(user_id, removed = done.rows_affected(), "deleted user");
		Ok(done.rows_affected() > 0)
	}

	pub async fn count(&self) -> Result<i64, DbError> {
		self.db.count(Table::Users).await
	}
}
