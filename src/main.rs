// library system: prepare the configured database for the integrity suite

use lsys_integrity::{Config, DbError, Table, DB};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), DbError> {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "lsys_integrity=info".into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	let config = Config::from_env()?;
	let db = DB::open(&config).await?;
	db.schema().await?;
	db.seed_reference_data().await?;

	for table in [
		Table::Authors, Table::Publishers, Table::Categories,
		Table::Users, Table::Books, Table::Borrowings,
	] {
		let rows = db.count(table).await?;
		tracing::info!(%table, rows, "table ready");
	}

	db.close().await;
	Ok(())
}
