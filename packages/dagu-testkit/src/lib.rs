//! Scratch Postgres databases for integration tests.
//!
//! Tests that need Postgres read the server from `DAGU_PG_DSN`, create one [`TestDatabase`] each
//! and drop it when done. A database that is not cleaned up explicitly is dropped when the value
//! goes out of scope.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

pub const DSN_VAR: &str = "DAGU_PG_DSN";

const DATABASE_PREFIX: &str = "dagu_test_";

pub struct TestDatabase {
	dsn: String,
	pending: Option<PendingDrop>,
}
impl TestDatabase {
	/// Creates an empty database next to the one `server_dsn` points at.
	///
	/// The DSN's own database is used for `CREATE DATABASE` and `DROP DATABASE`, so the role
	/// needs `CREATEDB`.
	pub async fn new(server_dsn: &str) -> Result<Self> {
		let server = PgConnectOptions::from_str(server_dsn).map_err(Error::InvalidDsn)?;
		let database = format!("{DATABASE_PREFIX}{}", Uuid::new_v4().simple());
		let mut conn = PgConnection::connect_with(&server)
			.await
			.map_err(|source| Error::Create { database: database.clone(), source })?;

		conn.execute(format!(r#"CREATE DATABASE "{database}""#).as_str())
			.await
			.map_err(|source| Error::Create { database: database.clone(), source })?;

		let _ = conn.close().await;
		let dsn = server.clone().database(&database).to_url_lossy().to_string();

		Ok(Self { dsn, pending: Some(PendingDrop { database, server }) })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub async fn cleanup(mut self) -> Result<()> {
		match self.pending.take() {
			Some(pending) => pending.run().await,
			None => Ok(()),
		}
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		let Some(pending) = self.pending.take() else {
			return;
		};
		// The caller's runtime may be shutting down, so the drop gets a runtime of its own.
		let worker = thread::spawn(move || -> Result<()> {
			let runtime = Builder::new_current_thread().enable_all().build()?;

			runtime.block_on(pending.run())
		});

		match worker.join() {
			Ok(Ok(())) => {},
			Ok(Err(err)) => eprintln!("Scratch database cleanup failed: {err}."),
			Err(_) => eprintln!("Scratch database cleanup thread panicked."),
		}
	}
}

/// `DAGU_PG_DSN`, when set to something non-blank.
pub fn env_dsn() -> Option<String> {
	env::var(DSN_VAR).ok().filter(|dsn| !dsn.trim().is_empty())
}

struct PendingDrop {
	database: String,
	server: PgConnectOptions,
}
impl PendingDrop {
	/// `WITH (FORCE)` disconnects pools the test left open.
	async fn run(self) -> Result<()> {
		let Self { database, server } = self;
		let mut conn = match PgConnection::connect_with(&server).await {
			Ok(conn) => conn,
			Err(source) => return Err(Error::Drop { database, source }),
		};
		let sql = format!(r#"DROP DATABASE IF EXISTS "{database}" WITH (FORCE)"#);

		if let Err(source) = conn.execute(sql.as_str()).await {
			return Err(Error::Drop { database, source });
		}

		let _ = conn.close().await;

		Ok(())
	}
}
