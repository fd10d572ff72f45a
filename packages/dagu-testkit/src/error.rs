pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("DAGU_PG_DSN is not a valid Postgres DSN: {0}")]
	InvalidDsn(#[source] sqlx::Error),

	#[error("Failed to create scratch database {database}: {source}")]
	Create {
		database: String,
		#[source]
		source: sqlx::Error,
	},

	#[error("Failed to drop scratch database {database}: {source}")]
	Drop {
		database: String,
		#[source]
		source: sqlx::Error,
	},

	#[error("Failed to start a cleanup runtime: {0}")]
	Runtime(#[from] std::io::Error),
}
