pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Forbidden: {message}")]
	Forbidden { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<dagu_storage::Error> for Error {
	fn from(err: dagu_storage::Error) -> Self {
		match err {
			dagu_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			err @ dagu_storage::Error::ActiveLinkTaken { .. } =>
				Self::Conflict { message: err.to_string() },
		}
	}
}

impl From<dagu_providers::Error> for Error {
	fn from(err: dagu_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<dagu_domain::LexiconError> for Error {
	fn from(err: dagu_domain::LexiconError) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}
