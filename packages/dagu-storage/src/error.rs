#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	/// Another active listing already holds this link.
	#[error("An active listing already uses link {link}.")]
	ActiveLinkTaken { link: String },
}
