use std::sync::Arc;

use dagu_domain::LexiconHandle;
use dagu_service::DaguService;
use dagu_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<DaguService>,
}
impl AppState {
	pub async fn new(config: dagu_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let lexicon = LexiconHandle::from_source(config.lexicon.path.as_deref())?;
		let service = DaguService::new(config, db, Arc::new(lexicon));

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: DaguService) -> Self {
		Self { service: Arc::new(service) }
	}
}
