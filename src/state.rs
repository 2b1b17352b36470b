use std::sync::Arc;

use crate::config::AppConfig;
use crate::db;
use crate::users::{
    repo::{MongoUserStorage, UserStorage},
    services::UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: UserService,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let database = db::connect(&config.mongodb).await?;
        let storage =
            Arc::new(MongoUserStorage::new(&database, &config.mongodb.collection)) as Arc<dyn UserStorage>;

        Ok(Self::from_parts(config, storage))
    }

    pub fn from_parts(config: Arc<AppConfig>, storage: Arc<dyn UserStorage>) -> Self {
        Self {
            config,
            users: UserService::new(storage),
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::users::memory::MemoryUserStorage;

        let config = AppConfig::from_lookup(|key| match key {
            "MONGODB_URI" => Some("mongodb://localhost:27017".into()),
            _ => None,
        })
        .expect("test config");

        Self::from_parts(Arc::new(config), Arc::new(MemoryUserStorage::new()))
    }
}
