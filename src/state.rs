use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    auth::{jwt::JwtKeys, repo::{PgUserStore, UserStore}},
    config::AppConfig,
    images::client::{ClipdropClient, ImageApi},
    storage::{AssetStorage, Storage},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub users: Arc<dyn UserStore>,
    pub storage: Arc<dyn AssetStorage>,
    pub images: Arc<dyn ImageApi>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("imagify/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;

        let storage = Arc::new(Storage::new(&config.storage, http.clone()).await?) as Arc<dyn AssetStorage>;
        let images = Arc::new(ClipdropClient::new(http, &config.clipdrop)) as Arc<dyn ImageApi>;
        let users = Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>;

        Ok(Self::from_parts(config, users, storage, images))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        storage: Arc<dyn AssetStorage>,
        images: Arc<dyn ImageApi>,
    ) -> Self {
        let keys = JwtKeys::from_config(&config.jwt);
        Self {
            config,
            keys,
            users,
            storage,
            images,
        }
    }
}
