use std::{path::Path, sync::Arc};

use anyhow::Context;
use settlement::PollEngine;

use super::{
    config::Config,
    database::{RedisStore, init_redis, seed_users},
};

pub struct State {
    pub engine: PollEngine<RedisStore>,
    pub config: Config,
}

impl State {
    pub async fn new(config: Config, seed: Option<&Path>) -> anyhow::Result<Arc<Self>> {
        let redis_connection = init_redis(&config.redis_url)
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?;
        let store = RedisStore::new(redis_connection);

        if let Some(path) = seed {
            seed_users(&store, path).await?;
        }

        Ok(Arc::new(Self {
            engine: PollEngine::new(store),
            config,
        }))
    }
}
