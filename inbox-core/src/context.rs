use crate::config::Config;
use crate::db::{create_pool as create_db_pool, DbPool};
use crate::queue::{create_consumer, create_producer, QueueConsumer, QueueProducer};
use crate::redis::{create_pool as create_redis_pool, RedisPool};
use std::sync::Arc;

#[derive(Clone)]
pub struct InboxContext {
    pub config: Arc<Config>,
    pub db_pool: Arc<DbPool>,
    pub redis_pool: RedisPool,
    pub producer: QueueProducer,
}

impl InboxContext {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = create_db_pool(&config.database).await?;
        let redis_pool = create_redis_pool(&config.redis).await?;
        let producer = create_producer(&config.redpanda)?;

        Ok(InboxContext {
            config: Arc::new(config),
            db_pool,
            redis_pool,
            producer,
        })
    }

    pub fn create_consumer(&self, group_id: Option<&str>) -> anyhow::Result<QueueConsumer> {
        create_consumer(&self.config.redpanda, group_id)
    }
}
