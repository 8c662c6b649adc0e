use anyhow::{anyhow, Result};
use redis::aio::MultiplexedConnection;
use redis::Client;
use std::sync::Arc;
use tracing;

use crate::config::RedisConfig;

pub type RedisPool = Arc<Client>;
pub type RedisConnection = MultiplexedConnection;

pub async fn create_pool(config: &RedisConfig) -> Result<RedisPool> {
    tracing::info!("Setting up Redis connection pool");
    tracing::info!("Redis URL: {}", mask_redis_url(&config.url));

    let client = Client::open(config.url.as_str())
        .map_err(|e| anyhow!("Failed to create Redis client: {}", e))?;

    // Test the connection
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| anyhow!("Failed to connect to Redis: {}", e))?;

    redis::cmd("PING")
        .query_async::<String>(&mut conn)
        .await
        .map_err(|e| anyhow!("Failed to ping Redis: {}", e))?;

    tracing::info!("Redis connection established");

    Ok(Arc::new(client))
}

pub async fn get_connection(pool: &RedisPool) -> Result<RedisConnection> {
    pool.get_multiplexed_async_connection()
        .await
        .map_err(|e| anyhow!("Failed to get Redis connection: {}", e))
}

/// Unread badge counters, kept per workspace and per social account so the
/// inbox list can render counts without a table scan.
pub async fn increment_unread(
    pool: &RedisPool,
    workspace_id: i64,
    social_account_id: i64,
) -> Result<()> {
    let mut conn = get_connection(pool).await?;

    let total_key = format!("UNREAD:{}", workspace_id);
    redis::cmd("INCR")
        .arg(&total_key)
        .query_async::<i64>(&mut conn)
        .await?;

    let account_key = format!("UNREAD:{}:{}", workspace_id, social_account_id);
    redis::cmd("INCR")
        .arg(&account_key)
        .query_async::<i64>(&mut conn)
        .await?;

    Ok(())
}

pub async fn decrement_unread(
    pool: &RedisPool,
    workspace_id: i64,
    social_account_id: i64,
) -> Result<()> {
    let mut conn = get_connection(pool).await?;

    let total_key = format!("UNREAD:{}", workspace_id);
    redis::cmd("DECR")
        .arg(&total_key)
        .query_async::<i64>(&mut conn)
        .await?;

    let account_key = format!("UNREAD:{}:{}", workspace_id, social_account_id);
    redis::cmd("DECR")
        .arg(&account_key)
        .query_async::<i64>(&mut conn)
        .await?;

    Ok(())
}

pub async fn get_unread_counts(
    pool: &RedisPool,
    workspace_id: i64,
    social_account_id: Option<i64>,
) -> Result<(i64, Option<i64>)> {
    let mut conn = get_connection(pool).await?;

    let total_key = format!("UNREAD:{}", workspace_id);
    let total: i64 = redis::cmd("GET")
        .arg(&total_key)
        .query_async(&mut conn)
        .await
        .unwrap_or(0);

    let account_count = match social_account_id {
        Some(account_id) => {
            let account_key = format!("UNREAD:{}:{}", workspace_id, account_id);
            let count: i64 = redis::cmd("GET")
                .arg(&account_key)
                .query_async(&mut conn)
                .await
                .unwrap_or(0);
            Some(count.max(0))
        }
        None => None,
    };

    Ok((total.max(0), account_count))
}

fn mask_redis_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        let (before_at, after_at) = url.split_at(at_pos);
        if let Some(colon_pos) = before_at.rfind(':') {
            let (protocol_user, _password) = before_at.split_at(colon_pos);
            format!("{}:****@{}", protocol_user, after_at)
        } else {
            format!("redis://****@{}", after_at)
        }
    } else {
        url.to_string()
    }
}
