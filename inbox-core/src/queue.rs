use anyhow::{anyhow, Result};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::StreamConsumer;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing;

use crate::config::RedpandaConfig;

pub type QueueProducer = Arc<FutureProducer>;
pub type QueueConsumer = Arc<StreamConsumer>;

/// Normalized events collected by pollers land here before ingestion.
pub const TOPIC_RAW_EVENTS: &str = "inbox.events.raw";
/// Every freshly ingested item, consumed by the automation engine.
pub const TOPIC_ITEMS_CREATED: &str = "inbox.items.created";
/// Pending outbound replies awaiting platform dispatch.
pub const TOPIC_REPLY_DISPATCH: &str = "inbox.replies.dispatch";
/// Per-post engagement captures from the metric fetch jobs.
pub const TOPIC_METRIC_SNAPSHOTS: &str = "inbox.metrics.snapshots";

fn build_client_config(config: &RedpandaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();

    client_config
        .set("bootstrap.servers", &config.brokers)
        .set("metadata.request.timeout.ms", "30000")
        .set("socket.timeout.ms", "30000")
        .set("socket.keepalive.enable", "true");

    // Add SSL/TLS configuration if REDPANDA_SSL_ENABLED is set
    if let Ok(ssl_enabled) = std::env::var("REDPANDA_SSL_ENABLED") {
        if ssl_enabled == "true" || ssl_enabled == "1" {
            tracing::info!("SSL/TLS enabled for Redpanda connection");
            client_config.set("security.protocol", "ssl");

            if let Ok(ca_location) = std::env::var("REDPANDA_SSL_CA_LOCATION") {
                client_config.set("ssl.ca.location", &ca_location);
            }
            if let Ok(cert_location) = std::env::var("REDPANDA_SSL_CERT_LOCATION") {
                client_config.set("ssl.certificate.location", &cert_location);
            }
            if let Ok(key_location) = std::env::var("REDPANDA_SSL_KEY_LOCATION") {
                client_config.set("ssl.key.location", &key_location);
            }
        }
    }

    client_config
}

pub fn create_producer(config: &RedpandaConfig) -> Result<QueueProducer> {
    tracing::info!("Creating queue producer, brokers: {}", config.brokers);

    let producer: FutureProducer = build_client_config(config)
        .set("message.timeout.ms", "5000")
        .set("acks", "all")
        .set("retries", "3")
        .create()
        .map_err(|e| {
            tracing::error!("Failed to create queue producer: {}", e);
            anyhow!("Failed to create queue producer: {}", e)
        })?;

    tracing::info!("Queue producer created (connection established on first use)");

    Ok(Arc::new(producer))
}

pub fn create_consumer(config: &RedpandaConfig, group_id: Option<&str>) -> Result<QueueConsumer> {
    let group = group_id.unwrap_or(&config.consumer_group);
    tracing::info!(
        "Creating queue consumer, brokers: {}, group: {}",
        config.brokers,
        group
    );

    let consumer: StreamConsumer = build_client_config(config)
        .set("group.id", group)
        .set("enable.partition.eof", "false")
        .set("session.timeout.ms", "30000")
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", "earliest")
        .create()
        .map_err(|e| {
            tracing::error!("Failed to create queue consumer for group {}: {}", group, e);
            anyhow!("Failed to create queue consumer: {}", e)
        })?;

    Ok(Arc::new(consumer))
}

pub async fn produce_message(
    producer: &QueueProducer,
    topic: &str,
    key: Option<&str>,
    payload: &[u8],
) -> Result<()> {
    let mut record = FutureRecord::to(topic).payload(payload);

    if let Some(k) = key {
        record = record.key(k);
    }

    match producer.send(record, Duration::from_secs(5)).await {
        Ok((partition, offset)) => {
            tracing::debug!(
                "Message delivered to topic {} partition {} offset {}",
                topic,
                partition,
                offset
            );
            Ok(())
        }
        Err((e, _)) => {
            tracing::error!("Failed to deliver message to topic {}: {:?}", topic, e);
            Err(anyhow!("Failed to deliver message: {:?}", e))
        }
    }
}
