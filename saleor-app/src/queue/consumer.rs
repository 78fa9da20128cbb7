//! AMQP consumer for queue-bound webhook handlers, using lapin.
//!
//! Connects to the broker from the queue settings, consumes every queue named
//! by a queue binding, and spawns one task per delivery.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::{stream::select_all, StreamExt};
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, Connection, ConnectionProperties,
};
use tracing::{error, info, warn};

use super::types::inbound_from_delivery;
use crate::config::QueueSettings;
use crate::dispatch::Dispatcher;
use crate::error::AppError;

const CONSUMER_TAG: &str = "saleor-app";

/// Consumes queue deliveries and feeds them to the dispatcher.
#[derive(Clone)]
pub struct QueueConsumer {
    settings: QueueSettings,
    queues: Vec<String>,
    dispatcher: Dispatcher,
}

impl QueueConsumer {
    /// Consumer for every queue targeted by the dispatcher's queue bindings.
    pub fn new(settings: QueueSettings, dispatcher: Dispatcher) -> Self {
        let queues: BTreeSet<String> = dispatcher
            .registry()
            .queue_targets()
            .keys()
            .map(|url| url.queue().to_string())
            .collect();

        Self {
            settings,
            queues: queues.into_iter().collect(),
            dispatcher,
        }
    }

    /// Queue names this consumer reads from.
    pub fn queues(&self) -> &[String] {
        &self.queues
    }

    /// Consume until `shutdown` completes or the broker closes the stream.
    ///
    /// Deliveries are acked once handled. Failed deliveries are nacked
    /// without requeue: this layer never retries.
    pub async fn run<S>(self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        info!(url_length = self.settings.url.len(), "amqp_connecting");

        let conn = Connection::connect(&self.settings.url, ConnectionProperties::default())
            .await
            .context("Failed to connect to AMQP broker")?;

        info!("amqp_connected");

        let channel = conn.create_channel().await.context("Failed to create channel")?;

        channel
            .basic_qos(self.settings.prefetch, BasicQosOptions::default())
            .await
            .context("Failed to set QoS")?;

        info!(prefetch_count = self.settings.prefetch, "amqp_qos_set");

        let mut consumers = Vec::with_capacity(self.queues.len());
        for queue in &self.queues {
            channel
                .queue_declare(
                    queue,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .with_context(|| format!("Failed to declare queue {}", queue))?;

            let consumer = channel
                .basic_consume(
                    queue,
                    CONSUMER_TAG,
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await
                .with_context(|| format!("Failed to start consumer on {}", queue))?;

            info!(queue = %queue, "amqp_consumer_started");
            let queue = queue.clone();
            consumers.push(consumer.map(move |delivery| (queue.clone(), delivery)));
        }

        let mut deliveries = select_all(consumers);
        let channel = Arc::new(channel);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("queue_consumer_stopping");
                    break;
                }
                delivery = deliveries.next() => {
                    match delivery {
                        Some((queue, Ok(delivery))) => {
                            let delivery_tag = delivery.delivery_tag;
                            let webhook = inbound_from_delivery(
                                &queue,
                                delivery.properties.headers().as_ref(),
                                &delivery.data,
                            );

                            info!(
                                queue = %queue,
                                delivery_tag = delivery_tag,
                                event = ?webhook.event,
                                "amqp_webhook_received"
                            );

                            let dispatcher = self.dispatcher.clone();
                            let channel = Arc::clone(&channel);

                            tokio::spawn(async move {
                                let result = dispatcher.dispatch(webhook).await;
                                settle(&channel, delivery_tag, &queue, result).await;
                            });
                        }
                        Some((queue, Err(e))) => {
                            error!(queue = %queue, error = %e, "amqp_delivery_error");
                        }
                        None => {
                            warn!("amqp_consumer_closed");
                            break;
                        }
                    }
                }
            }
        }

        if let Err(e) = channel.close(200, "Normal shutdown").await {
            warn!(error = %e, "amqp_channel_close_error");
        }
        if let Err(e) = conn.close(200, "Normal shutdown").await {
            warn!(error = %e, "amqp_connection_close_error");
        }

        info!("queue_consumer_shutdown_complete");
        Ok(())
    }
}

/// What to tell the broker about a delivery once it has been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Reject { requeue: bool },
}

/// Ack a handled delivery. Every failure is rejected without requeue, so a
/// bad delivery is never retried by this layer.
pub fn settlement(result: &Result<(), AppError>) -> Settlement {
    match result {
        Ok(()) => Settlement::Ack,
        Err(_) => Settlement::Reject { requeue: false },
    }
}

async fn settle(channel: &Channel, delivery_tag: u64, queue: &str, result: Result<(), AppError>) {
    match (settlement(&result), result) {
        (Settlement::Ack, _) => {
            if let Err(e) = channel
                .basic_ack(delivery_tag, BasicAckOptions::default())
                .await
            {
                error!(delivery_tag = delivery_tag, error = %e, "amqp_ack_failed");
            } else {
                info!(queue = %queue, delivery_tag = delivery_tag, "amqp_webhook_completed");
            }
        }
        (Settlement::Reject { requeue }, result) => {
            if let Err(err) = &result {
                warn!(
                    queue = %queue,
                    delivery_tag = delivery_tag,
                    status = err.status().as_u16(),
                    error = %err,
                    "amqp_webhook_rejected"
                );
            }

            if let Err(e) = channel
                .basic_nack(
                    delivery_tag,
                    BasicNackOptions {
                        requeue,
                        ..Default::default()
                    },
                )
                .await
            {
                error!(delivery_tag = delivery_tag, error = %e, "amqp_nack_failed");
            }
        }
    }
}
