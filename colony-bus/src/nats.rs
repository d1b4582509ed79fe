//! NATS JetStream bus.
//!
//! One stream per subject, provisioned on first use: work-queue retention
//! (a message is deleted once any consumer acks it), file-backed storage, a
//! two-minute duplicate-suppression window and a 24-hour max age. Queue
//! groups map to durable pull consumers named `<group>-consumer`; every
//! process binding the same durable shares the stream's messages, which is
//! what gives competing consumers across scaled instances.

use crate::{BusError, EventBus, RawHandler};
use async_nats::connection::State;
use async_nats::jetstream;
use async_nats::jetstream::consumer::AckPolicy;
use async_nats::jetstream::stream::{RetentionPolicy, StorageType};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const ACK_WAIT: Duration = Duration::from_secs(30);
const MAX_DELIVER: i64 = 3;
const DUPLICATE_WINDOW: Duration = Duration::from_secs(120);
const MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// JetStream-backed [`EventBus`].
pub struct NatsBus {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    provisioned: Mutex<HashSet<String>>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
}

impl NatsBus {
    /// Connect to the broker at `url`.
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|err| BusError::Connect(err.to_string()))?;
        let jetstream = jetstream::new(client.clone());
        info!(%url, "connected to NATS");
        Ok(Self {
            client,
            jetstream,
            provisioned: Mutex::new(HashSet::new()),
            consumers: Mutex::new(Vec::new()),
        })
    }

    async fn ensure_stream(&self, subject: &str) -> Result<jetstream::stream::Stream, BusError> {
        let known = self.provisioned.lock().expect("provisioned lock").contains(subject);
        let stream = self
            .jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: subject.to_string(),
                subjects: vec![subject.to_string()],
                retention: RetentionPolicy::WorkQueue,
                storage: StorageType::File,
                duplicate_window: DUPLICATE_WINDOW,
                max_age: MAX_AGE,
                ..Default::default()
            })
            .await
            .map_err(|err| BusError::Stream {
                subject: subject.to_string(),
                message: err.to_string(),
            })?;
        if !known {
            debug!(%subject, "stream ready");
            self.provisioned
                .lock()
                .expect("provisioned lock")
                .insert(subject.to_string());
        }
        Ok(stream)
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn emit_raw(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.ensure_stream(subject).await?;
        let ack = self
            .jetstream
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|err| BusError::Publish {
                subject: subject.to_string(),
                message: err.to_string(),
            })?;
        // Wait for the broker to durably accept the message.
        ack.await.map_err(|err| BusError::Publish {
            subject: subject.to_string(),
            message: err.to_string(),
        })?;
        debug!(%subject, "event emitted");
        Ok(())
    }

    async fn subscribe_raw(
        &self,
        subject: &str,
        queue_group: &str,
        handler: RawHandler,
    ) -> Result<(), BusError> {
        let stream = self.ensure_stream(subject).await?;
        let durable = format!("{queue_group}-consumer");
        let consumer = stream
            .get_or_create_consumer(
                &durable,
                jetstream::consumer::pull::Config {
                    durable_name: Some(durable.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: ACK_WAIT,
                    max_deliver: MAX_DELIVER,
                    ..Default::default()
                },
            )
            .await
            .map_err(|err| BusError::Subscribe {
                subject: subject.to_string(),
                message: err.to_string(),
            })?;

        let subject_name = subject.to_string();
        let task = tokio::spawn(async move {
            let mut messages = match consumer.messages().await {
                Ok(messages) => messages,
                Err(err) => {
                    error!(subject = %subject_name, %err, "consumer stream failed");
                    return;
                }
            };
            while let Some(delivery) = messages.next().await {
                let message = match delivery {
                    Ok(message) => message,
                    Err(err) => {
                        warn!(subject = %subject_name, %err, "delivery error");
                        continue;
                    }
                };
                // Run the handler on its own task so a panic skips the ack
                // (the broker redelivers after the ack wait) without killing
                // this consumer loop.
                let outcome = tokio::spawn(handler(message.payload.to_vec())).await;
                match outcome {
                    Ok(()) => {
                        if let Err(err) = message.ack().await {
                            warn!(subject = %subject_name, %err, "ack failed");
                        }
                    }
                    Err(err) => {
                        error!(subject = %subject_name, %err, "handler panicked; not acking");
                    }
                }
            }
        });
        self.consumers.lock().expect("consumers lock").push(task);
        info!(%subject, %queue_group, "subscribed");
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        for task in self.consumers.lock().expect("consumers lock").drain(..) {
            task.abort();
        }
        self.client
            .flush()
            .await
            .map_err(|err| BusError::Connect(err.to_string()))?;
        info!("event bus closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.connection_state() == State::Connected
    }
}
