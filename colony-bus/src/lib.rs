//! Event bus abstraction: durable at-least-once publish/subscribe with named
//! subjects and queue groups.
//!
//! Production uses [`NatsBus`] (JetStream, one work-queue stream per
//! subject); tests use [`InProcessBus`], which mirrors the queue-group
//! delivery contract in memory and records everything it publishes.

mod error;
mod inproc;
mod nats;

pub use error::BusError;
pub use inproc::InProcessBus;
pub use nats::NatsBus;

use async_trait::async_trait;
use colony_core::Event;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Handler for raw subject payloads. Invoked once per delivered message;
/// returning acknowledges the message.
pub type RawHandler = Arc<dyn Fn(Vec<u8>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Durable publish/subscribe.
///
/// Delivery is at-least-once: handlers run concurrently (across processes
/// and within one) and must be idempotent with respect to their own event
/// and its downstream emissions.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a payload, returning once the broker has durably accepted it.
    async fn emit_raw(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Install a durable consumer. Messages on `subject` are load-balanced
    /// across all subscribers sharing `queue_group`; each message reaches
    /// exactly one subscriber in the group.
    async fn subscribe_raw(
        &self,
        subject: &str,
        queue_group: &str,
        handler: RawHandler,
    ) -> Result<(), BusError>;

    /// Unsubscribe everything and disconnect.
    async fn close(&self) -> Result<(), BusError>;

    fn is_connected(&self) -> bool;
}

/// Publish a typed event on its subject.
pub async fn emit<E: Event>(bus: &dyn EventBus, event: &E) -> Result<(), BusError> {
    let payload = serde_json::to_vec(event)?;
    bus.emit_raw(E::SUBJECT, payload).await
}

/// Subscribe a typed handler under a queue group.
///
/// Undecodable payloads are logged and dropped (acked): a malformed event
/// must never turn into a redelivery storm.
pub async fn subscribe<E, F, Fut>(
    bus: &dyn EventBus,
    queue_group: &str,
    handler: F,
) -> Result<(), BusError>
where
    E: Event,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let handler = Arc::new(handler);
    let raw: RawHandler = Arc::new(move |payload| {
        let handler = handler.clone();
        Box::pin(async move {
            match serde_json::from_slice::<E>(&payload) {
                Ok(event) => handler(event).await,
                Err(err) => {
                    tracing::warn!(subject = E::SUBJECT, %err, "dropping undecodable event");
                }
            }
        })
    });
    bus.subscribe_raw(E::SUBJECT, queue_group, raw).await
}
