//! # Event Transport
//!
//! In-process publish/subscribe routing for [`MarketEvent`]s.
//!
//! The transport holds no business state. For a single publish call all
//! registered handlers of the event's kind run concurrently; the publish
//! future resolves only when every handler has finished, so successive
//! publishes from one producer are observed in publish order. A handler's
//! failure is logged and isolated, never propagated to the publisher or to
//! sibling handlers.
//!
//! Instances are constructed explicitly and shared via [`Arc`]; there is no
//! global bus, so one process can run several isolated simulations.

use crate::domain::errors::DomainResult;
use crate::domain::events::{EventKind, MarketEvent};
use crate::domain::value_objects::EventId;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A consumer of published events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles one delivered event.
    ///
    /// # Errors
    ///
    /// Errors are logged by the transport and never reach the publisher.
    async fn handle(&self, event: &MarketEvent) -> DomainResult<()>;

    /// Name used in fault logs.
    fn name(&self) -> &'static str {
        "handler"
    }
}

/// Opaque handle returned by [`EventTransport::subscribe`], used to
/// unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type HandlerEntry = (SubscriptionId, Arc<dyn EventHandler>);

/// In-process pub/sub bus over the closed [`MarketEvent`] vocabulary.
pub struct EventTransport {
    handlers: RwLock<HashMap<EventKind, Vec<HandlerEntry>>>,
    next_id: AtomicU64,
}

impl EventTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a handler for one event kind.
    pub async fn subscribe(
        &self,
        kind: EventKind,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().await;
        handlers.entry(kind).or_default().push((id, handler));
        id
    }

    /// Removes a previously registered handler. Returns false if the
    /// subscription was unknown.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().await;
        for entries in handlers.values_mut() {
            if let Some(pos) = entries.iter().position(|(entry_id, _)| *entry_id == id) {
                entries.remove(pos);
                return true;
            }
        }
        false
    }

    /// Returns the number of handlers registered for a kind.
    pub async fn handler_count(&self, kind: EventKind) -> usize {
        let handlers = self.handlers.read().await;
        handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Delivers the event to every handler registered for its kind.
    ///
    /// Handlers run concurrently with each other for this one call; the
    /// call returns once all of them have finished. Handler faults are
    /// logged at warn and swallowed.
    ///
    /// Each publish is stamped with a fresh [`EventId`], returned to the
    /// caller and attached to every log line for this delivery.
    pub async fn publish(&self, event: &MarketEvent) -> EventId {
        let event_id = EventId::generate();
        let kind = event.kind();
        // Snapshot the registration list so handlers may themselves
        // subscribe or publish without deadlocking.
        let targets: Vec<Arc<dyn EventHandler>> = {
            let handlers = self.handlers.read().await;
            handlers
                .get(&kind)
                .map(|entries| entries.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        if targets.is_empty() {
            tracing::trace!(%kind, %event_id, "no handlers registered, dropping event");
            return event_id;
        }

        let deliveries = targets.iter().map(|handler| async move {
            if let Err(error) = handler.handle(event).await {
                tracing::warn!(
                    %kind,
                    %event_id,
                    handler = handler.name(),
                    %error,
                    "event handler failed, fault isolated"
                );
            }
        });
        join_all(deliveries).await;
        event_id
    }
}

impl Default for EventTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTransport").finish_non_exhaustive()
    }
}
