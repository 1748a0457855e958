//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Upstream event sinks
//!
//! The service center hands every inbound event to an [`EventSink`]. A sink
//! that returns an error makes the service center answer the basestation
//! with a protocol error instead of a completion.

use async_trait::async_trait;
use bssci_codec::{BasestationEvent, EndnodeEvent, Eui64, Event};
use thiserror::Error;
use tokio::sync::mpsc;

/// Reasons a sink did not take an event
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// No handler is registered for this kind of event
    #[error("handler not set")]
    HandlerNotSet,
    /// The handler refused the event
    #[error("event rejected: {0}")]
    Rejected(String),
}

/// Upstream integration boundary
///
/// All methods have default implementations; an event method left at its
/// default reports [`SinkError::HandlerNotSet`].
///
/// # Example
///
/// ```no_run
/// use bssci_service::{EventSink, SinkError};
/// use bssci_codec::EndnodeEvent;
/// use async_trait::async_trait;
///
/// struct PrintSink;
///
/// #[async_trait]
/// impl EventSink for PrintSink {
///     async fn endnode_event(&self, event: EndnodeEvent) -> Result<(), SinkError> {
///         println!("{} {} {}", event.bs_eui, event.ep_eui, event.event_type);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// Called when a basestation enters (`true`) or leaves (`false`) the registry
    fn on_subscription(&self, _subscribe: bool, _bs_eui: Eui64) {}

    /// Called for every basestation-scoped event
    async fn basestation_event(&self, _event: BasestationEvent) -> Result<(), SinkError> {
        Err(SinkError::HandlerNotSet)
    }

    /// Called for every endnode-scoped event
    async fn endnode_event(&self, _event: EndnodeEvent) -> Result<(), SinkError> {
        Err(SinkError::HandlerNotSet)
    }

    /// Route an event of either scope
    async fn event(&self, event: Event) -> Result<(), SinkError> {
        match event {
            Event::Basestation(event) => self.basestation_event(event).await,
            Event::Endnode(event) => self.endnode_event(event).await,
        }
    }
}

/// Sink that accepts and discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn basestation_event(&self, _event: BasestationEvent) -> Result<(), SinkError> {
        Ok(())
    }

    async fn endnode_event(&self, _event: EndnodeEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

type SubscriptionCallback = Box<dyn Fn(bool, Eui64) + Send + Sync + 'static>;
type BasestationCallback =
    Box<dyn Fn(BasestationEvent) -> Result<(), SinkError> + Send + Sync + 'static>;
type EndnodeCallback = Box<dyn Fn(EndnodeEvent) -> Result<(), SinkError> + Send + Sync + 'static>;

/// Callback-based sink
///
/// This provides a way to implement a sink using closures instead of
/// implementing the `EventSink` trait. Unset event callbacks behave like
/// an absent handler.
///
/// # Example
///
/// ```no_run
/// use bssci_service::CallbackSink;
/// use std::sync::Arc;
///
/// let sink = Arc::new(CallbackSink {
///     on_subscription: Some(Box::new(|subscribe, bs_eui| {
///         println!("{} subscribed: {}", bs_eui, subscribe);
///     })),
///     on_endnode: Some(Box::new(|event| {
///         println!("{} via {}", event.event_type, event.bs_eui);
///         Ok(())
///     })),
///     ..Default::default()
/// });
/// ```
#[derive(Default)]
pub struct CallbackSink {
    /// Called on registry changes
    pub on_subscription: Option<SubscriptionCallback>,
    /// Called for basestation-scoped events
    pub on_basestation: Option<BasestationCallback>,
    /// Called for endnode-scoped events
    pub on_endnode: Option<EndnodeCallback>,
}

#[async_trait]
impl EventSink for CallbackSink {
    fn on_subscription(&self, subscribe: bool, bs_eui: Eui64) {
        if let Some(ref f) = self.on_subscription {
            f(subscribe, bs_eui);
        }
    }

    async fn basestation_event(&self, event: BasestationEvent) -> Result<(), SinkError> {
        match self.on_basestation {
            Some(ref f) => f(event),
            None => Err(SinkError::HandlerNotSet),
        }
    }

    async fn endnode_event(&self, event: EndnodeEvent) -> Result<(), SinkError> {
        match self.on_endnode {
            Some(ref f) => f(event),
            None => Err(SinkError::HandlerNotSet),
        }
    }
}

/// Item delivered by a [`ChannelSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum SinkMessage {
    /// Registry change
    Subscription {
        /// `true` when the basestation connected
        subscribe: bool,
        /// Basestation concerned
        bs_eui: Eui64,
    },
    /// Inbound event
    Event(Event),
}

/// Sink forwarding everything into an unbounded channel
///
/// Once the receiver is dropped, events are reported as
/// [`SinkError::HandlerNotSet`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    /// Create a sink and the receiver for its items
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    fn on_subscription(&self, subscribe: bool, bs_eui: Eui64) {
        let _ = self
            .tx
            .send(SinkMessage::Subscription { subscribe, bs_eui });
    }

    async fn basestation_event(&self, event: BasestationEvent) -> Result<(), SinkError> {
        self.event(Event::Basestation(event)).await
    }

    async fn endnode_event(&self, event: EndnodeEvent) -> Result<(), SinkError> {
        self.event(Event::Endnode(event)).await
    }

    async fn event(&self, event: Event) -> Result<(), SinkError> {
        self.tx
            .send(SinkMessage::Event(event))
            .map_err(|_| SinkError::HandlerNotSet)
    }
}
