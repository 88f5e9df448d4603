//! In-process notification channel.
//!
//! Sending never blocks and never fails the sender; with no subscriber the
//! notification is simply dropped.

use crate::event::{AgentFlowEvent, EventMetadata};
use tokio::sync::broadcast;

/// Notifications buffered per subscriber before the oldest are dropped.
pub const EVENT_BUFFER: usize = 1024;

type Envelope = (AgentFlowEvent, EventMetadata);

/// Broadcast bus shared by the function engine and the pipeline.
///
/// Clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Envelope>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(EVENT_BUFFER).0,
        }
    }

    /// Publish a notification. `true` if any subscriber will see it.
    pub fn send(&self, event: AgentFlowEvent, metadata: EventMetadata) -> bool {
        self.tx.send((event, metadata)).is_ok()
    }

    /// Every notification from now on.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
            filter: None,
        }
    }

    /// Only `FunctionInvoked` and `FunctionCompleted`.
    pub fn function_events(&self) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
            filter: Some(AgentFlowEvent::is_function_event),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription handle. A slow reader skips what it missed.
pub struct EventReceiver {
    rx: broadcast::Receiver<Envelope>,
    filter: Option<fn(&AgentFlowEvent) -> bool>,
}

impl EventReceiver {
    fn accepts(&self, event: &AgentFlowEvent) -> bool {
        self.filter.map_or(true, |f| f(event))
    }

    /// Wait for the next notification. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if self.accepts(&envelope.0) => return Some(envelope),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next buffered notification, if any.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        while let Ok(envelope) = self.rx.try_recv() {
            if self.accepts(&envelope.0) {
                return Some(envelope);
            }
        }
        None
    }

    /// Every buffered notification, metadata dropped.
    pub fn drain(&mut self) -> Vec<AgentFlowEvent> {
        std::iter::from_fn(|| self.try_recv()).map(|(event, _)| event).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoked(function: &str) -> AgentFlowEvent {
        AgentFlowEvent::FunctionInvoked {
            call_id: "call-0-0".to_string(),
            function: function.to_string(),
            extension: "calculator".to_string(),
            arguments: "{}".to_string(),
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_send_reaches_subscriber_with_metadata() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        assert!(bus.send(invoked("add"), EventMetadata::new("function:add")));

        let (event, meta) = rx.recv().await.unwrap();
        assert_eq!(event.type_name(), "FunctionInvoked");
        assert_eq!(meta.source, "function:add");
    }

    #[test]
    fn test_send_without_subscribers_is_not_an_error() {
        let bus = EventBus::new();
        assert!(!bus.send(invoked("add"), EventMetadata::new("test")));
    }

    #[test]
    fn test_function_filter_and_drain() {
        let bus = EventBus::new();
        let mut all = bus.subscribe();
        let mut functions = bus.function_events();

        bus.send(AgentFlowEvent::error("test", "boom"), EventMetadata::new("test"));
        bus.send(invoked("a"), EventMetadata::new("test"));

        assert_eq!(all.drain().len(), 2);
        let only = functions.drain();
        assert_eq!(only.len(), 1);
        assert!(only[0].is_function_event());
        assert!(functions.try_recv().is_none());
    }
}
