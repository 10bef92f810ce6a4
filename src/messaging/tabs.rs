use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info};
use tokio::sync::{broadcast, mpsc};

use super::bus::EventBus;
use super::message::{Command, Response};
use super::reply::{PendingReply, Responder};
use crate::error::DetectionError;
use crate::models::TabId;

/// A command delivered to the listener installed in one tab.
pub struct TabRequest {
    pub command: Command,
    pub responder: Responder<Response>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabEvent {
    Removed(TabId),
}

/// Tab-addressed messaging. At most one listener per tab.
#[derive(Clone, Default)]
pub struct TabRegistry {
    listeners: Arc<Mutex<HashMap<TabId, mpsc::UnboundedSender<TabRequest>>>>,
    events: EventBus<TabEvent>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the request stream for `tab_id` the first time only.
    /// Returns `None` while a live listener is already installed.
    pub fn register(&self, tab_id: TabId) -> Option<mpsc::UnboundedReceiver<TabRequest>> {
        let mut guard = self.listeners.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(existing) = guard.get(&tab_id) {
            if !existing.is_closed() {
                debug!("listener already installed in tab {tab_id}");
                return None;
            }
        }
        let (tx, rx) = mpsc::unbounded_channel();
        guard.insert(tab_id, tx);
        Some(rx)
    }

    pub fn is_registered(&self, tab_id: TabId) -> bool {
        let guard = self.listeners.lock().unwrap_or_else(|p| p.into_inner());
        guard.get(&tab_id).is_some_and(|tx| !tx.is_closed())
    }

    /// Rejects with `AgentUnreachable` when nobody listens in the tab or the
    /// listener disappears before answering.
    pub fn send(&self, tab_id: TabId, command: Command) -> PendingReply<Response> {
        let sender = {
            let guard = self.listeners.lock().unwrap_or_else(|p| p.into_inner());
            guard.get(&tab_id).cloned()
        };
        let Some(sender) = sender else {
            return PendingReply::rejected(DetectionError::AgentUnreachable);
        };

        let (responder, reply) = PendingReply::channel();
        let request = TabRequest { command, responder };
        if sender.send(request).is_err() {
            return PendingReply::rejected(DetectionError::AgentUnreachable);
        }
        reply.on_dropped(DetectionError::AgentUnreachable)
    }

    /// Tears down the tab's listener and tells subscribers the tab is gone.
    pub fn close_tab(&self, tab_id: TabId) {
        let removed = {
            let mut guard = self.listeners.lock().unwrap_or_else(|p| p.into_inner());
            guard.remove(&tab_id)
        };
        if removed.is_some() {
            info!("tab {tab_id} closed");
        }
        self.events.publish(TabEvent::Removed(tab_id));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TabEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_registration_is_refused() {
        let tabs = TabRegistry::new();
        let first = tabs.register(TabId(1));
        assert!(first.is_some());
        assert!(tabs.register(TabId(1)).is_none());

        drop(first);
        assert!(!tabs.is_registered(TabId(1)));
        assert!(tabs.register(TabId(1)).is_some());
    }

    #[tokio::test]
    async fn unknown_tab_is_unreachable() {
        let tabs = TabRegistry::new();
        let reply = tabs.send(TabId(9), Command::Ping);
        assert_eq!(reply.settle().await, Err(DetectionError::AgentUnreachable));
    }

    #[tokio::test]
    async fn listener_answers_requests() {
        let tabs = TabRegistry::new();
        let mut rx = tabs.register(TabId(2)).unwrap();
        let reply = tabs.send(TabId(2), Command::Ping);

        let request = rx.recv().await.unwrap();
        assert_eq!(request.command, Command::Ping);
        request.responder.resolve(Response::ready());

        assert_eq!(reply.settle().await.unwrap(), Response::ready());
    }

    #[tokio::test]
    async fn closing_a_tab_notifies_subscribers() {
        let tabs = TabRegistry::new();
        let mut events = tabs.subscribe();
        let _rx = tabs.register(TabId(3)).unwrap();

        tabs.close_tab(TabId(3));
        assert_eq!(events.recv().await.unwrap(), TabEvent::Removed(TabId(3)));
        assert!(!tabs.is_registered(TabId(3)));
    }
}
