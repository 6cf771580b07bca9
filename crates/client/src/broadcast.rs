// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-context session signalling.
//!
//! Every execution context (one browser tab) owns a [`SessionBroadcaster`]
//! attached to a [`SessionChannel`]. Signing out in one context clears the
//! shared credentials, reloads that context, and tells every sibling to
//! reload too so each re-derives its state from the store. A context never
//! acts on its own messages.
//!
//! Environments without inter-context messaging (server rendering, CLI,
//! tests) use [`NoopChannel`]: publishing and subscribing do nothing.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{self, CredentialStore};

/// Name of the channel shared by all contexts of one credential scope.
pub const CHANNEL_NAME: &str = "auth";

/// Messages exchanged on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionSignal {
    #[serde(rename = "signIn")]
    SignIn,
    #[serde(rename = "signOut")]
    SignOut,
}

impl SessionSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignIn => "signIn",
            Self::SignOut => "signOut",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "signIn" => Some(Self::SignIn),
            "signOut" => Some(Self::SignOut),
            _ => None,
        }
    }
}

impl fmt::Display for SessionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signal tagged with the context that published it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub origin: Uuid,
    pub signal: SessionSignal,
}

/// Publish/subscribe transport between execution contexts.
pub trait SessionChannel: Send + Sync {
    fn name(&self) -> &str;
    fn publish(&self, message: ChannelMessage);
    /// `None` when the environment has no inter-context messaging.
    fn subscribe(&self) -> Option<broadcast::Receiver<ChannelMessage>>;
}

/// In-process channel shared (by cloning) between sibling contexts.
#[derive(Clone)]
pub struct BroadcastChannel {
    name: String,
    tx: broadcast::Sender<ChannelMessage>,
}

impl BroadcastChannel {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { name: name.into(), tx }
    }

    /// Number of contexts currently listening.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastChannel {
    fn default() -> Self {
        Self::new(CHANNEL_NAME)
    }
}

impl SessionChannel for BroadcastChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, message: ChannelMessage) {
        // No listeners is not an error: the publisher may be the only context.
        let _ = self.tx.send(message);
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ChannelMessage>> {
        Some(self.tx.subscribe())
    }
}

/// Channel for environments without inter-context messaging.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopChannel;

impl SessionChannel for NoopChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    fn publish(&self, _message: ChannelMessage) {}

    fn subscribe(&self) -> Option<broadcast::Receiver<ChannelMessage>> {
        None
    }
}

/// Full reload of an execution context, forcing all derived state to be
/// rebuilt from the credential store.
pub trait Reload: Send + Sync {
    fn reload(&self);
}

impl<F> Reload for F
where
    F: Fn() + Send + Sync,
{
    fn reload(&self) {
        self()
    }
}

/// One context's endpoint on the session channel.
pub struct SessionBroadcaster {
    id: Uuid,
    channel: Arc<dyn SessionChannel>,
    store: Arc<dyn CredentialStore>,
    reload: Arc<dyn Reload>,
}

impl SessionBroadcaster {
    pub fn new(
        channel: Arc<dyn SessionChannel>,
        store: Arc<dyn CredentialStore>,
        reload: Arc<dyn Reload>,
    ) -> Self {
        Self { id: Uuid::new_v4(), channel, store, reload }
    }

    /// Identity of this context on the channel.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Clear credentials, tell siblings, then reload this context.
    pub fn signal_signed_out(&self) {
        store::clear_credentials(self.store.as_ref());
        info!(context = %self.id, "signed out");
        self.publish(SessionSignal::SignOut);
        self.reload.reload();
    }

    /// Tell siblings that fresh credentials are in the store.
    pub fn signal_signed_in(&self) {
        self.publish(SessionSignal::SignIn);
    }

    fn publish(&self, signal: SessionSignal) {
        debug!(context = %self.id, channel = self.channel.name(), %signal, "publishing session signal");
        self.channel.publish(ChannelMessage { origin: self.id, signal });
    }

    /// Subscribe and spawn the listener that reloads this context on sibling
    /// signals. Subscription happens before this returns, so no message
    /// published afterwards is missed. Returns `None` on a no-op channel.
    pub fn listen(&self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let mut rx = self.channel.subscribe()?;
        let id = self.id;
        let reload = Arc::clone(&self.reload);
        Some(tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(m) => m,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            // Any missed message would have caused a reload anyway.
                            debug!(context = %id, skipped = n, "session listener lagged");
                            reload.reload();
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };
                if message.origin == id {
                    continue;
                }
                info!(context = %id, from = %message.origin, signal = %message.signal, "sibling session changed, reloading");
                reload.reload();
            }
        }))
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
