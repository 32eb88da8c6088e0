//! Connection role registry.
//!
//! Two roles: `Desktop` (the single authority that owns audio playback and
//! receives transport-control forwards) and `Remote` (any number of
//! observer/controller clients). The role comes from which WebSocket route a
//! connection used, never from message content.

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Desktop,
    Remote,
}

/// Handle to one live connection: its identity, role, and the sender feeding
/// the socket's writer task. Cloneable so background jobs (copy) can stream
/// events to a specific client without going through the dispatcher.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub id: ClientId,
    pub role: Role,
    tx: mpsc::UnboundedSender<String>,
}

impl ClientHandle {
    pub fn new(id: ClientId, role: Role, tx: mpsc::UnboundedSender<String>) -> Self {
        ClientHandle { id, role, tx }
    }

    /// Queue a message for this connection. Returns false when the socket's
    /// writer is gone; the registry cleans up on the disconnect event.
    pub fn send(&self, message: impl Into<String>) -> bool {
        self.tx.send(message.into()).is_ok()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    desktop: Option<ClientHandle>,
    remotes: Vec<ClientHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. A new desktop supersedes the previous one —
    /// the old handle is returned so the caller can notify it; its socket
    /// stays open but it stops being the transport-control target.
    pub fn register(&mut self, handle: ClientHandle) -> Option<ClientHandle> {
        match handle.role {
            Role::Desktop => self.desktop.replace(handle),
            Role::Remote => {
                self.remotes.push(handle);
                None
            }
        }
    }

    /// Remove by identity. A superseded desktop disconnecting later must not
    /// clear the newer registration, hence the id check.
    pub fn unregister(&mut self, id: ClientId) {
        if self.desktop.as_ref().is_some_and(|d| d.id == id) {
            self.desktop = None;
        }
        self.remotes.retain(|r| r.id != id);
    }

    pub fn desktop(&self) -> Option<&ClientHandle> {
        self.desktop.as_ref()
    }

    pub fn find(&self, id: ClientId) -> Option<&ClientHandle> {
        if self.desktop.as_ref().is_some_and(|d| d.id == id) {
            return self.desktop.as_ref();
        }
        self.remotes.iter().find(|r| r.id == id)
    }

    pub fn broadcast_all(&self, message: &str) {
        if let Some(desktop) = &self.desktop {
            desktop.send(message);
        }
        for remote in &self.remotes {
            remote.send(message);
        }
    }

    pub fn broadcast_remotes(&self, message: &str) {
        for remote in &self.remotes {
            remote.send(message);
        }
    }
}
