use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{NtripError, Result};

/// Lifecycle of one client.
///
/// Transitions only move forward, except that a `Stopped` client may be
/// connected again by a later `run()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
  Uninitialized,
  Connected,
  Authenticated,
  Running,
  Stopped,
}

impl ConnectionState {
  pub fn can_transition_to(self, next: ConnectionState) -> bool {
    use ConnectionState::*;

    matches!(
      (self, next),
      (Uninitialized, Connected)
        | (Stopped, Connected)
        | (Connected, Authenticated)
        | (Authenticated, Running)
        | (Connected, Stopped)
        | (Authenticated, Stopped)
        | (Running, Stopped)
    )
  }

  /// True while a socket is held by the client or its streaming task.
  pub fn is_active(self) -> bool {
    matches!(
      self,
      ConnectionState::Connected | ConnectionState::Authenticated | ConnectionState::Running
    )
  }
}

/// Shared, observable holder of the client's `ConnectionState`.
///
/// Every transition goes through `advance`, so the allowed edges are checked
/// in one place for both the connection manager and the streaming loop.
#[derive(Clone)]
pub struct StateCell {
  tx: Arc<watch::Sender<ConnectionState>>,
}

impl StateCell {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(ConnectionState::Uninitialized);

    StateCell { tx: Arc::new(tx) }
  }

  pub fn get(&self) -> ConnectionState {
    *self.tx.borrow()
  }

  pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
    self.tx.subscribe()
  }

  pub fn advance(&self, next: ConnectionState) -> Result<()> {
    let mut outcome = Ok(());

    self.tx.send_if_modified(|current| {
      if current.can_transition_to(next) {
        tracing::debug!(from = ?current, to = ?next, "state transition");
        *current = next;
        true
      } else {
        outcome = Err(NtripError::InvalidTransition { from: *current, to: next });
        false
      }
    });

    outcome
  }

  /// Moves an active client to `Stopped`; any other state is left alone.
  pub fn stop(&self) {
    if self.get().is_active() {
      let _ = self.advance(ConnectionState::Stopped);
    }
  }
}

impl Default for StateCell {
  fn default() -> Self {
    Self::new()
  }
}
