use std::io::{self, ErrorKind};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use super::config::Timings;
use super::message::RECV_BUFFER_SIZE;
use super::state::{ConnectionState, StateCell};
use crate::error::{NtripError, Result};

/// Background half of the client: owns the authenticated socket, forwards
/// correction data and re-sends the position report on a fixed interval.
pub struct StreamingLoop {
  stream: TcpStream,
  report: watch::Receiver<Bytes>,
  corrections: broadcast::Sender<Bytes>,
  state: StateCell,
  cancel: CancellationToken,
  timings: Timings,
  pending: Bytes,
}

impl StreamingLoop {
  pub fn new(
    stream: TcpStream,
    report: watch::Receiver<Bytes>,
    corrections: broadcast::Sender<Bytes>,
    state: StateCell,
    cancel: CancellationToken,
    timings: Timings,
  ) -> Self {
    Self {
      stream,
      report,
      corrections,
      state,
      cancel,
      timings,
      pending: Bytes::new(),
    }
  }

  /// Correction data that arrived together with the caster's reply. It is
  /// forwarded before anything else is read from the socket.
  pub fn with_pending(mut self, pending: Bytes) -> Self {
    self.pending = pending;
    self
  }

  /// Runs until cancelled or until the socket fails.
  ///
  /// The socket is closed before this returns and the state ends up `Stopped`
  /// whatever the outcome.
  pub async fn run(self) -> Result<()> {
    let state = self.state.clone();
    let outcome = self.stream_until_stopped().await;

    state.stop();

    match &outcome {
      Ok(()) => tracing::info!("NTRIP streaming stopped"),
      Err(e) => tracing::warn!("NTRIP streaming ended: {}", e),
    }

    outcome
  }

  async fn stream_until_stopped(mut self) -> Result<()> {
    let current = self.state.get();

    if current != ConnectionState::Running {
      tracing::error!(state = ?current, "Streaming loop entered before authentication");
      return Err(NtripError::InvalidState(current));
    }

    let mut buffer = vec![0u8; RECV_BUFFER_SIZE];
    let mut last_report = Instant::now();

    tracing::info!("NTRIP streaming running");

    if !self.pending.is_empty() {
      let pending = std::mem::take(&mut self.pending);
      self.forward(pending);
    }

    while !self.cancel.is_cancelled() {
      match self.stream.try_read(&mut buffer) {
        Ok(0) => {
          tracing::warn!("Remote socket closed");
          return Err(NtripError::PeerClosed);
        }
        Ok(len) => self.forward(Bytes::copy_from_slice(&buffer[..len])),
        Err(e) if is_transient(&e) => {}
        Err(e) => {
          tracing::error!("Remote socket error: {}", e);
          return Err(e.into());
        }
      }

      if last_report.elapsed() >= self.timings.report_interval {
        last_report = Instant::now();
        self.send_report().await?;
      }

      tokio::select! {
        _ = self.cancel.cancelled() => break,
        _ = sleep(self.timings.loop_period) => {}
      }
    }

    Ok(())
  }

  fn forward(&self, data: Bytes) {
    tracing::trace!(bytes = data.len(), "correction data received");

    // Nobody listening is fine, the data is simply dropped.
    let _ = self.corrections.send(data);
  }

  async fn send_report(&mut self) -> Result<()> {
    let report = self.report.borrow_and_update().clone();

    if report.is_empty() {
      return Ok(());
    }

    if let Err(e) = self.stream.write_all(&report).await {
      tracing::error!("Could not send position report: {}", e);
      return Err(e.into());
    }

    tracing::debug!(bytes = report.len(), "position report sent");

    Ok(())
  }
}

/// Receive outcomes that only mean "nothing to read right now".
pub(crate) fn is_transient(error: &io::Error) -> bool {
  matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted)
}
