use bytes::Bytes;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval, Duration};
use tokio::{signal, task};

use ntrip_client::nmea::{gga_sentence, GgaFix};
use ntrip_client::{ClientConfig, ConnectionState, NtripClient, PositionReporter};

// Matches the caster's reporting interval so every report carries a fresh time.
const GGA_REFRESH_MS: u64 = 1000;

pub async fn run(config: ClientConfig, fix: Option<GgaFix>, raw: bool) -> Result<(), Box<dyn std::error::Error>> {
  let mut client = NtripClient::new();
  client.configure(config)?;

  if let Some(fix) = fix {
    client.update_position_report(gga_sentence(&fix, Utc::now()));
  }

  let corrections = client.subscribe_corrections();

  client.run().await?;

  let sink = task::spawn(forward_corrections(corrections, raw));
  let refresher = fix.map(|fix| task::spawn(refresh_position(client.position_reporter(), fix)));

  tracing::info!("NTRIP client is running. Press Ctrl+C to stop.");

  let mut state = client.state_changes();

  tokio::select! {
    result = signal::ctrl_c() => {
      result?;
      tracing::info!("Ctrl-C received, shutting down...");
    }
    _ = state.wait_for(|state| *state == ConnectionState::Stopped) => {}
  }

  if let Some(refresher) = refresher {
    refresher.abort();
  }

  let outcome = client.stop().await;

  // Dropping the client closes the corrections channel and lets the sink drain.
  drop(client);
  if let Err(e) = sink.await {
    tracing::error!("Correction output task failed: {}", e);
  }

  outcome?;

  Ok(())
}

async fn refresh_position(reporter: PositionReporter, fix: GgaFix) {
  let mut ticker = interval(Duration::from_millis(GGA_REFRESH_MS));

  loop {
    ticker.tick().await;
    reporter.update(gga_sentence(&fix, Utc::now()));
  }
}

async fn forward_corrections(mut corrections: broadcast::Receiver<Bytes>, raw: bool) {
  let mut stdout = tokio::io::stdout();
  let mut total: usize = 0;

  loop {
    match corrections.recv().await {
      Ok(chunk) => {
        total += chunk.len();

        if !raw {
          tracing::info!(bytes = chunk.len(), total, "Correction data received");
          continue;
        }

        if let Err(e) = stdout.write_all(&chunk).await {
          tracing::error!("Could not write corrections to stdout: {}", e);
          break;
        }

        let _ = stdout.flush().await;
      }
      Err(RecvError::Lagged(skipped)) => {
        tracing::warn!(skipped, "Correction output fell behind, chunks dropped");
      }
      Err(RecvError::Closed) => break,
    }
  }
}
