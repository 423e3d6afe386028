//! Rover-side NTRIP client.
//!
//! Connects to a caster mountpoint, authenticates, then streams correction
//! data in the background while periodically sending the rover's position
//! as a GGA sentence.
//!
//! ```ignore
//! use ntrip_client::{ClientConfig, NtripClient};
//!
//! let mut client = NtripClient::with_config(ClientConfig::new("caster.example", 2101, "MOUNT", "user", "pass"));
//! client.update_position_report("$GPGGA,...*47\r\n");
//! client.run().await?;
//! // ...
//! client.stop().await?;
//! ```

pub mod error;
pub mod logging;
pub mod nmea;
pub mod ntrip;

#[cfg(test)]
mod tests;

pub use error::{NtripError, Result};
pub use ntrip::{ClientConfig, ConnectionState, KeepaliveConfig, NtripClient, PositionReporter, Timings};
