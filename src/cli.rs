use crate::commands;

use std::process::ExitCode;
use clap::{Args, Parser, Subcommand};
use ntrip_client::nmea::GgaFix;
use ntrip_client::ntrip::config::DEFAULT_PORT;
use ntrip_client::ClientConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
  /// Log more (repeat for trace output)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  pub verbose: u8,

  /// Subcommands
  #[command(subcommand)]
  pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
  /// Connects to a caster mountpoint and streams correction data
  Stream {
    #[command(flatten)]
    caster: CasterArgs,

    #[command(flatten)]
    position: PositionArgs,

    /// Write received corrections to stdout instead of logging their size
    #[arg(long)]
    raw: bool,
  },

  /// Prints a GGA sentence for the given position
  Gga {
    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true, value_parser = parse_latitude)]
    lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true, value_parser = parse_longitude)]
    lon: f64,

    /// Altitude in metres
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
    alt: f64,
  },
}

#[derive(Args)]
pub struct CasterArgs {
  /// Caster host name or IPv4 address
  #[arg(long)]
  pub host: String,

  /// Caster port
  #[arg(short, long, default_value_t = DEFAULT_PORT)]
  pub port: u16,

  /// Mountpoint to stream from
  #[arg(short, long)]
  pub mountpoint: String,

  /// Caster user name
  #[arg(short, long, default_value = "")]
  pub user: String,

  /// Caster password
  #[arg(long, env = "NTRIP_PASSWORD", default_value = "", hide_env_values = true)]
  pub password: String,
}

impl CasterArgs {
  fn to_config(&self) -> ClientConfig {
    ClientConfig::new(
      self.host.clone(),
      self.port,
      self.mountpoint.clone(),
      self.user.clone(),
      self.password.clone(),
    )
  }
}

#[derive(Args)]
pub struct PositionArgs {
  /// Rover latitude in decimal degrees, enables GGA reports
  #[arg(long, requires = "lon", allow_negative_numbers = true, value_parser = parse_latitude)]
  pub lat: Option<f64>,

  /// Rover longitude in decimal degrees
  #[arg(long, requires = "lat", allow_negative_numbers = true, value_parser = parse_longitude)]
  pub lon: Option<f64>,

  /// Rover altitude in metres
  #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
  pub alt: f64,
}

impl PositionArgs {
  fn fix(&self) -> Option<GgaFix> {
    match (self.lat, self.lon) {
      (Some(lat), Some(lon)) => Some(GgaFix::new(lat, lon, self.alt)),
      _ => None,
    }
  }
}

fn parse_latitude(s: &str) -> Result<f64, String> {
  parse_degrees(s, 90.0)
}

fn parse_longitude(s: &str) -> Result<f64, String> {
  parse_degrees(s, 180.0)
}

fn parse_degrees(s: &str, limit: f64) -> Result<f64, String> {
  let value: f64 = s
    .parse()
    .map_err(|_| format!("'{}' is not a number", s))?;

  if !(-limit..=limit).contains(&value) {
    return Err(format!("{} is outside -{}..{}", value, limit, limit));
  }

  Ok(value)
}

pub struct CommandHandler {
  cli: Cli
}

impl CommandHandler {
  pub fn new () -> Self {
    Self {
      cli: Cli::parse()
    }
  }

  pub fn verbosity(&self) -> u8 {
    self.cli.verbose
  }

  /// Depending on the subcommand, perform the action
  pub async fn run (&self) -> ExitCode {
    match &self.cli.command {
      Commands::Stream { caster, position, raw } => {
        self.handle_stream(caster, position, *raw).await
      }
      Commands::Gga { lat, lon, alt } => {
        commands::gga::run(GgaFix::new(*lat, *lon, *alt));
        ExitCode::SUCCESS
      }
    }
  }

  /// Streams corrections until Ctrl-C or until the caster goes away.
  async fn handle_stream(&self, caster: &CasterArgs, position: &PositionArgs, raw: bool) -> ExitCode {
    match commands::stream::run(caster.to_config(), position.fix(), raw).await {
      Ok(_) => ExitCode::SUCCESS,
      Err(e) => {
        tracing::error!("NTRIP session failed: {}", e);
        ExitCode::FAILURE
      }
    }
  }
}
