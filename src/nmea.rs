use chrono::{DateTime, Timelike, Utc};

/// Fix quality, satellites, HDOP and geoid separation reported in every
/// sentence. Casters only look at the position.
const GGA_FIXED_FIELDS: &str = "1,30,1.2";
const GEOID_SEPARATION: &str = "-2.860";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GgaFix {
  /// Decimal degrees, north positive.
  pub latitude: f64,
  /// Decimal degrees, east positive.
  pub longitude: f64,
  /// Metres.
  pub altitude: f64,
}

impl GgaFix {
  pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
    Self { latitude, longitude, altitude }
  }
}

/// Builds a `$GPGGA` sentence for `fix` at `time`, CRLF terminated.
pub fn gga_sentence(fix: &GgaFix, time: DateTime<Utc>) -> String {
  // Leap seconds report nanoseconds above 1e9.
  let hundredths = (time.nanosecond() / 10_000_000).min(99);

  let body = format!(
    "GPGGA,{:02}{:02}{:02}.{:02},{:012.7},{},{:013.7},{},{},{:.4},M,{},M,,0000",
    time.hour(),
    time.minute(),
    time.second(),
    hundredths,
    to_ddmm(fix.latitude),
    if fix.latitude > 0.0 { 'N' } else { 'S' },
    to_ddmm(fix.longitude),
    if fix.longitude > 0.0 { 'E' } else { 'W' },
    GGA_FIXED_FIELDS,
    fix.altitude,
    GEOID_SEPARATION,
  );

  format!("${}*{:02X}\r\n", body, checksum(&body))
}

/// XOR of every byte between `$` and `*`.
pub fn checksum(body: &str) -> u8 {
  body.bytes().fold(0, |acc, byte| acc ^ byte)
}

/// Decimal degrees to the NMEA `DDDMM.mmmm` form, sign dropped.
fn to_ddmm(degrees: f64) -> f64 {
  let degrees = degrees.abs();
  let whole = degrees.trunc();

  whole * 100.0 + (degrees - whole) * 60.0
}
