use chrono::Utc;
use ntrip_client::nmea::{gga_sentence, GgaFix};

pub fn run(fix: GgaFix) {
  print!("{}", gga_sentence(&fix, Utc::now()));
}
