pub mod gga;
pub mod stream;
