use base64::{engine::general_purpose, Engine as _};

/// Value of the `Authorization: Basic` header for the given credentials.
pub fn basic_auth(username: &str, password: &str) -> String {
  encode(format!("{}:{}", username, password))
}

/// Standard-alphabet Base64 with `=` padding.
pub fn encode(input: impl AsRef<[u8]>) -> String {
  general_purpose::STANDARD.encode(input)
}
