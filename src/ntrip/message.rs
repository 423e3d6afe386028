use super::config::ClientConfig;
use super::credentials::basic_auth;

/// Size of a single receive from the caster.
pub const RECV_BUFFER_SIZE: usize = 4096;

/// Reply bytes read while waiting for a decision before giving up on it.
pub const MAX_REPLY_HEADER: usize = 16 * 1024;

/// Replies that accept the request, wherever they appear in the first bytes.
const ACCEPT_MARKERS: [&str; 2] = ["HTTP/1.1 200 OK", "ICY 200 OK"];

/// Builds the NTRIP request sent right after connecting.
pub fn handshake_request(config: &ClientConfig, user_agent: &str) -> String {
  format!(
    "GET /{} HTTP/1.1\r\n\
    User-Agent: {}\r\n\
    Authorization: Basic {}\r\n\
    \r\n",
    config.mountpoint(),
    user_agent,
    basic_auth(&config.username, &config.password)
  )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeReply {
  /// Stream granted. The reply header takes the first `header_len` bytes,
  /// anything after it is already correction data.
  Accepted { header_len: usize },
  /// Stream granted, but the header block has not ended yet.
  AwaitingHeaders,
  /// A complete status line that does not grant the stream.
  Rejected(String),
  /// Not enough bytes yet to decide.
  Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
  /// NTRIP 1.0, no header block after the status line.
  Icy,
  /// NTRIP 2.0, headers end with a blank line.
  Http,
}

impl HandshakeReply {
  /// Classifies everything received from the caster so far.
  ///
  /// The first complete line decides when it is a status line. Otherwise a
  /// success marker anywhere in the buffer is enough.
  pub fn parse(buffer: &[u8]) -> Self {
    let line_start = buffer
      .iter()
      .position(|byte| *byte != b'\r' && *byte != b'\n')
      .unwrap_or(buffer.len());

    let Some(line_len) = find(&buffer[line_start..], b"\n") else {
      return match find_marker(buffer) {
        Some(_) => HandshakeReply::AwaitingHeaders,
        None => HandshakeReply::Incomplete,
      };
    };

    let status = String::from_utf8_lossy(&buffer[line_start..line_start + line_len]);
    let status = status.trim();

    if let Some(kind) = reply_kind(status) {
      return header_end(buffer, line_start, line_start + line_len + 1, kind);
    }

    match find_marker(buffer) {
      Some(offset) if offset > 0 => HandshakeReply::parse(&buffer[offset..]).shifted(offset),
      _ => HandshakeReply::Rejected(status.to_string()),
    }
  }

  fn shifted(self, offset: usize) -> Self {
    match self {
      HandshakeReply::Accepted { header_len } => HandshakeReply::Accepted { header_len: header_len + offset },
      other => other,
    }
  }
}

// `SOURCETABLE 200 OK` is a 200 too, but it means the mountpoint is unknown.
fn reply_kind(line: &str) -> Option<ReplyKind> {
  let mut parts = line.split_whitespace();

  match (parts.next(), parts.next()) {
    (Some("ICY"), Some("200")) => Some(ReplyKind::Icy),
    (Some(protocol), Some("200")) if protocol.starts_with("HTTP/1.") => Some(ReplyKind::Http),
    _ => None,
  }
}

fn header_end(buffer: &[u8], line_start: usize, status_end: usize, kind: ReplyKind) -> HandshakeReply {
  match kind {
    ReplyKind::Icy => {
      let rest = &buffer[status_end..];
      let blank = if rest.starts_with(b"\r\n") {
        2
      } else if rest.starts_with(b"\n") {
        1
      } else {
        0
      };

      HandshakeReply::Accepted { header_len: status_end + blank }
    }
    ReplyKind::Http => {
      let head = &buffer[line_start..];
      let crlf = find(head, b"\r\n\r\n").map(|at| at + 4);
      let lf = find(head, b"\n\n").map(|at| at + 2);

      match crlf.into_iter().chain(lf).min() {
        Some(len) => HandshakeReply::Accepted { header_len: line_start + len },
        None => HandshakeReply::AwaitingHeaders,
      }
    }
  }
}

fn find_marker(buffer: &[u8]) -> Option<usize> {
  ACCEPT_MARKERS
    .iter()
    .filter_map(|marker| find(buffer, marker.as_bytes()))
    .min()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
  haystack.windows(needle.len()).position(|window| window == needle)
}
