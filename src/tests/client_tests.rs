use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

use super::mock_caster::{Behavior, MockCaster};
use crate::error::NtripError;
use crate::ntrip::{ClientConfig, ConnectionState, NtripClient, Timings};

const ICY_OK: &str = "ICY 200 OK\r\n\r\n";

const RTCM: &[u8] = b"\xd3\x00\x13rtcm";

const SPLIT_HEADER: &[&[u8]] = &[b"HTTP/1.1 200 OK\r\n", b"Content-Type: gnss/data\r\n\r\n", RTCM];

const REPLY_WITH_DATA: &[&[u8]] = &[b"ICY 200 OK\r\n\r\n\xd3\x00\x13rtcm"];

fn short_timings() -> Timings {
  Timings {
    handshake_attempts: 10,
    handshake_poll: Duration::from_millis(20),
    ..Timings::default()
  }
}

#[tokio::test]
async fn test_run_sends_request_and_stored_report() {
  let caster = MockCaster::start(Behavior::Reply(ICY_OK)).await;
  let mut client = NtripClient::with_config(caster.config());

  client.update_position_report("$GPGGA,INIT*00\r\n");
  client.run().await.unwrap();

  assert!(client.is_running());
  assert_eq!(client.state(), ConnectionState::Running);

  client.stop().await.unwrap();
  let captured = caster.finish().await;

  assert_eq!(
    captured.request,
    "GET /MOUNT HTTP/1.1\r\n\
    User-Agent: NTRIP NTRIPClient/1.2.0\r\n\
    Authorization: Basic dXNlcjpwYXNz\r\n\
    \r\n"
  );
  // Only the report sent right after authentication, the interval never fired.
  assert_eq!(captured.stream, b"$GPGGA,INIT*00\r\n");
}

#[tokio::test]
async fn test_http_ok_is_accepted() {
  let caster = MockCaster::start(Behavior::Reply("HTTP/1.1 200 OK\r\nContent-Type: gnss/data\r\n\r\n")).await;
  let mut client = NtripClient::with_config(caster.config());

  client.run().await.unwrap();
  assert!(client.is_running());

  client.stop().await.unwrap();
  let captured = caster.finish().await;

  assert!(captured.stream.is_empty());
}

#[tokio::test]
async fn test_silent_caster_times_out() {
  let caster = MockCaster::start(Behavior::Silent).await;
  let timings = short_timings();
  let mut client = NtripClient::with_config(caster.config()).with_timings(timings);

  let started = Instant::now();
  let result = client.run().await;

  assert!(matches!(result, Err(NtripError::HandshakeTimeout { attempts: 10 })));
  assert!(started.elapsed() >= timings.handshake_budget() - timings.handshake_poll);
  assert!(!client.is_running());
  assert_eq!(client.state(), ConnectionState::Stopped);

  // The caster sees the socket close.
  caster.finish().await;
}

#[tokio::test]
async fn test_caster_closing_fails_fast() {
  let caster = MockCaster::start(Behavior::Close).await;
  let mut client = NtripClient::with_config(caster.config());

  let started = Instant::now();
  let result = client.run().await;

  assert!(matches!(result, Err(NtripError::PeerClosed) | Err(NtripError::Io(_))));
  assert!(started.elapsed() < Timings::default().handshake_budget() / 2);
  assert!(!client.is_running());
  assert_eq!(client.state(), ConnectionState::Stopped);
}

#[tokio::test]
async fn test_rejected_request_fails_fast() {
  let caster = MockCaster::start(Behavior::Reply("HTTP/1.1 401 Unauthorized\r\n\r\n")).await;
  let mut client = NtripClient::with_config(caster.config());

  let started = Instant::now();
  let result = client.run().await;

  match result {
    Err(NtripError::Rejected { status }) => assert_eq!(status, "HTTP/1.1 401 Unauthorized"),
    other => panic!("unexpected result: {:?}", other),
  }
  assert!(started.elapsed() < Duration::from_secs(1));
  assert_eq!(client.state(), ConnectionState::Stopped);

  caster.finish().await;
}

#[tokio::test]
async fn test_report_sent_once_per_interval() {
  let caster = MockCaster::start(Behavior::Reply(ICY_OK)).await;
  let mut client = NtripClient::with_config(caster.config());

  client.run().await.unwrap();
  client.update_position_report("$X*1\r\n");

  sleep(Duration::from_millis(1250)).await;
  client.stop().await.unwrap();

  let captured = caster.finish().await;
  assert_eq!(captured.stream, b"$X*1\r\n");
}

#[tokio::test]
async fn test_only_latest_report_is_sent() {
  let caster = MockCaster::start(Behavior::Reply(ICY_OK)).await;
  let mut client = NtripClient::with_config(caster.config());

  client.run().await.unwrap();

  let reporter = client.position_reporter();
  std::thread::spawn(move || {
    for i in 0..100 {
      reporter.update(format!("$X*{}\r\n", i));
    }
  })
  .join()
  .unwrap();

  sleep(Duration::from_millis(1250)).await;
  client.stop().await.unwrap();

  let captured = caster.finish().await;
  assert_eq!(captured.stream, b"$X*99\r\n");
}

#[tokio::test]
async fn test_stop_is_prompt_and_closes_socket() {
  let caster = MockCaster::start(Behavior::Reply(ICY_OK)).await;
  let mut client = NtripClient::with_config(caster.config());

  client.run().await.unwrap();
  sleep(Duration::from_millis(50)).await;

  let started = Instant::now();
  client.stop().await.unwrap();

  assert!(started.elapsed() < Duration::from_millis(200));
  assert!(!client.is_running());
  assert_eq!(client.state(), ConnectionState::Stopped);

  caster.finish().await;

  // A second stop has nothing left to do.
  client.stop().await.unwrap();
}

#[tokio::test]
async fn test_corrections_are_passed_through() {
  let caster = MockCaster::start(Behavior::ReplyThenSend(ICY_OK, RTCM)).await;
  let mut client = NtripClient::with_config(caster.config());
  let mut corrections = client.subscribe_corrections();

  client.run().await.unwrap();

  let chunk = timeout(Duration::from_secs(2), corrections.recv())
    .await
    .expect("no correction data")
    .unwrap();
  assert_eq!(&chunk[..], RTCM);

  client.stop().await.unwrap();
  caster.finish().await;
}

#[tokio::test]
async fn test_headers_in_later_read_are_not_corrections() {
  let caster = MockCaster::start(Behavior::Script(SPLIT_HEADER)).await;
  let mut client = NtripClient::with_config(caster.config());
  let mut corrections = client.subscribe_corrections();

  client.run().await.unwrap();

  let chunk = timeout(Duration::from_secs(2), corrections.recv())
    .await
    .expect("no correction data")
    .unwrap();
  assert_eq!(&chunk[..], RTCM);

  client.stop().await.unwrap();
  caster.finish().await;
}

#[tokio::test]
async fn test_data_sent_with_reply_is_forwarded() {
  let caster = MockCaster::start(Behavior::Script(REPLY_WITH_DATA)).await;
  let mut client = NtripClient::with_config(caster.config());
  let mut corrections = client.subscribe_corrections();

  client.run().await.unwrap();

  let chunk = timeout(Duration::from_secs(2), corrections.recv())
    .await
    .expect("no correction data")
    .unwrap();
  assert_eq!(&chunk[..], RTCM);

  client.stop().await.unwrap();
  caster.finish().await;
}

#[tokio::test]
async fn test_connection_reset_ends_session_with_io_error() {
  let caster = MockCaster::start(Behavior::ReplyThenReset(ICY_OK)).await;
  let mut client = NtripClient::with_config(caster.config());
  let mut state = client.state_changes();

  client.run().await.unwrap();

  timeout(Duration::from_secs(2), state.wait_for(|state| *state == ConnectionState::Stopped))
    .await
    .expect("session did not end")
    .unwrap();

  assert!(matches!(client.stop().await, Err(NtripError::Io(_))));
  assert_eq!(client.state(), ConnectionState::Stopped);

  caster.finish().await;
}

#[tokio::test]
async fn test_caster_hangup_ends_session() {
  let caster = MockCaster::start(Behavior::ReplyThenClose(ICY_OK)).await;
  let mut client = NtripClient::with_config(caster.config());
  let mut state = client.state_changes();

  client.run().await.unwrap();

  timeout(Duration::from_secs(2), state.wait_for(|state| *state == ConnectionState::Stopped))
    .await
    .expect("session did not end")
    .unwrap();

  assert!(!client.is_running());
  assert!(matches!(client.stop().await, Err(NtripError::PeerClosed) | Err(NtripError::Io(_))));
}

#[tokio::test]
async fn test_run_restarts_running_session() {
  let first = MockCaster::start(Behavior::Reply(ICY_OK)).await;
  let second = MockCaster::start(Behavior::Reply(ICY_OK)).await;
  let mut client = NtripClient::with_config(first.config());

  client.run().await.unwrap();
  client.configure(second.config()).unwrap();
  client.run().await.unwrap();

  assert!(client.is_running());
  first.finish().await;

  client.stop().await.unwrap();
  second.finish().await;
}

#[tokio::test]
async fn test_run_requires_config() {
  let mut client = NtripClient::new();

  assert!(matches!(client.run().await, Err(NtripError::NotConfigured)));
  assert_eq!(client.state(), ConnectionState::Uninitialized);
}

#[tokio::test]
async fn test_configure_rejects_missing_mountpoint() {
  let mut client = NtripClient::new();
  let result = client.configure(ClientConfig::new("127.0.0.1", 2101, "/", "user", "pass"));

  assert!(matches!(result, Err(NtripError::InvalidConfig(_))));
  assert!(client.config().is_none());
}

#[tokio::test]
async fn test_connect_failure_leaves_state_untouched() {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let port = listener.local_addr().unwrap().port();
  drop(listener);

  let mut client = NtripClient::with_config(ClientConfig::new("127.0.0.1", port, "MOUNT", "user", "pass"));

  assert!(matches!(client.run().await, Err(NtripError::Connect { .. })));
  assert_eq!(client.state(), ConnectionState::Uninitialized);
}

#[tokio::test]
async fn test_host_without_ipv4_leaves_state_untouched() {
  let mut client = NtripClient::with_config(ClientConfig::new("::1", 2101, "MOUNT", "user", "pass"));

  assert!(matches!(
    client.run().await,
    Err(NtripError::NoIpv4Address(_)) | Err(NtripError::Resolve { .. })
  ));
  assert_eq!(client.state(), ConnectionState::Uninitialized);
  assert!(!client.is_running());
}
