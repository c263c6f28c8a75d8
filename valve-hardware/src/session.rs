//! Device session - owns the serial connection to the valve controller
//!
//! The session opens the port lazily, re-checks it on every call and drops it
//! as soon as it misbehaves, so a controller that is unplugged and plugged
//! back in is picked up by the next command without restarting anything.
//!
//! Every operation runs under one async mutex: two writers on the same serial
//! line would interleave bytes and corrupt the command stream.

use crate::discovery::{port_hint, PortDiscovery};
use crate::serial_driver::{SerialOpener, SerialTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use valve_core::{DeviceConfig, Result, Score, SendOutcome, ValveError};

/// Poll interval while waiting for the end of a partially received line
const LINE_POLL_INTERVAL: Duration = Duration::from_millis(10);

type Link = Box<dyn SerialTransport>;

/// Serialized access to the single valve controller
pub struct DeviceSession {
    config: DeviceConfig,
    opener: Arc<dyn SerialOpener>,
    discovery: Arc<dyn PortDiscovery>,
    link: Mutex<Option<Link>>,
}

impl DeviceSession {
    /// Create a disconnected session; nothing is opened until first use
    pub fn new(
        config: DeviceConfig,
        opener: Arc<dyn SerialOpener>,
        discovery: Arc<dyn PortDiscovery>,
    ) -> Self {
        Self {
            config,
            opener,
            discovery,
            link: Mutex::new(None),
        }
    }

    /// Configured port identifier
    pub fn port(&self) -> &str {
        &self.config.port
    }

    /// Whether a usable handle is held right now; never opens the port
    pub async fn is_connected(&self) -> bool {
        self.link
            .lock()
            .await
            .as_ref()
            .is_some_and(|link| link.is_connected())
    }

    /// Open the port unless a usable handle is already held.
    ///
    /// Failure is expected while the controller is unplugged and leaves the
    /// session ready for the next attempt.
    pub async fn ensure_connected(&self) -> Result<()> {
        let mut slot = self.link.lock().await;
        self.connect_locked(&mut slot).await?;
        Ok(())
    }

    /// Command the valve to `score` percent and return the device's answer.
    ///
    /// Never fails: validation, connection and I/O problems all come back as
    /// an unsuccessful [`SendOutcome`].
    pub async fn send(&self, score: i64) -> SendOutcome {
        let score = match Score::new(score) {
            Ok(score) => score,
            Err(e) => {
                debug!("Rejected score {}: {}", score, e);
                return SendOutcome::failed(e.to_string());
            }
        };

        self.send_score(score).await
    }

    /// Same as [`DeviceSession::send`] for an already validated score
    pub async fn send_score(&self, score: Score) -> SendOutcome {
        let mut slot = self.link.lock().await;

        let result = match self.connect_locked(&mut slot).await {
            Ok(link) => self.round_trip(link, score).await,
            Err(e) => return SendOutcome::failed(format!("No Arduino connection: {}", e)),
        };

        match result {
            Ok(replies) => match replies.last().cloned() {
                Some(reply) => {
                    info!("Valve set to {}%", score);
                    SendOutcome::delivered(reply).with_replies(replies)
                }
                None => {
                    info!("Valve set to {}% (no reply)", score);
                    SendOutcome::delivered(format!("Score {} sent to Arduino", score))
                }
            },
            Err(e) => {
                warn!("Lost connection to {}: {}", self.config.port, e);
                // Never keep a handle that failed mid-command
                *slot = None;
                SendOutcome::failed(format!("Error sending to Arduino: {}", e))
            }
        }
    }

    /// Close the valve
    pub async fn reset(&self) -> SendOutcome {
        self.send_score(Score::CLOSED).await
    }

    /// Close the valve and release the port.
    ///
    /// Best effort and infallible; a session without an open handle is left
    /// untouched.
    pub async fn close(&self) {
        let mut slot = self.link.lock().await;

        let Some(mut link) = slot.take() else {
            debug!("No open serial connection to close");
            return;
        };

        if link.is_connected() {
            info!("Closing valve and serial connection...");
            if let Err(e) = link.write_line(&Score::CLOSED.to_command()).await {
                warn!("Failed to close valve: {}", e);
            }
            sleep(self.config.close_settle()).await;
        }

        if let Err(e) = link.shutdown().await {
            debug!("Error while releasing {}: {}", self.config.port, e);
        }
        info!("Serial connection closed");
    }

    async fn connect_locked<'a>(&self, slot: &'a mut Option<Link>) -> Result<&'a mut Link> {
        if slot.as_ref().is_some_and(|link| !link.is_connected()) {
            info!(
                "Serial handle on {} is no longer open, reconnecting",
                self.config.port
            );
            *slot = None;
        }

        if slot.is_none() {
            *slot = Some(self.open_link().await?);
        }

        slot.as_mut().ok_or_else(|| ValveError::Connect {
            port: self.config.port.clone(),
            cause: "connection dropped".to_string(),
        })
    }

    async fn open_link(&self) -> Result<Link> {
        let port = &self.config.port;

        let mut link = match self.opener.open(port, self.config.baud_rate) {
            Ok(link) => link,
            Err(e) => {
                let e = match e {
                    connect @ ValveError::Connect { .. } => connect,
                    other => ValveError::Connect {
                        port: port.clone(),
                        cause: other.to_string(),
                    },
                };
                warn!("{}", e);
                warn!("{}", port_hint(&self.discovery.list_ports()));
                return Err(e);
            }
        };

        // Opening the port resets the board; give the firmware time to boot
        sleep(self.config.connect_settle()).await;

        match drain_lines(link.as_mut(), self.config.read_timeout()).await {
            Ok(lines) => {
                for line in lines {
                    info!("Arduino: {}", line);
                }
            }
            Err(e) => {
                warn!("Device on {} failed right after opening: {}", port, e);
                return Err(ValveError::Connect {
                    port: port.clone(),
                    cause: e.to_string(),
                });
            }
        }

        info!("Connected to Arduino on {}", port);
        Ok(link)
    }

    async fn round_trip(&self, link: &mut Link, score: Score) -> Result<Vec<String>> {
        link.write_line(&score.to_command()).await?;
        sleep(self.config.response_settle()).await;

        let lines = drain_lines(link.as_mut(), self.config.read_timeout()).await?;
        for line in &lines {
            info!("Arduino: {}", line);
        }
        Ok(lines)
    }
}

/// Read every buffered reply line without waiting for new ones.
///
/// The pending-byte count is checked before each read. A trailing line
/// without terminator is given up to `timeout` to complete, and the whole
/// drain never runs past `timeout`: a device that keeps talking gets cut
/// off and whatever arrived so far is returned.
async fn drain_lines(link: &mut dyn SerialTransport, timeout: Duration) -> Result<Vec<String>> {
    let deadline = Instant::now() + timeout;
    let mut buf = Vec::new();

    loop {
        if link.bytes_to_read()? > 0 {
            buf.extend(link.read_available().await?);
            if Instant::now() >= deadline {
                debug!("Device still sending after {:?}, stopping drain", timeout);
                break;
            }
            continue;
        }

        let partial_line = !buf.is_empty() && !buf.ends_with(b"\n");
        if !partial_line || Instant::now() >= deadline {
            break;
        }
        sleep(LINE_POLL_INTERVAL).await;
    }

    Ok(decode_lines(&buf))
}

/// Split device output into trimmed, non-empty lines.
///
/// Serial noise is common, so invalid UTF-8 is replaced rather than rejected.
pub fn decode_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDevice, MockEvent, MockOpener, MockPortDiscovery};

    fn fast_config() -> DeviceConfig {
        DeviceConfig {
            port: "mock".to_string(),
            connect_settle_ms: 0,
            response_settle_ms: 0,
            close_settle_ms: 0,
            read_timeout_ms: 50,
            ..DeviceConfig::default()
        }
    }

    fn session_with(opener: Arc<MockOpener>) -> DeviceSession {
        DeviceSession::new(fast_config(), opener, Arc::new(MockPortDiscovery::default()))
    }

    #[test]
    fn test_decode_lines() {
        assert_eq!(decode_lines(b"one\r\n\r\ntwo\n  \n"), vec!["one", "two"]);
        assert!(decode_lines(b"").is_empty());

        let noisy = decode_lines(b"\xffOK\xfe 5\n");
        assert_eq!(noisy.len(), 1);
        assert!(noisy[0].contains("OK"));
        assert!(noisy[0].contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_out_of_range_scores_never_touch_device() {
        let opener = Arc::new(MockOpener::new(MockDevice::new()));
        opener.device().forbid_writes();
        let session = session_with(opener.clone());

        for score in [-1, 101, 1000] {
            let outcome = session.send(score).await;
            assert!(!outcome.success);
            assert_eq!(outcome.message, "Score must be between 0 and 100");
        }

        assert_eq!(opener.open_count(), 0);
        assert!(opener.device().wire().is_empty());
    }

    #[tokio::test]
    async fn test_in_range_scores_return_device_ack() {
        let opener = Arc::new(MockOpener::new(MockDevice::new()));
        let session = session_with(opener.clone());

        for score in [0, 1, 50, 99, 100] {
            let outcome = session.send(score).await;
            assert!(outcome.success, "score {} failed: {}", score, outcome.message);
            assert_eq!(outcome.message, format!("ACK {}", score));
        }

        assert_eq!(opener.open_count(), 1);
        assert_eq!(opener.device().written_lines(), vec!["0", "1", "50", "99", "100"]);
    }

    #[tokio::test]
    async fn test_silent_device_gets_synthesized_message() {
        let opener = Arc::new(MockOpener::new(MockDevice::silent()));
        let session = session_with(opener);

        let outcome = session.send(30).await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "Score 30 sent to Arduino");
    }

    #[tokio::test]
    async fn test_last_non_empty_line_wins() {
        let opener = Arc::new(MockOpener::new(MockDevice::silent()));
        let session = session_with(opener.clone());
        session.ensure_connected().await.unwrap();

        opener.device().queue_output(b"Pump 40%\r\n\r\nRunning for 2000 ms\n\n");
        let outcome = session.send(40).await;
        assert_eq!(outcome.message, "Running for 2000 ms");
        assert_eq!(outcome.replies, vec!["Pump 40%", "Running for 2000 ms"]);
    }

    #[tokio::test]
    async fn test_trailing_partial_line_is_kept() {
        let opener = Arc::new(MockOpener::new(MockDevice::silent()));
        let session = session_with(opener.clone());
        session.ensure_connected().await.unwrap();

        opener.device().queue_output(b"first\nsecond without newline");
        let outcome = session.send(5).await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "second without newline");
    }

    /// Firmware that prints status lines faster than they can be drained
    struct ChattyLink;

    #[async_trait::async_trait]
    impl SerialTransport for ChattyLink {
        async fn write_line(&mut self, _line: &str) -> Result<()> {
            Ok(())
        }

        fn bytes_to_read(&mut self) -> Result<usize> {
            Ok(8)
        }

        async fn read_available(&mut self) -> Result<Vec<u8>> {
            tokio::task::yield_now().await;
            Ok(b"status\n".to_vec())
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn shutdown(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct ChattyOpener;

    impl SerialOpener for ChattyOpener {
        fn open(&self, _port: &str, _baud_rate: u32) -> Result<Box<dyn SerialTransport>> {
            Ok(Box::new(ChattyLink))
        }
    }

    #[tokio::test]
    async fn test_drain_stops_on_a_device_that_never_goes_quiet() {
        let session = DeviceSession::new(
            fast_config(),
            Arc::new(ChattyOpener),
            Arc::new(MockPortDiscovery::default()),
        );

        let outcome = tokio::time::timeout(Duration::from_secs(3), session.send(10))
            .await
            .expect("drain kept reading past its deadline");
        assert!(outcome.success);
        assert_eq!(outcome.message, "status");
        assert!(outcome.replies.iter().all(|line| line == "status"));

        // The lock is released, so shutdown is not stuck behind the drain
        tokio::time::timeout(Duration::from_secs(3), session.close())
            .await
            .expect("close blocked");
    }

    #[tokio::test]
    async fn test_startup_banner_is_drained() {
        let device = MockDevice::new().with_banner("Valve ready");
        let opener = Arc::new(MockOpener::new(device));
        let session = session_with(opener);

        session.ensure_connected().await.unwrap();
        // The banner must not be mistaken for the reply to the first command
        let outcome = session.send(20).await;
        assert_eq!(outcome.message, "ACK 20");
    }

    #[tokio::test]
    async fn test_unreachable_port_then_lazy_reconnect() {
        let opener = Arc::new(MockOpener::unavailable(MockDevice::new()));
        let session = session_with(opener.clone());

        let outcome = session.send(10).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("No Arduino connection"));
        assert!(outcome.message.contains("mock"));
        assert!(!session.is_connected().await);

        opener.set_available(true);
        let outcome = session.send(10).await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "ACK 10");
        assert!(session.is_connected().await);
    }

    #[tokio::test]
    async fn test_ensure_connected_reports_port_and_cause() {
        let opener = Arc::new(MockOpener::unavailable(MockDevice::new()));
        let session = session_with(opener);

        match session.ensure_connected().await {
            Err(ValveError::Connect { port, cause }) => {
                assert_eq!(port, "mock");
                assert_eq!(cause, "No such file or directory");
            }
            other => panic!("Expected Connect error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_io_error_is_an_outcome_and_handle_is_dropped() {
        let opener = Arc::new(MockOpener::new(MockDevice::new()));
        let session = session_with(opener.clone());
        assert!(session.send(10).await.success);

        opener.device().fail_next_write();
        let outcome = session.send(20).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Error sending to Arduino"));
        assert!(!session.is_connected().await);

        let outcome = session.send(30).await;
        assert!(outcome.success);
        assert_eq!(opener.open_count(), 2);
    }

    #[tokio::test]
    async fn test_unplugged_handle_is_reopened() {
        let opener = Arc::new(MockOpener::new(MockDevice::new()));
        let session = session_with(opener.clone());
        assert!(session.send(10).await.success);

        opener.device().unplug();
        let outcome = session.send(15).await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "ACK 15");
        assert_eq!(opener.open_count(), 2);
    }

    #[tokio::test]
    async fn test_reset_sends_zero() {
        let opener = Arc::new(MockOpener::new(MockDevice::new()));
        let session = session_with(opener.clone());

        let outcome = session.reset().await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "ACK 0");
        assert_eq!(opener.device().written_lines(), vec!["0"]);
    }

    #[tokio::test]
    async fn test_is_connected_never_opens() {
        let opener = Arc::new(MockOpener::new(MockDevice::new()));
        let session = session_with(opener.clone());

        assert!(!session.is_connected().await);
        assert_eq!(opener.open_count(), 0);

        session.ensure_connected().await.unwrap();
        assert!(session.is_connected().await);

        opener.device().unplug();
        assert!(!session.is_connected().await);
        assert_eq!(opener.open_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_sends_do_not_interleave() {
        let opener = Arc::new(MockOpener::new(MockDevice::new()));
        let session = Arc::new(session_with(opener.clone()));

        let mut handles = Vec::new();
        for score in 0..=40 {
            let session = session.clone();
            handles.push(tokio::spawn(async move { session.send(score).await }));
        }
        for handle in handles {
            let outcome = handle.await.unwrap();
            assert!(outcome.success);
        }

        let wire = String::from_utf8(opener.device().wire()).unwrap();
        let mut sent: Vec<i64> = wire
            .lines()
            .map(|line| line.parse::<i64>().expect("corrupted command on the wire"))
            .collect();
        sent.sort_unstable();
        assert_eq!(sent, (0..=40).collect::<Vec<_>>());

        // Each write is followed by its own drain before the next write
        let events: Vec<MockEvent> = opener
            .device()
            .events()
            .into_iter()
            .filter(|e| matches!(e, MockEvent::Wrote(_) | MockEvent::Drained))
            .skip_while(|e| matches!(e, MockEvent::Drained))
            .collect();
        for pair in events.chunks(2) {
            assert!(matches!(pair[0], MockEvent::Wrote(_)));
            assert_eq!(pair.get(1), Some(&MockEvent::Drained));
        }
    }

    #[tokio::test]
    async fn test_close_sends_zero_before_release() {
        let opener = Arc::new(MockOpener::new(MockDevice::new()));
        let session = session_with(opener.clone());
        assert!(session.send(80).await.success);

        session.close().await;

        let events = opener.device().events();
        let tail = &events[events.len() - 2..];
        assert_eq!(tail[0], MockEvent::Wrote("0".to_string()));
        assert_eq!(tail[1], MockEvent::Closed);
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_close_when_disconnected_is_noop() {
        let opener = Arc::new(MockOpener::unavailable(MockDevice::new()));
        opener.device().forbid_writes();
        let session = session_with(opener.clone());

        session.close().await;
        session.close().await;
        assert!(opener.device().events().is_empty());
    }

    #[tokio::test]
    async fn test_close_on_unplugged_handle_skips_write() {
        let opener = Arc::new(MockOpener::new(MockDevice::new()));
        let session = session_with(opener.clone());
        assert!(session.send(60).await.success);

        opener.device().unplug();
        session.close().await;

        assert_eq!(opener.device().written_lines(), vec!["60"]);
        assert_eq!(opener.device().events().last(), Some(&MockEvent::Closed));
    }
}
