use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{self, Instant};
use watchtower_bot::alert::MockAlertSink;
use watchtower_bot::scanner::Scanner;
use watchtower_bot::session::{
    Connector, GameSession, SessionEnd, SessionManager, SessionState, SessionTiming,
};
use watchtower_bot::status::BotStatus;
use watchtower_proto::{Event, Observer, PlayerName, PlayerSnapshot, ProtoError, Vec3};

const TIMING: SessionTiming = SessionTiming {
    check_interval: Duration::from_secs(2),
    reconnect_delay: Duration::from_secs(5),
    idle_timeout: Duration::from_secs(30),
};

/// What the fake server sends at a given moment.
enum Step {
    Event(Event),
    Fail,
}

/// Scripted session: delivers each step at its instant, then hangs up at `close_at`.
struct FakeSession {
    script: VecDeque<(Instant, Step)>,
    close_at: Instant,
    players: Vec<PlayerSnapshot>,
    status: Arc<BotStatus>,
    saw_online: Arc<AtomicBool>,
}

impl GameSession for FakeSession {
    type Packet = Event;

    async fn recv(&mut self) -> Option<Result<Event, ProtoError>> {
        if self.status.is_online() {
            self.saw_online.store(true, Ordering::SeqCst);
        }
        let Some(&(at, _)) = self.script.front() else {
            time::sleep_until(self.close_at).await;
            return None;
        };
        time::sleep_until(at).await;
        match self.script.pop_front()?.1 {
            Step::Event(event) => Some(Ok(event)),
            Step::Fail => Some(Err(connection_reset())),
        }
    }

    async fn process(&mut self, event: Event) -> Result<Vec<Event>, ProtoError> {
        Ok(vec![event])
    }

    fn observer(&self) -> Observer {
        Observer {
            name: "SecurityBot".to_string(),
            position: Some(Vec3::new(0.0, 64.0, 0.0)),
        }
    }

    fn players(&self) -> Vec<PlayerSnapshot> {
        self.players.clone()
    }
}

/// Hands out prepared sessions in order, refusing once they run out.
struct FakeConnector {
    sessions: Mutex<VecDeque<FakeSession>>,
    attempts: Arc<AtomicUsize>,
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self) -> Result<FakeSession, ProtoError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.sessions.lock().unwrap().pop_front();
        next.ok_or_else(connection_refused)
    }
}

fn connection_refused() -> ProtoError {
    ProtoError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
}

fn connection_reset() -> ProtoError {
    ProtoError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
}

fn bob_at(distance: f64) -> PlayerSnapshot {
    PlayerSnapshot {
        name: PlayerName::from("Bob").unwrap(),
        position: Some(Vec3::new(distance, 64.0, 0.0)),
    }
}

/// Sink expecting exactly `times` alerts for Bob, counting them as they arrive.
fn counting_sink(times: usize) -> (MockAlertSink, Arc<AtomicUsize>) {
    let alerts = Arc::new(AtomicUsize::new(0));
    let counter = alerts.clone();
    let mut sink = MockAlertSink::new();
    sink.expect_dispatch()
        .withf(|alert| alert.player == "Bob")
        .times(times)
        .returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    (sink, alerts)
}

struct Harness {
    manager: SessionManager<FakeConnector, MockAlertSink>,
    status: Arc<BotStatus>,
    attempts: Arc<AtomicUsize>,
    saw_online: Arc<AtomicBool>,
}

/// Build a manager whose connector yields one session with the given script.
fn harness(
    sink: MockAlertSink,
    script: Vec<(Duration, Step)>,
    close_after: Option<Duration>,
    players: Vec<PlayerSnapshot>,
) -> Harness {
    let status = Arc::new(BotStatus::new());
    let attempts = Arc::new(AtomicUsize::new(0));
    let saw_online = Arc::new(AtomicBool::new(false));
    let start = Instant::now();

    let mut sessions = VecDeque::new();
    if let Some(close_after) = close_after {
        sessions.push_back(FakeSession {
            script: script
                .into_iter()
                .map(|(after, step)| (start + after, step))
                .collect(),
            close_at: start + close_after,
            players,
            status: status.clone(),
            saw_online: saw_online.clone(),
        });
    }

    let connector = FakeConnector {
        sessions: Mutex::new(sessions),
        attempts: attempts.clone(),
    };
    let scanner = Scanner::new(
        vec!["Alice".to_string()],
        240.0,
        Duration::from_secs(60),
        sink,
        status.clone(),
    );
    let manager = SessionManager::new(connector, scanner, status.clone(), TIMING);

    Harness {
        manager,
        status,
        attempts,
        saw_online,
    }
}

// =============================================================================
// CONNECTION LIFECYCLE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_connect_leaves_bot_offline() {
    // GIVEN: A server that refuses connections
    let mut sink = MockAlertSink::new();
    sink.expect_dispatch().never();
    let mut h = harness(sink, vec![], None, vec![]);

    // WHEN: One connection attempt is made
    let end = h.manager.run_once().await;

    // THEN: The attempt errors and the bot stays offline
    assert!(matches!(end, SessionEnd::Errored(ProtoError::Io(_))));
    assert_eq!(h.manager.state(), SessionState::Errored);
    assert_eq!(h.attempts.load(Ordering::SeqCst), 1);
    assert!(!h.status.is_online());
}

#[tokio::test(start_paused = true)]
async fn test_bot_is_online_only_while_connected() {
    // GIVEN: A server that hangs up after three seconds
    let mut sink = MockAlertSink::new();
    sink.expect_dispatch().never();
    let mut h = harness(sink, vec![], Some(Duration::from_secs(3)), vec![]);

    // WHEN: The session runs to completion
    let end = h.manager.run_once().await;

    // THEN: The bot was online during the session and offline after it
    assert!(matches!(end, SessionEnd::Disconnected));
    assert!(h.saw_online.load(Ordering::SeqCst));
    assert!(!h.status.is_online());
    assert_eq!(h.manager.state(), SessionState::Disconnected);
}

/// Helper writer collecting formatted log lines in memory
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_transitions_are_logged_at_info() {
    // GIVEN: A subscriber that only keeps INFO and above
    let logs = LogCapture::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut sink = MockAlertSink::new();
    sink.expect_dispatch().never();
    let mut h = harness(sink, vec![], Some(Duration::from_secs(1)), vec![]);

    // WHEN: A session connects and then ends
    h.manager.run_once().await;

    // THEN: Every state change shows up in the INFO output
    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("Session state changed"));
    assert!(output.contains("to=connecting"));
    assert!(output.contains("to=online"));
    assert!(output.contains("to=disconnected"));
}

#[tokio::test(start_paused = true)]
async fn test_kick_ends_session_with_reason() {
    // GIVEN: A server that kicks the bot after one second
    let mut sink = MockAlertSink::new();
    sink.expect_dispatch().never();
    let script = vec![(
        Duration::from_secs(1),
        Step::Event(Event::Kicked("Flying is not enabled".to_string())),
    )];
    let mut h = harness(sink, script, Some(Duration::from_secs(30)), vec![]);

    // WHEN: The session runs
    let end = h.manager.run_once().await;

    // THEN: The kick reason is reported and the bot is offline
    match end {
        SessionEnd::Kicked(reason) => assert_eq!(reason, "Flying is not enabled"),
        other => panic!("expected kick, got {:?}", other),
    }
    assert_eq!(h.manager.state(), SessionState::Kicked);
    assert!(!h.status.is_online());
}

#[tokio::test(start_paused = true)]
async fn test_read_error_ends_session() {
    // GIVEN: A connection that resets after one second
    let mut sink = MockAlertSink::new();
    sink.expect_dispatch().never();
    let script = vec![(Duration::from_secs(1), Step::Fail)];
    let mut h = harness(sink, script, Some(Duration::from_secs(30)), vec![]);

    // WHEN: The session runs
    let end = h.manager.run_once().await;

    // THEN: The session ends in the errored state
    assert!(matches!(end, SessionEnd::Errored(ProtoError::Io(_))));
    assert_eq!(h.manager.state(), SessionState::Errored);
    assert!(!h.status.is_online());
}

#[tokio::test(start_paused = true)]
async fn test_silent_server_is_dropped_after_idle_timeout() {
    // GIVEN: A half-open connection that never sends anything nor closes
    let mut sink = MockAlertSink::new();
    sink.expect_dispatch().never();
    let mut h = harness(sink, vec![], Some(Duration::from_secs(3600)), vec![]);
    let start = Instant::now();

    // WHEN: The session runs
    let end = h.manager.run_once().await;

    // THEN: It ends as errored after 30s of silence and the bot goes offline
    match end {
        SessionEnd::Errored(ProtoError::TimedOut(after)) => {
            assert_eq!(after, Duration::from_secs(30))
        }
        other => panic!("expected idle timeout, got {:?}", other),
    }
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(31));
    assert_eq!(h.manager.state(), SessionState::Errored);
    assert!(!h.status.is_online());
}

#[tokio::test(start_paused = true)]
async fn test_inbound_packets_keep_session_alive() {
    // GIVEN: A server that sends one packet at 20s and then goes silent
    let mut sink = MockAlertSink::new();
    sink.expect_dispatch().never();
    let script = vec![(
        Duration::from_secs(20),
        Step::Event(Event::PlayerJoined(PlayerName::from("Alice").unwrap())),
    )];
    let mut h = harness(sink, script, Some(Duration::from_secs(3600)), vec![]);
    let start = Instant::now();

    // WHEN: The session runs
    let end = h.manager.run_once().await;

    // THEN: The idle deadline restarted at 20s, so the session lasted 50s
    assert!(matches!(end, SessionEnd::Errored(ProtoError::TimedOut(_))));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(50) && elapsed < Duration::from_secs(51));
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_fixed_delay_forever() {
    // GIVEN: A server that always refuses, and a 5s reconnect delay
    let mut sink = MockAlertSink::new();
    sink.expect_dispatch().never();
    let h = harness(sink, vec![], None, vec![]);
    let attempts = h.attempts.clone();

    // WHEN: The supervisor runs for 12 seconds
    let result = time::timeout(Duration::from_secs(12), h.manager.run()).await;

    // THEN: It never gives up, retrying at 0s, 5s and 10s
    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

// =============================================================================
// SCANNING WHILE ONLINE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_intruder_alerted_once_per_cooldown() {
    // GIVEN: Bob at 100 blocks for a 5s session with 2s checks
    let (sink, alerts) = counting_sink(1);
    let mut h = harness(sink, vec![], Some(Duration::from_secs(5)), vec![bob_at(100.0)]);

    // WHEN: The session runs through two scan ticks
    let end = h.manager.run_once().await;

    // THEN: Only the first tick alerted
    assert!(matches!(end, SessionEnd::Disconnected));
    assert_eq!(h.manager.state(), SessionState::Disconnected);
    assert_eq!(alerts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_leave_clears_cooldown() {
    // GIVEN: Bob in range, alerted at the 2s tick, who leaves at 3s and is back by 4s
    let (sink, alerts) = counting_sink(2);
    let script = vec![(
        Duration::from_secs(3),
        Step::Event(Event::PlayerLeft(PlayerName::from("Bob").unwrap())),
    )];
    let mut h = harness(sink, script, Some(Duration::from_secs(5)), vec![bob_at(50.0)]);

    // WHEN: The session runs
    let end = h.manager.run_once().await;

    // THEN: The 4s tick alerts again despite the 60s cooldown
    assert!(matches!(end, SessionEnd::Disconnected));
    assert_eq!(alerts.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_first_scan_waits_one_interval() {
    // GIVEN: Bob in range and a server that hangs up before the first tick
    let mut sink = MockAlertSink::new();
    sink.expect_dispatch().never();
    let mut h = harness(
        sink,
        vec![],
        Some(Duration::from_millis(1_500)),
        vec![bob_at(10.0)],
    );
    let before = h.status.last_check();

    // WHEN: The session runs
    h.manager.run_once().await;

    // THEN: No scan happened
    assert_eq!(h.status.last_check(), before);
}
