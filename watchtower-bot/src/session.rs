//! Connection lifecycle: connect, scan while online, reconnect forever.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use watchtower_proto::{
    Client, ClientOptions, Event, Observer, PlayerSnapshot, ProtoError, RawPacket,
};

use crate::alert::AlertSink;
use crate::scanner::Scanner;
use crate::status::BotStatus;

/// Lifecycle states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Online,
    Kicked,
    Errored,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Online => "online",
            SessionState::Kicked => "kicked",
            SessionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Why a session stopped.
#[derive(Debug)]
pub enum SessionEnd {
    Disconnected,
    Kicked(String),
    Errored(ProtoError),
}

impl SessionEnd {
    pub fn state(&self) -> SessionState {
        match self {
            SessionEnd::Disconnected => SessionState::Disconnected,
            SessionEnd::Kicked(_) => SessionState::Kicked,
            SessionEnd::Errored(_) => SessionState::Errored,
        }
    }
}

/// A live game session as the lifecycle manager sees it.
pub trait GameSession {
    type Packet;

    /// Next inbound packet; must be cancel-safe. `None` once the server hung up.
    async fn recv(&mut self) -> Option<Result<Self::Packet, ProtoError>>;

    /// Apply a packet to the session state and report what happened.
    async fn process(&mut self, packet: Self::Packet) -> Result<Vec<Event>, ProtoError>;

    fn observer(&self) -> Observer;

    fn players(&self) -> Vec<PlayerSnapshot>;
}

/// Opens game sessions.
pub trait Connector {
    type Session: GameSession;

    async fn connect(&self) -> Result<Self::Session, ProtoError>;
}

impl GameSession for Client {
    type Packet = RawPacket;

    async fn recv(&mut self) -> Option<Result<RawPacket, ProtoError>> {
        Client::recv(self).await
    }

    async fn process(&mut self, packet: RawPacket) -> Result<Vec<Event>, ProtoError> {
        Client::process(self, packet).await
    }

    fn observer(&self) -> Observer {
        Client::observer(self)
    }

    fn players(&self) -> Vec<PlayerSnapshot> {
        self.world().player_snapshots()
    }
}

/// Connects real [`Client`]s.
pub struct MinecraftConnector {
    options: ClientOptions,
}

impl MinecraftConnector {
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }
}

impl Connector for MinecraftConnector {
    type Session = Client;

    async fn connect(&self) -> Result<Client, ProtoError> {
        Client::connect(&self.options).await
    }
}

/// Timing of the lifecycle loop.
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    pub check_interval: Duration,
    pub reconnect_delay: Duration,
    /// A session with no inbound packet for this long is treated as dead.
    pub idle_timeout: Duration,
}

/// Owns the connector and the scanner; the only writer of the online flag.
pub struct SessionManager<C, S> {
    connector: C,
    scanner: Scanner<S>,
    status: Arc<BotStatus>,
    timing: SessionTiming,
    state: SessionState,
}

impl<C: Connector, S: AlertSink> SessionManager<C, S> {
    pub fn new(
        connector: C,
        scanner: Scanner<S>,
        status: Arc<BotStatus>,
        timing: SessionTiming,
    ) -> Self {
        Self {
            connector,
            scanner,
            status,
            timing,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Supervise the session forever. Never returns.
    pub async fn run(mut self) {
        loop {
            match self.run_once().await {
                SessionEnd::Disconnected => info!("Bot disconnected"),
                SessionEnd::Kicked(reason) => warn!(%reason, "Bot was kicked"),
                SessionEnd::Errored(e) => error!("Bot error: {}", e),
            }
            info!(
                "Reconnecting in {}ms",
                self.timing.reconnect_delay.as_millis()
            );
            time::sleep(self.timing.reconnect_delay).await;
        }
    }

    /// One connect attempt and, if it succeeds, the whole online period.
    /// Leaves the bot offline in the state matching the returned end.
    pub async fn run_once(&mut self) -> SessionEnd {
        let end = self.connect_and_drive().await;
        self.status.set_online(false);
        self.transition(end.state());
        end
    }

    async fn connect_and_drive(&mut self) -> SessionEnd {
        self.transition(SessionState::Connecting);
        let session = match self.connector.connect().await {
            Ok(session) => session,
            Err(e) => return SessionEnd::Errored(e),
        };

        info!("Bot logged in successfully");
        info!(
            "Monitoring for unauthorized players within {} chunks",
            self.scanner.radius() / crate::config::CHUNK_SIZE
        );
        self.status.set_online(true);
        self.transition(SessionState::Online);
        self.drive(session).await
    }

    async fn drive(&mut self, mut session: C::Session) -> SessionEnd {
        let period = self.timing.check_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let idle_timeout = self.timing.idle_timeout;
        let mut deadline = Instant::now() + idle_timeout;

        loop {
            tokio::select! {
                packet = session.recv() => {
                    let Some(packet) = packet else {
                        return SessionEnd::Disconnected;
                    };
                    deadline = Instant::now() + idle_timeout;
                    let events = match packet {
                        Ok(packet) => session.process(packet).await,
                        Err(e) => Err(e),
                    };
                    let events = match events {
                        Ok(events) => events,
                        Err(e) => return SessionEnd::Errored(e),
                    };
                    for event in events {
                        if let Some(end) = self.handle_event(event) {
                            return end;
                        }
                    }
                }
                _ = ticker.tick() => {
                    let raised = self.scanner.scan(&session.observer(), &session.players());
                    if raised > 0 {
                        debug!(raised, "Scan raised alerts");
                    }
                }
                Some(player) = self.scanner.next_expiry() => {
                    debug!(%player, "Notification cooldown expired");
                }
                _ = time::sleep_until(deadline) => {
                    return SessionEnd::Errored(ProtoError::TimedOut(idle_timeout));
                }
            }
        }
    }

    fn handle_event(&mut self, event: Event) -> Option<SessionEnd> {
        match event {
            Event::Spawned(position) => {
                info!(
                    x = position.x,
                    y = position.y,
                    z = position.z,
                    "Bot spawned"
                );
            }
            Event::PlayerJoined(name) => info!("Player joined: {}", name),
            Event::PlayerLeft(name) => {
                info!("Player left: {}", name);
                self.scanner.release(&name);
            }
            Event::Kicked(reason) => return Some(SessionEnd::Kicked(reason)),
        }
        None
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "Session state changed");
            self.state = next;
        }
    }
}
