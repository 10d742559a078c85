//! A minimal offline-mode game client: login, keep-alive and player tracking.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{PacketCodec, RawPacket};
use crate::error::{ProtoError, Result};
use crate::models::{Observer, PlayerName, Vec3};
use crate::packets::{self, LoginPacket, PlayPacket};
use crate::world::World;

type Transport = Framed<TcpStream, PacketCodec>;

/// Where to connect and who to log in as.
#[derive(Debug, Clone)]
pub struct ClientOptions {
  pub host: String,
  pub port: u16,
  pub username: String,
  /// Upper bound for TCP connect plus login.
  pub login_timeout: Duration,
}

/// Something the session owner may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
  /// The server placed us in the world (first position sync after login or respawn).
  Spawned(Vec3),
  PlayerJoined(PlayerName),
  PlayerLeft(PlayerName),
  /// The server closed the session with a reason.
  Kicked(String),
}

/// A logged-in connection in the play state.
pub struct Client {
  transport: Transport,
  username: String,
  uuid: Uuid,
  world: World,
  spawned: bool,
}

impl Client {
  /// Open a TCP connection and complete the login sequence, giving up with
  /// [`ProtoError::TimedOut`] once `login_timeout` has passed.
  pub async fn connect(options: &ClientOptions) -> Result<Self> {
    time::timeout(options.login_timeout, Self::establish(options))
      .await
      .map_err(|_| ProtoError::TimedOut(options.login_timeout))?
  }

  async fn establish(options: &ClientOptions) -> Result<Self> {
    let stream = TcpStream::connect((options.host.as_str(), options.port)).await?;
    stream.set_nodelay(true)?;
    let mut transport = Framed::new(stream, PacketCodec::default());

    transport
      .send(packets::handshake(&options.host, options.port))
      .await?;
    transport
      .send(packets::login_start(&options.username))
      .await?;
    let (uuid, username) = login(&mut transport).await?;
    info!(%username, %uuid, "Login succeeded");

    Ok(Self {
      transport,
      username,
      uuid,
      world: World::new(),
      spawned: false,
    })
  }

  /// Wait for the next packet. Cancel-safe: dropping the future loses nothing.
  /// `None` means the server closed the connection.
  pub async fn recv(&mut self) -> Option<Result<RawPacket>> {
    self.transport.next().await
  }

  /// Apply one play-state packet, answering the server where the protocol requires it.
  pub async fn process(&mut self, packet: RawPacket) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    match PlayPacket::decode(packet)? {
      PlayPacket::Login { entity_id } => self.world.set_own_entity(entity_id),
      PlayPacket::KeepAlive { id } => self.transport.send(packets::keep_alive(id)).await?,
      PlayPacket::Disconnect { reason } => events.push(Event::Kicked(reason)),
      PlayPacket::SyncPosition {
        position,
        yaw,
        pitch,
        relative,
        teleport_id,
      } => {
        let synced = self.world.sync_own_position(position, relative);
        self
          .transport
          .feed(packets::confirm_teleport(teleport_id))
          .await?;
        self
          .transport
          .send(packets::set_position_rotation(synced, yaw, pitch, false))
          .await?;
        if !self.spawned {
          self.spawned = true;
          events.push(Event::Spawned(synced));
        }
      }
      PlayPacket::PlayerInfoUpdate(entries) => events.extend(
        self
          .world
          .add_players(entries)
          .into_iter()
          .map(Event::PlayerJoined),
      ),
      PlayPacket::PlayerInfoRemove(uuids) => events.extend(
        self
          .world
          .remove_players(&uuids)
          .into_iter()
          .map(Event::PlayerLeft),
      ),
      PlayPacket::SpawnPlayer {
        entity_id,
        uuid,
        position,
      } => self.world.spawn_player(entity_id, uuid, position),
      PlayPacket::MoveEntity { entity_id, delta } => self.world.move_entity(entity_id, delta),
      PlayPacket::TeleportEntity {
        entity_id,
        position,
      } => self.world.teleport_entity(entity_id, position),
      PlayPacket::RemoveEntities(ids) => self.world.remove_entities(&ids),
      PlayPacket::Respawn => {
        debug!("Respawn received, unloading entities");
        self.world.reset_for_respawn();
        self.spawned = false;
      }
      PlayPacket::SetHealth { health } if health <= 0.0 => {
        warn!("Bot died, requesting respawn");
        self.transport.send(packets::respawn()).await?;
      }
      PlayPacket::SetHealth { .. } | PlayPacket::Ignored(_) => {}
    }
    Ok(events)
  }

  pub fn username(&self) -> &str {
    &self.username
  }

  pub fn uuid(&self) -> Uuid {
    self.uuid
  }

  pub fn world(&self) -> &World {
    &self.world
  }

  /// The bot itself, as seen by a scanner.
  pub fn observer(&self) -> Observer {
    Observer {
      name: self.username.clone(),
      position: self.world.own_position(),
    }
  }
}

async fn login(transport: &mut Transport) -> Result<(Uuid, String)> {
  while let Some(packet) = transport.next().await {
    match LoginPacket::decode(packet?)? {
      LoginPacket::SetCompression { threshold } => {
        debug!(threshold, "Compression enabled");
        transport.codec_mut().set_compression(threshold);
      }
      LoginPacket::LoginSuccess { uuid, username } => return Ok((uuid, username)),
      LoginPacket::Disconnect { reason } => return Err(ProtoError::LoginRejected(reason)),
      LoginPacket::EncryptionRequest => return Err(ProtoError::OnlineModeRequired),
      LoginPacket::PluginRequest { message_id } => {
        transport
          .send(packets::login_plugin_response(message_id))
          .await?
      }
      LoginPacket::Unknown(id) => debug!(id, "Ignoring unknown login packet"),
    }
  }
  Err(ProtoError::LoginInterrupted)
}
