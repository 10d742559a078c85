//! The subset of Java Edition 1.20.1 (protocol 763) packets the client needs.

use bytes::{BufMut, BytesMut};
use serde_json::Value;
use uuid::Uuid;

use crate::buf::{McRead, McWrite};
use crate::codec::RawPacket;
use crate::error::Result;
use crate::models::Vec3;

pub const PROTOCOL_VERSION: i32 = 763;

/// Handshake "next state" value selecting the login sequence.
const NEXT_STATE_LOGIN: i32 = 2;

/// Fixed-point scale of relative entity moves (1/4096 block).
const RELATIVE_MOVE_SCALE: f64 = 4096.0;

pub mod serverbound {
    pub const HANDSHAKE: i32 = 0x00;
    pub const LOGIN_START: i32 = 0x00;
    pub const LOGIN_PLUGIN_RESPONSE: i32 = 0x02;
    pub const CONFIRM_TELEPORT: i32 = 0x00;
    pub const CLIENT_COMMAND: i32 = 0x07;
    pub const KEEP_ALIVE: i32 = 0x12;
    pub const SET_POSITION_ROTATION: i32 = 0x15;
}

pub mod login {
    pub const DISCONNECT: i32 = 0x00;
    pub const ENCRYPTION_REQUEST: i32 = 0x01;
    pub const LOGIN_SUCCESS: i32 = 0x02;
    pub const SET_COMPRESSION: i32 = 0x03;
    pub const PLUGIN_REQUEST: i32 = 0x04;
}

pub mod play {
    pub const SPAWN_PLAYER: i32 = 0x03;
    pub const DISCONNECT: i32 = 0x1a;
    pub const KEEP_ALIVE: i32 = 0x23;
    pub const LOGIN: i32 = 0x28;
    pub const ENTITY_POSITION: i32 = 0x2b;
    pub const ENTITY_POSITION_ROTATION: i32 = 0x2c;
    pub const PLAYER_INFO_REMOVE: i32 = 0x39;
    pub const PLAYER_INFO_UPDATE: i32 = 0x3a;
    pub const SYNC_POSITION: i32 = 0x3c;
    pub const REMOVE_ENTITIES: i32 = 0x3e;
    pub const RESPAWN: i32 = 0x41;
    pub const SET_HEALTH: i32 = 0x57;
    pub const TELEPORT_ENTITY: i32 = 0x68;
}

/// Player Info Update action bits, in wire order.
mod info_action {
    pub const ADD_PLAYER: u8 = 0x01;
    pub const INITIALIZE_CHAT: u8 = 0x02;
    pub const UPDATE_GAME_MODE: u8 = 0x04;
    pub const UPDATE_LISTED: u8 = 0x08;
    pub const UPDATE_LATENCY: u8 = 0x10;
    pub const UPDATE_DISPLAY_NAME: u8 = 0x20;
}

/// Synchronize Player Position flag bits marking relative coordinates.
pub mod relative {
    pub const X: u8 = 0x01;
    pub const Y: u8 = 0x02;
    pub const Z: u8 = 0x04;
}

// =============================================================================
// SERVERBOUND
// =============================================================================

pub fn handshake(host: &str, port: u16) -> RawPacket {
    let mut body = BytesMut::new();
    body.write_varint(PROTOCOL_VERSION);
    body.write_string(host);
    body.put_u16(port);
    body.write_varint(NEXT_STATE_LOGIN);
    RawPacket::new(serverbound::HANDSHAKE, body)
}

/// Login Start without a UUID, which offline-mode servers accept on 1.20.1.
pub fn login_start(username: &str) -> RawPacket {
    let mut body = BytesMut::new();
    body.write_string(username);
    body.write_bool(false);
    RawPacket::new(serverbound::LOGIN_START, body)
}

/// Answers a login plugin request with "not understood".
pub fn login_plugin_response(message_id: i32) -> RawPacket {
    let mut body = BytesMut::new();
    body.write_varint(message_id);
    body.write_bool(false);
    RawPacket::new(serverbound::LOGIN_PLUGIN_RESPONSE, body)
}

pub fn confirm_teleport(teleport_id: i32) -> RawPacket {
    let mut body = BytesMut::new();
    body.write_varint(teleport_id);
    RawPacket::new(serverbound::CONFIRM_TELEPORT, body)
}

pub fn keep_alive(id: i64) -> RawPacket {
    let mut body = BytesMut::new();
    body.put_i64(id);
    RawPacket::new(serverbound::KEEP_ALIVE, body)
}

pub fn set_position_rotation(position: Vec3, yaw: f32, pitch: f32, on_ground: bool) -> RawPacket {
    let mut body = BytesMut::new();
    body.put_f64(position.x);
    body.put_f64(position.y);
    body.put_f64(position.z);
    body.put_f32(yaw);
    body.put_f32(pitch);
    body.write_bool(on_ground);
    RawPacket::new(serverbound::SET_POSITION_ROTATION, body)
}

/// Client Command "perform respawn".
pub fn respawn() -> RawPacket {
    let mut body = BytesMut::new();
    body.write_varint(0);
    RawPacket::new(serverbound::CLIENT_COMMAND, body)
}

// =============================================================================
// CLIENTBOUND
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum LoginPacket {
    Disconnect { reason: String },
    EncryptionRequest,
    LoginSuccess { uuid: Uuid, username: String },
    SetCompression { threshold: i32 },
    PluginRequest { message_id: i32 },
    Unknown(i32),
}

impl LoginPacket {
    pub fn decode(packet: RawPacket) -> Result<Self> {
        let mut body = packet.body;
        let decoded = match packet.id {
            login::DISCONNECT => LoginPacket::Disconnect {
                reason: chat_to_plain(&body.read_string()?),
            },
            login::ENCRYPTION_REQUEST => LoginPacket::EncryptionRequest,
            login::LOGIN_SUCCESS => LoginPacket::LoginSuccess {
                uuid: body.read_uuid()?,
                username: body.read_string()?,
            },
            login::SET_COMPRESSION => LoginPacket::SetCompression {
                threshold: body.read_varint()?,
            },
            login::PLUGIN_REQUEST => LoginPacket::PluginRequest {
                message_id: body.read_varint()?,
            },
            other => LoginPacket::Unknown(other),
        };
        Ok(decoded)
    }
}

/// One row of a Player Info Update. `name` is only present when the row adds a player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInfoEntry {
    pub uuid: Uuid,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayPacket {
    Login {
        entity_id: i32,
    },
    KeepAlive {
        id: i64,
    },
    Disconnect {
        reason: String,
    },
    SyncPosition {
        position: Vec3,
        yaw: f32,
        pitch: f32,
        relative: u8,
        teleport_id: i32,
    },
    PlayerInfoUpdate(Vec<PlayerInfoEntry>),
    PlayerInfoRemove(Vec<Uuid>),
    SpawnPlayer {
        entity_id: i32,
        uuid: Uuid,
        position: Vec3,
    },
    MoveEntity {
        entity_id: i32,
        delta: Vec3,
    },
    TeleportEntity {
        entity_id: i32,
        position: Vec3,
    },
    RemoveEntities(Vec<i32>),
    Respawn,
    SetHealth {
        health: f32,
    },
    Ignored(i32),
}

impl PlayPacket {
    pub fn decode(packet: RawPacket) -> Result<Self> {
        let mut body = packet.body;
        let decoded = match packet.id {
            play::LOGIN => PlayPacket::Login {
                entity_id: body.read_i32()?,
            },
            play::KEEP_ALIVE => PlayPacket::KeepAlive {
                id: body.read_i64()?,
            },
            play::DISCONNECT => PlayPacket::Disconnect {
                reason: chat_to_plain(&body.read_string()?),
            },
            play::SYNC_POSITION => PlayPacket::SyncPosition {
                position: read_position(&mut body)?,
                yaw: body.read_f32()?,
                pitch: body.read_f32()?,
                relative: body.read_u8()?,
                teleport_id: body.read_varint()?,
            },
            play::PLAYER_INFO_UPDATE => PlayPacket::PlayerInfoUpdate(read_player_info(&mut body)?),
            play::PLAYER_INFO_REMOVE => {
                let count = body.read_varint()?;
                let uuids = (0..count)
                    .map(|_| body.read_uuid())
                    .collect::<Result<Vec<_>>>()?;
                PlayPacket::PlayerInfoRemove(uuids)
            }
            play::SPAWN_PLAYER => PlayPacket::SpawnPlayer {
                entity_id: body.read_varint()?,
                uuid: body.read_uuid()?,
                position: read_position(&mut body)?,
            },
            play::ENTITY_POSITION | play::ENTITY_POSITION_ROTATION => PlayPacket::MoveEntity {
                entity_id: body.read_varint()?,
                delta: Vec3::new(
                    f64::from(body.read_i16()?) / RELATIVE_MOVE_SCALE,
                    f64::from(body.read_i16()?) / RELATIVE_MOVE_SCALE,
                    f64::from(body.read_i16()?) / RELATIVE_MOVE_SCALE,
                ),
            },
            play::TELEPORT_ENTITY => PlayPacket::TeleportEntity {
                entity_id: body.read_varint()?,
                position: read_position(&mut body)?,
            },
            play::REMOVE_ENTITIES => {
                let count = body.read_varint()?;
                let ids = (0..count)
                    .map(|_| body.read_varint())
                    .collect::<Result<Vec<_>>>()?;
                PlayPacket::RemoveEntities(ids)
            }
            play::RESPAWN => PlayPacket::Respawn,
            play::SET_HEALTH => PlayPacket::SetHealth {
                health: body.read_f32()?,
            },
            other => PlayPacket::Ignored(other),
        };
        Ok(decoded)
    }
}

fn read_position(body: &mut impl McRead) -> Result<Vec3> {
    Ok(Vec3::new(body.read_f64()?, body.read_f64()?, body.read_f64()?))
}

fn read_player_info(body: &mut impl McRead) -> Result<Vec<PlayerInfoEntry>> {
    let actions = body.read_u8()?;
    let count = body.read_varint()?;
    let mut entries = Vec::with_capacity(count.clamp(0, 1024) as usize);

    for _ in 0..count {
        let uuid = body.read_uuid()?;
        let mut name = None;

        if actions & info_action::ADD_PLAYER != 0 {
            name = Some(body.read_string()?);
            let properties = body.read_varint()?;
            for _ in 0..properties {
                body.read_string()?;
                body.read_string()?;
                if body.read_bool()? {
                    body.read_string()?;
                }
            }
        }
        if actions & info_action::INITIALIZE_CHAT != 0 && body.read_bool()? {
            body.read_uuid()?;
            body.read_i64()?;
            body.skip_byte_array()?;
            body.skip_byte_array()?;
        }
        if actions & info_action::UPDATE_GAME_MODE != 0 {
            body.read_varint()?;
        }
        if actions & info_action::UPDATE_LISTED != 0 {
            body.read_bool()?;
        }
        if actions & info_action::UPDATE_LATENCY != 0 {
            body.read_varint()?;
        }
        if actions & info_action::UPDATE_DISPLAY_NAME != 0 && body.read_bool()? {
            body.read_string()?;
        }

        entries.push(PlayerInfoEntry { uuid, name });
    }
    Ok(entries)
}

/// Flattens a JSON chat component into its plain text.
pub fn chat_to_plain(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(component) => {
            let mut text = String::new();
            append_component(&component, &mut text);
            text
        }
        Err(_) => raw.to_string(),
    }
}

fn append_component(component: &Value, out: &mut String) {
    match component {
        Value::String(text) => out.push_str(text),
        Value::Array(parts) => parts.iter().for_each(|part| append_component(part, out)),
        Value::Object(fields) => {
            if let Some(Value::String(text)) = fields.get("text") {
                out.push_str(text);
            } else if let Some(Value::String(key)) = fields.get("translate") {
                out.push_str(key);
            }
            if let Some(extra) = fields.get("extra") {
                append_component(extra, out);
            }
        }
        _ => {}
    }
}
