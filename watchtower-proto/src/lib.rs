//! Minimal Minecraft Java Edition 1.20.1 client protocol.
//!
//! Just enough to log in to an offline-mode server, stay connected, and keep
//! track of which players are online and where their entities are.

pub mod buf;
mod client;
pub mod codec;
mod error;
mod models;
pub mod packets;
mod world;

pub use client::{Client, ClientOptions, Event};
pub use codec::{PacketCodec, RawPacket};
pub use error::{ProtoError, Result};
pub use models::{BlockPos, Observer, PlayerName, PlayerSnapshot, Vec3};
pub use world::World;
