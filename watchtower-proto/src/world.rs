use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::models::{PlayerName, PlayerSnapshot, Vec3};
use crate::packets::{PlayerInfoEntry, relative};

/// A player entity this client currently has loaded.
#[derive(Debug, Clone)]
struct TrackedEntity {
  uuid: Uuid,
  position: Vec3,
}

/// Client-side view of the players on the server.
///
/// The tab list knows every connected player; entities are only known for
/// players within the server's view distance of the bot.
#[derive(Debug, Default)]
pub struct World {
  own_entity_id: Option<i32>,
  own_position: Option<Vec3>,
  tab_list: HashMap<Uuid, PlayerName>,
  entities: HashMap<i32, TrackedEntity>,
}

impl World {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_own_entity(&mut self, entity_id: i32) {
    self.own_entity_id = Some(entity_id);
  }

  pub fn own_position(&self) -> Option<Vec3> {
    self.own_position
  }

  /// Applies a Synchronize Player Position. Coordinates flagged relative are
  /// offsets from the current position. Returns the resulting position.
  pub fn sync_own_position(&mut self, position: Vec3, relative_flags: u8) -> Vec3 {
    let base = self.own_position.unwrap_or_default();
    let pick = |flag: u8, current: f64, value: f64| {
      if relative_flags & flag != 0 {
        current + value
      } else {
        value
      }
    };
    let synced = Vec3::new(
      pick(relative::X, base.x, position.x),
      pick(relative::Y, base.y, position.y),
      pick(relative::Z, base.z, position.z),
    );
    self.own_position = Some(synced);
    synced
  }

  /// Records tab list additions. Returns the names that were not known before.
  pub fn add_players(&mut self, entries: Vec<PlayerInfoEntry>) -> Vec<PlayerName> {
    let mut joined = Vec::new();
    for entry in entries {
      let Some(name) = entry.name else { continue };
      let Ok(name) = PlayerName::try_from(name.as_str()) else {
        debug!(player = %name, "ignoring player name longer than 16 characters");
        continue;
      };
      if self.tab_list.insert(entry.uuid, name).is_none() {
        joined.push(name);
      }
    }
    joined
  }

  /// Drops players from the tab list. Returns the names that were removed.
  pub fn remove_players(&mut self, uuids: &[Uuid]) -> Vec<PlayerName> {
    uuids
      .iter()
      .filter_map(|uuid| self.tab_list.remove(uuid))
      .collect()
  }

  pub fn spawn_player(&mut self, entity_id: i32, uuid: Uuid, position: Vec3) {
    self
      .entities
      .insert(entity_id, TrackedEntity { uuid, position });
  }

  pub fn move_entity(&mut self, entity_id: i32, delta: Vec3) {
    if let Some(entity) = self.entities.get_mut(&entity_id) {
      entity.position = entity.position.offset(delta);
    }
  }

  pub fn teleport_entity(&mut self, entity_id: i32, position: Vec3) {
    if let Some(entity) = self.entities.get_mut(&entity_id) {
      entity.position = position;
    }
  }

  pub fn remove_entities(&mut self, entity_ids: &[i32]) {
    for id in entity_ids {
      self.entities.remove(id);
    }
  }

  /// A respawn or dimension change unloads every entity, including our own
  /// position until the server synchronizes it again.
  pub fn reset_for_respawn(&mut self) {
    self.entities.clear();
    self.own_position = None;
  }

  pub fn player_count(&self) -> usize {
    self.tab_list.len()
  }

  /// Snapshot of every tab-list player with its position, if loaded.
  pub fn player_snapshots(&self) -> Vec<PlayerSnapshot> {
    let positions: HashMap<Uuid, Vec3> = self
      .entities
      .iter()
      .filter(|(id, _)| Some(**id) != self.own_entity_id)
      .map(|(_, entity)| (entity.uuid, entity.position))
      .collect();

    self
      .tab_list
      .iter()
      .map(|(uuid, name)| PlayerSnapshot {
        name: *name,
        position: positions.get(uuid).copied(),
      })
      .collect()
  }
}
