use arrayvec::ArrayString;

/// Minecraft player name - max 16 characters, stored inline (no heap allocation).
pub type PlayerName = ArrayString<16>;

/// A position in block units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
  pub x: f64,
  pub y: f64,
  pub z: f64,
}

impl Vec3 {
  pub const fn new(x: f64, y: f64, z: f64) -> Self {
    Self { x, y, z }
  }

  /// Euclidean distance in blocks.
  pub fn distance_to(&self, other: Vec3) -> f64 {
    let dx = self.x - other.x;
    let dy = self.y - other.y;
    let dz = self.z - other.z;
    (dx * dx + dy * dy + dz * dz).sqrt()
  }

  pub fn offset(&self, delta: Vec3) -> Vec3 {
    Vec3::new(self.x + delta.x, self.y + delta.y, self.z + delta.z)
  }

  /// The block containing this position.
  pub fn floored(&self) -> BlockPos {
    BlockPos {
      x: self.x.floor() as i64,
      y: self.y.floor() as i64,
      z: self.z.floor() as i64,
    }
  }
}

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPos {
  pub x: i64,
  pub y: i64,
  pub z: i64,
}

/// A player from the tab list, built fresh from session state on every scan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
  pub name: PlayerName,
  /// `None` while the player's entity is not loaded by this client.
  pub position: Option<Vec3>,
}

/// The controlled bot as seen by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct Observer {
  pub name: String,
  /// `None` until the server has synchronized our position.
  pub position: Option<Vec3>,
}
