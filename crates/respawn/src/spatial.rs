//! Spatial types and the external collaborators the spawner queries.
//!
//! Movement, navigation and physics live elsewhere. The spawner only needs
//! to know where the player is and whether a point is walkable.

use std::ops::{Add, Sub};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// 3D vector - position or offset
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Euclidean distance
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length_squared().sqrt()
    }

    /// Offset on the ground plane at `angle` radians and `radius`.
    #[must_use]
    pub fn offset_flat(self, angle: f32, radius: f32) -> Self {
        Self::new(self.x + angle.cos() * radius, self.y, self.z + angle.sin() * radius)
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Supplies the reference position (usually the player).
pub trait AnchorProvider: Send {
    /// Current anchor position, or `None` if there is no player yet.
    fn anchor(&self) -> Option<Vec3>;
}

/// Answers whether a position can be stood on.
pub trait WalkabilityOracle: Send {
    /// Whether an enemy may be placed at `position`.
    fn is_walkable(&self, position: Vec3) -> bool;
}

/// Anchor at a fixed point.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedAnchor(pub Vec3);

impl AnchorProvider for FixedAnchor {
    fn anchor(&self) -> Option<Vec3> {
        Some(self.0)
    }
}

/// Anchor shared with whatever moves the player.
///
/// Clones observe the same position.
#[derive(Clone, Debug, Default)]
pub struct TrackedAnchor(Arc<Mutex<Option<Vec3>>>);

impl TrackedAnchor {
    /// Creates an anchor at `position`.
    #[must_use]
    pub fn at(position: Vec3) -> Self {
        Self(Arc::new(Mutex::new(Some(position))))
    }

    /// Moves the anchor.
    pub fn set(&self, position: Vec3) {
        *self.0.lock() = Some(position);
    }

    /// Removes the anchor (player gone).
    pub fn clear(&self) {
        *self.0.lock() = None;
    }
}

impl AnchorProvider for TrackedAnchor {
    fn anchor(&self) -> Option<Vec3> {
        *self.0.lock()
    }
}

/// Every position is walkable.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenGround;

impl WalkabilityOracle for OpenGround {
    fn is_walkable(&self, _position: Vec3) -> bool {
        true
    }
}

/// Square arena centred on the origin; anything outside is a wall.
#[derive(Clone, Copy, Debug)]
pub struct ArenaBounds {
    /// Half the side length.
    pub half_extent: f32,
}

impl WalkabilityOracle for ArenaBounds {
    fn is_walkable(&self, position: Vec3) -> bool {
        position.x.abs() <= self.half_extent && position.z.abs() <= self.half_extent
    }
}
