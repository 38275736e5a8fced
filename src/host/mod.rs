//! Interfaces to the game server hosting the rental point
//!
//! The rental core never talks to the engine directly. Everything it needs
//! (who is online, where they stand, money, vehicles, messages) goes through
//! the traits below so a real server binding and the in-memory [`sim`] world
//! are interchangeable.

pub mod desktop;
pub mod sim;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Opaque identity of a connected player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// Opaque handle to a spawned vehicle instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleHandle(pub u64);

impl fmt::Display for VehicleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vehicle#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn offset(&self, direction: Vec3, distance: f32) -> Vec3 {
        Vec3 {
            x: self.x + direction.x * distance,
            y: self.y + direction.y * distance,
            z: self.z + direction.z * distance,
        }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// Where a player stands and which way they face
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    /// Degrees around the vertical axis, 0 faces +z
    #[serde(default)]
    pub yaw: f32,
}

impl Transform {
    pub fn forward(&self) -> Vec3 {
        let radians = self.yaw.to_radians();
        Vec3::new(radians.sin(), 0.0, radians.cos())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Failures reported by the host's services
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("{0} is not available")]
    PlayerUnavailable(PlayerId),

    #[error("{0} does not exist")]
    VehicleNotFound(VehicleHandle),

    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Connected players and their position in the world
pub trait PlayerHost: Send + Sync {
    fn is_connected(&self, player: PlayerId) -> bool;
    fn transform(&self, player: PlayerId) -> Result<Transform, HostError>;
}

/// Player wallets
pub trait Economy: Send + Sync {
    fn balance(&self, player: PlayerId) -> Result<u64, HostError>;
    fn debit(&self, player: PlayerId, amount: u64, memo: &str) -> Result<(), HostError>;
    fn credit(&self, player: PlayerId, amount: u64, memo: &str) -> Result<(), HostError>;
}

pub trait VehicleSpawner: Send + Sync {
    fn spawn(
        &self,
        vehicle_type: u32,
        position: Vec3,
        yaw: f32,
        owner: PlayerId,
    ) -> Result<VehicleHandle, HostError>;
    fn destroy(&self, vehicle: VehicleHandle) -> Result<(), HostError>;
}

/// On-screen notices. Delivery is best effort.
pub trait Notifier: Send + Sync {
    fn notify(&self, player: PlayerId, title: &str, message: &str, severity: Severity);
}

/// The set of host services a rental manager works against
#[derive(Clone)]
pub struct Collaborators {
    pub players: Arc<dyn PlayerHost>,
    pub economy: Arc<dyn Economy>,
    pub vehicles: Arc<dyn VehicleSpawner>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Use a single host object for every service
    pub fn from_world<W>(world: Arc<W>) -> Self
    where
        W: PlayerHost + Economy + VehicleSpawner + Notifier + 'static,
    {
        Self {
            players: world.clone(),
            economy: world.clone(),
            vehicles: world.clone(),
            notifier: world,
        }
    }

    /// Replace the notice sink, keeping the other services
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}
