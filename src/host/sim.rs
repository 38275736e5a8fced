//! In-memory game world
//!
//! Implements every host service so the rental logic can run without a game
//! server: the console mode, the scenario runner and the tests all use it.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

use super::{
    Economy, HostError, Notifier, PlayerHost, PlayerId, Severity, Transform, Vec3, VehicleHandle,
    VehicleSpawner,
};

#[derive(Debug, Clone, Serialize)]
pub struct SimPlayer {
    pub id: PlayerId,
    pub name: String,
    pub balance: u64,
    pub transform: Transform,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimVehicle {
    pub handle: VehicleHandle,
    pub vehicle_type: u32,
    pub position: Vec3,
    pub yaw: f32,
    pub owner: PlayerId,
}

/// A notice as it reached the player
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub player: PlayerId,
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

/// One wallet movement; negative amounts are debits
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub player: PlayerId,
    pub amount: i64,
    pub memo: String,
}

#[derive(Debug, Default)]
struct WorldState {
    players: HashMap<PlayerId, SimPlayer>,
    vehicles: HashMap<VehicleHandle, SimVehicle>,
    next_player: u64,
    next_vehicle: u64,
    notices: Vec<Notice>,
    ledger: Vec<LedgerEntry>,
    spawns_attempted: usize,
    destroys_attempted: usize,
    fail_spawns: bool,
    fail_destroys: bool,
}

#[derive(Debug, Default)]
pub struct SimWorld {
    state: Mutex<WorldState>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, name: &str, balance: u64, transform: Transform) -> PlayerId {
        let mut state = self.state.lock();
        state.next_player += 1;
        let id = PlayerId(state.next_player);
        state.players.insert(
            id,
            SimPlayer {
                id,
                name: name.to_string(),
                balance,
                transform,
                connected: true,
            },
        );
        tracing::debug!("{} joined as {}", name, id);
        id
    }

    pub fn find(&self, name: &str) -> Option<PlayerId> {
        self.state
            .lock()
            .players
            .values()
            .find(|p| p.name == name)
            .map(|p| p.id)
    }

    pub fn player(&self, id: PlayerId) -> Option<SimPlayer> {
        self.state.lock().players.get(&id).cloned()
    }

    pub fn name_of(&self, id: PlayerId) -> Option<String> {
        self.state.lock().players.get(&id).map(|p| p.name.clone())
    }

    pub fn set_connected(&self, id: PlayerId, connected: bool) {
        if let Some(player) = self.state.lock().players.get_mut(&id) {
            player.connected = connected;
        }
    }

    pub fn move_to(&self, id: PlayerId, position: Vec3) {
        if let Some(player) = self.state.lock().players.get_mut(&id) {
            player.transform.position = position;
        }
    }

    pub fn face(&self, id: PlayerId, yaw: f32) {
        if let Some(player) = self.state.lock().players.get_mut(&id) {
            player.transform.yaw = yaw;
        }
    }

    pub fn balance_of(&self, id: PlayerId) -> Option<u64> {
        self.state.lock().players.get(&id).map(|p| p.balance)
    }

    #[cfg(test)]
    pub fn vehicle(&self, handle: VehicleHandle) -> Option<SimVehicle> {
        self.state.lock().vehicles.get(&handle).cloned()
    }

    pub fn vehicles(&self) -> Vec<SimVehicle> {
        let mut vehicles: Vec<_> = self.state.lock().vehicles.values().cloned().collect();
        vehicles.sort_by_key(|v| v.handle);
        vehicles
    }

    pub fn vehicle_count(&self) -> usize {
        self.state.lock().vehicles.len()
    }

    pub fn spawns_attempted(&self) -> usize {
        self.state.lock().spawns_attempted
    }

    pub fn destroys_attempted(&self) -> usize {
        self.state.lock().destroys_attempted
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.state.lock().notices.clone()
    }

    #[cfg(test)]
    pub fn notices_for(&self, id: PlayerId) -> Vec<Notice> {
        self.state
            .lock()
            .notices
            .iter()
            .filter(|n| n.player == id)
            .cloned()
            .collect()
    }

    /// Remove and return every notice recorded so far
    pub fn drain_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.state.lock().notices)
    }

    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.state.lock().ledger.clone()
    }

    /// Make every following spawn request fail
    pub fn fail_spawns(&self, fail: bool) {
        self.state.lock().fail_spawns = fail;
    }

    /// Make every following destroy request fail (the vehicle stays in the world)
    pub fn fail_destroys(&self, fail: bool) {
        self.state.lock().fail_destroys = fail;
    }
}

impl PlayerHost for SimWorld {
    fn is_connected(&self, player: PlayerId) -> bool {
        self.state
            .lock()
            .players
            .get(&player)
            .map(|p| p.connected)
            .unwrap_or(false)
    }

    fn transform(&self, player: PlayerId) -> Result<Transform, HostError> {
        match self.state.lock().players.get(&player) {
            Some(p) if p.connected => Ok(p.transform),
            _ => Err(HostError::PlayerUnavailable(player)),
        }
    }
}

impl Economy for SimWorld {
    fn balance(&self, player: PlayerId) -> Result<u64, HostError> {
        self.state
            .lock()
            .players
            .get(&player)
            .map(|p| p.balance)
            .ok_or(HostError::PlayerUnavailable(player))
    }

    fn debit(&self, player: PlayerId, amount: u64, memo: &str) -> Result<(), HostError> {
        let mut state = self.state.lock();
        let wallet = state
            .players
            .get_mut(&player)
            .ok_or(HostError::PlayerUnavailable(player))?;
        if wallet.balance < amount {
            return Err(HostError::Rejected(format!(
                "balance {} is below {}",
                wallet.balance, amount
            )));
        }
        wallet.balance -= amount;
        state.ledger.push(LedgerEntry {
            player,
            amount: -(amount as i64),
            memo: memo.to_string(),
        });
        Ok(())
    }

    fn credit(&self, player: PlayerId, amount: u64, memo: &str) -> Result<(), HostError> {
        let mut state = self.state.lock();
        let wallet = state
            .players
            .get_mut(&player)
            .ok_or(HostError::PlayerUnavailable(player))?;
        wallet.balance = wallet.balance.saturating_add(amount);
        state.ledger.push(LedgerEntry {
            player,
            amount: amount as i64,
            memo: memo.to_string(),
        });
        Ok(())
    }
}

impl VehicleSpawner for SimWorld {
    fn spawn(
        &self,
        vehicle_type: u32,
        position: Vec3,
        yaw: f32,
        owner: PlayerId,
    ) -> Result<VehicleHandle, HostError> {
        let mut state = self.state.lock();
        state.spawns_attempted += 1;
        if state.fail_spawns {
            return Err(HostError::Rejected("no room to spawn a vehicle".to_string()));
        }
        state.next_vehicle += 1;
        let handle = VehicleHandle(state.next_vehicle);
        state.vehicles.insert(
            handle,
            SimVehicle {
                handle,
                vehicle_type,
                position,
                yaw,
                owner,
            },
        );
        Ok(handle)
    }

    fn destroy(&self, vehicle: VehicleHandle) -> Result<(), HostError> {
        let mut state = self.state.lock();
        state.destroys_attempted += 1;
        if state.fail_destroys {
            return Err(HostError::Rejected(format!("{} is locked", vehicle)));
        }
        state
            .vehicles
            .remove(&vehicle)
            .map(|_| ())
            .ok_or(HostError::VehicleNotFound(vehicle))
    }
}

impl Notifier for SimWorld {
    fn notify(&self, player: PlayerId, title: &str, message: &str, severity: Severity) {
        let mut state = self.state.lock();
        // Offline players never see the notice
        if !state.players.get(&player).map(|p| p.connected).unwrap_or(false) {
            return;
        }
        tracing::debug!("notice to {}: [{}] {}", player, title, message);
        state.notices.push(Notice {
            player,
            title: title.to_string(),
            message: message.to_string(),
            severity,
        });
    }
}
