//! Game server callback surface
//!
//! The server calls into [`RentalPlugin`] on player input, movement,
//! disconnect and plugin load/unload. Menus are returned as plain data; the
//! server decides how to draw them and reports the player's choice back
//! through [`RentalPlugin::select`].

use serde::Serialize;
use std::time::Instant;

use crate::host::{PlayerId, Vec3};
use crate::rental::{CheckOutcome, EndReason, RentalManager, SessionSnapshot};

/// What the rental point offers a player standing next to it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "menu", rename_all = "snake_case")]
pub enum RentalMenu {
    /// Player has no rental yet
    Offer {
        vehicle: String,
        price: u64,
        duration_secs: u64,
    },
    /// Player is renting: renew or give the vehicle back
    Manage { minutes_left: u64, renew_price: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Rent,
    Renew,
    Return,
}

pub struct RentalPlugin {
    manager: RentalManager,
}

impl RentalPlugin {
    pub fn new(manager: RentalManager) -> Self {
        Self { manager }
    }

    pub fn on_init(&self) {
        let config = self.manager.config();
        tracing::info!(
            "Vehicle rental ready at {} (radius {}, {} for {}s)",
            config.rental_point,
            config.proximity_radius,
            config.price,
            config.rental_duration.as_secs()
        );
    }

    /// Evaluated on every input event: players near the rental point get a menu
    pub fn on_player_input(&self, player: PlayerId, position: Vec3) -> Option<RentalMenu> {
        let config = self.manager.config();
        if position.distance(&config.rental_point) > config.proximity_radius {
            return None;
        }

        let menu = match self.manager.time_remaining(player) {
            Some(left) => RentalMenu::Manage {
                minutes_left: left.as_secs() / 60,
                renew_price: config.price,
            },
            None => RentalMenu::Offer {
                vehicle: config.vehicle_name.clone(),
                price: config.price,
                duration_secs: config.rental_duration.as_secs(),
            },
        };
        Some(menu)
    }

    /// Apply a menu choice. Failures are shown to the player, not returned.
    pub fn select(&mut self, player: PlayerId, action: MenuAction) -> bool {
        let result = match action {
            MenuAction::Rent => self.manager.request_rental(player).map(|_| ()),
            MenuAction::Renew => self.manager.renew_rental(player),
            MenuAction::Return => {
                // Returning something you don't have is not worth a notice
                return self.manager.end_rental(player, EndReason::Returned);
            }
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::info!("{:?} for {} refused: {}", action, player, e);
                self.manager.notify_failure(player, &e);
                false
            }
        }
    }

    pub fn on_player_move(&mut self, player: PlayerId) {
        self.manager.record_activity(player);
    }

    pub fn on_player_disconnected(&mut self, player: PlayerId) {
        if self.manager.cleanup_session(player) {
            tracing::info!("{} disconnected, rental reclaimed", player);
        }
    }

    pub fn tick(&mut self) -> Vec<(PlayerId, CheckOutcome)> {
        self.manager.run_due_checks()
    }

    pub fn next_check_due(&mut self) -> Option<Instant> {
        self.manager.next_check_due()
    }

    #[cfg(test)]
    pub fn time_remaining(&self, player: PlayerId) -> Option<std::time::Duration> {
        self.manager.time_remaining(player)
    }

    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.manager.snapshot()
    }

    pub fn on_destroy(&mut self) -> usize {
        let reclaimed = self.manager.shutdown();
        tracing::info!("Vehicle rental unloaded, {} vehicle(s) reclaimed", reclaimed);
        reclaimed
    }
}
