//! Rental sessions and their lifecycle
//!
//! A player pays for a vehicle, keeps it for a fixed period (renewable), is
//! warned before the period runs out and loses the vehicle on expiry, after
//! too long without moving, on disconnect or when the plugin unloads.
//!
//! All state lives in [`RentalManager`] and is only touched through `&mut self`,
//! so whoever owns the manager (see [`crate::service`]) serializes every
//! transition.

pub mod scheduler;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::clock::Clock;
use crate::config::RentalConfig;
use crate::host::{Collaborators, HostError, PlayerId, Severity, VehicleHandle};
use scheduler::CheckScheduler;

/// Live record of one renter's active rental
#[derive(Debug, Clone)]
pub struct RentalSession {
    pub renter: PlayerId,
    pub vehicle: VehicleHandle,
    /// Start of the current period; reset by renewals
    pub start_time: Instant,
    pub last_activity: Instant,
    /// Expiry notice already sent for the current period
    pub warned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RentalError {
    #[error("You already have an active rental vehicle.")]
    AlreadyRenting,

    #[error("You don't have enough money: {price} needed, {balance} available.")]
    InsufficientFunds { balance: u64, price: u64 },

    #[error("The vehicle could not be spawned; you have been refunded.")]
    SpawnFailed(#[source] HostError),

    #[error("No active rental found.")]
    NoActiveSession,

    #[error("The rental service is unavailable: {0}")]
    Host(#[from] HostError),
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Inactivity,
    Expired,
    Returned,
    Disconnected,
    Shutdown,
}

impl EndReason {
    /// Text shown to the renter, if the renter is told at all
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            EndReason::Inactivity => Some("Your rental ended due to inactivity."),
            EndReason::Expired => Some("Your rental is over. The vehicle has been collected."),
            EndReason::Returned => Some("You returned the vehicle."),
            EndReason::Disconnected | EndReason::Shutdown => None,
        }
    }
}

/// What a periodic check did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Renter went offline; the session was torn down silently
    RenterGone,
    /// Nothing to check
    NoSession,
    Ongoing,
    Warned,
    Ended(EndReason),
}

/// Read-only view of a session for status output
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub renter: PlayerId,
    pub vehicle: VehicleHandle,
    pub elapsed_secs: u64,
    pub idle_secs: u64,
    pub remaining_secs: u64,
    pub warned: bool,
}

pub struct RentalManager {
    config: RentalConfig,
    services: Collaborators,
    clock: Arc<dyn Clock>,
    sessions: HashMap<PlayerId, RentalSession>,
    checks: CheckScheduler,
}

impl RentalManager {
    pub fn new(config: RentalConfig, services: Collaborators, clock: Arc<dyn Clock>) -> Self {
        let checks = CheckScheduler::new(config.check_interval);
        Self {
            config,
            services,
            clock,
            sessions: HashMap::new(),
            checks,
        }
    }

    pub fn config(&self) -> &RentalConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn session(&self, renter: PlayerId) -> Option<&RentalSession> {
        self.sessions.get(&renter)
    }

    #[cfg(test)]
    pub fn has_session(&self, renter: PlayerId) -> bool {
        self.sessions.contains_key(&renter)
    }

    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    pub fn is_check_scheduled(&self, renter: PlayerId) -> bool {
        self.checks.is_scheduled(renter)
    }

    pub fn next_check_due(&mut self) -> Option<Instant> {
        self.checks.next_due()
    }

    /// Charge the renter and hand them a vehicle parked in front of them
    pub fn request_rental(&mut self, renter: PlayerId) -> Result<VehicleHandle, RentalError> {
        if self.sessions.contains_key(&renter) {
            return Err(RentalError::AlreadyRenting);
        }

        let price = self.config.price;
        let balance = self.services.economy.balance(renter)?;
        if balance < price {
            return Err(RentalError::InsufficientFunds { balance, price });
        }

        let transform = self.services.players.transform(renter)?;
        let position = transform
            .position
            .offset(transform.forward(), self.config.spawn_distance);

        self.services.economy.debit(renter, price, "Vehicle rental")?;

        let vehicle = match self.services.vehicles.spawn(
            self.config.vehicle_type_id,
            position,
            transform.yaw,
            renter,
        ) {
            Ok(vehicle) => vehicle,
            Err(e) => {
                tracing::warn!("Spawning rental vehicle for {} failed: {}", renter, e);
                if let Err(refund) = self
                    .services
                    .economy
                    .credit(renter, price, "Refund for failed rental")
                {
                    tracing::error!("Refunding {} to {} failed: {}", price, renter, refund);
                }
                return Err(RentalError::SpawnFailed(e));
            }
        };

        let now = self.clock.now();
        self.sessions.insert(
            renter,
            RentalSession {
                renter,
                vehicle,
                start_time: now,
                last_activity: now,
                warned: false,
            },
        );
        self.checks.schedule(renter, now);

        tracing::info!("{} rented {} at {}", renter, vehicle, position);
        self.notify(
            renter,
            &format!(
                "You rented a {} for {}. ({})",
                self.config.vehicle_name,
                format_duration(self.config.rental_duration),
                price
            ),
            Severity::Success,
        );
        Ok(vehicle)
    }

    /// Pay for a fresh period. The running check keeps its cadence.
    pub fn renew_rental(&mut self, renter: PlayerId) -> Result<(), RentalError> {
        if !self.sessions.contains_key(&renter) {
            return Err(RentalError::NoActiveSession);
        }

        let price = self.config.price;
        let balance = self.services.economy.balance(renter)?;
        if balance < price {
            return Err(RentalError::InsufficientFunds { balance, price });
        }
        self.services.economy.debit(renter, price, "Rental renewal")?;

        let now = self.clock.now();
        let Some(session) = self.sessions.get_mut(&renter) else {
            return Err(RentalError::NoActiveSession);
        };
        session.start_time = now;
        session.last_activity = now;
        session.warned = false;

        tracing::info!("{} renewed the rental of {}", renter, session.vehicle);
        self.notify(
            renter,
            &format!(
                "Your rental has been extended by {}.",
                format_duration(self.config.rental_duration)
            ),
            Severity::Success,
        );
        Ok(())
    }

    pub fn record_activity(&mut self, renter: PlayerId) {
        let now = self.clock.now();
        if let Some(session) = self.sessions.get_mut(&renter) {
            session.last_activity = now;
        }
    }

    /// End the renter's session, telling them why when the reason warrants it.
    /// Returns false when there was nothing to end.
    pub fn end_rental(&mut self, renter: PlayerId, reason: EndReason) -> bool {
        let Some(session) = self.sessions.remove(&renter) else {
            return false;
        };

        if let Some(notice) = reason.notice() {
            if self.services.players.is_connected(renter) {
                self.notify(renter, notice, Severity::Warning);
            }
        }
        self.release(session, reason);
        true
    }

    /// Tear down the renter's session without telling them. Safe to repeat.
    pub fn cleanup_session(&mut self, renter: PlayerId) -> bool {
        match self.sessions.remove(&renter) {
            Some(session) => {
                self.release(session, EndReason::Disconnected);
                true
            }
            None => {
                self.checks.cancel(renter);
                false
            }
        }
    }

    /// Evaluate one session against its inactivity, warning and expiry limits
    pub fn periodic_check(&mut self, renter: PlayerId) -> CheckOutcome {
        if !self.services.players.is_connected(renter) {
            if self.cleanup_session(renter) {
                tracing::info!("{} is gone, rental reclaimed", renter);
            }
            return CheckOutcome::RenterGone;
        }

        let now = self.clock.now();
        let Some(session) = self.sessions.get_mut(&renter) else {
            self.checks.cancel(renter);
            return CheckOutcome::NoSession;
        };

        let since_start = now.saturating_duration_since(session.start_time);
        let since_activity = now.saturating_duration_since(session.last_activity);
        tracing::debug!(
            "Checking {}: {}s into the period, idle for {}s",
            renter,
            since_start.as_secs(),
            since_activity.as_secs()
        );

        if since_activity >= self.config.inactivity_limit {
            self.end_rental(renter, EndReason::Inactivity);
            return CheckOutcome::Ended(EndReason::Inactivity);
        }

        let mut outcome = CheckOutcome::Ongoing;
        if !session.warned && since_start >= self.config.warning_after {
            session.warned = true;
            let left = self.config.rental_duration.saturating_sub(self.config.warning_after);
            self.notify(
                renter,
                &format!(
                    "Your rental expires in {}. Return to the rental point to renew or return the vehicle.",
                    format_duration(left)
                ),
                Severity::Warning,
            );
            outcome = CheckOutcome::Warned;
        }

        if since_start >= self.config.rental_duration {
            self.end_rental(renter, EndReason::Expired);
            outcome = CheckOutcome::Ended(EndReason::Expired);
        }

        outcome
    }

    /// Run every check that has come due
    pub fn run_due_checks(&mut self) -> Vec<(PlayerId, CheckOutcome)> {
        let now = self.clock.now();
        self.checks
            .pop_due(now)
            .into_iter()
            .map(|renter| (renter, self.periodic_check(renter)))
            .collect()
    }

    /// Reclaim every vehicle; used when the plugin unloads
    pub fn shutdown(&mut self) -> usize {
        let renters: Vec<PlayerId> = self.sessions.keys().copied().collect();
        for renter in &renters {
            if let Some(session) = self.sessions.remove(renter) {
                self.release(session, EndReason::Shutdown);
            }
        }
        renters.len()
    }

    pub fn time_remaining(&self, renter: PlayerId) -> Option<Duration> {
        let now = self.clock.now();
        self.sessions.get(&renter).map(|s| {
            self.config
                .rental_duration
                .saturating_sub(now.saturating_duration_since(s.start_time))
        })
    }

    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let now = self.clock.now();
        let mut sessions: Vec<SessionSnapshot> = self
            .sessions
            .values()
            .map(|s| {
                let elapsed = now.saturating_duration_since(s.start_time);
                SessionSnapshot {
                    renter: s.renter,
                    vehicle: s.vehicle,
                    elapsed_secs: elapsed.as_secs(),
                    idle_secs: now.saturating_duration_since(s.last_activity).as_secs(),
                    remaining_secs: self.config.rental_duration.saturating_sub(elapsed).as_secs(),
                    warned: s.warned,
                }
            })
            .collect();
        sessions.sort_by_key(|s| s.renter);
        sessions
    }

    /// Tell the renter a request didn't go through
    pub fn notify_failure(&self, renter: PlayerId, error: &RentalError) {
        if self.services.players.is_connected(renter) {
            self.notify(renter, &error.to_string(), Severity::Error);
        }
    }

    fn notify(&self, renter: PlayerId, message: &str, severity: Severity) {
        self.services
            .notifier
            .notify(renter, &self.config.notice_title, message, severity);
    }

    /// Destroy the vehicle and disarm the check. Never fails: a vehicle the
    /// host already removed is only logged.
    fn release(&mut self, session: RentalSession, reason: EndReason) {
        self.checks.cancel(session.renter);
        if let Err(e) = self.services.vehicles.destroy(session.vehicle) {
            tracing::warn!(
                "Could not remove {} of {}: {}",
                session.vehicle,
                session.renter,
                e
            );
        }
        tracing::info!("Rental of {} ended ({:?})", session.renter, reason);
    }
}

/// "2h", "1h 30min", "10min", "45s"
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (hours, minutes) {
        (0, 0) => format!("{}s", seconds),
        (0, m) => format!("{}min", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}min", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::host::sim::SimWorld;
    use crate::host::{Transform, Vec3};

    const MINUTE: Duration = Duration::from_secs(60);

    struct Fixture {
        world: Arc<SimWorld>,
        clock: Arc<ManualClock>,
        manager: RentalManager,
    }

    fn fixture() -> Fixture {
        let world = Arc::new(SimWorld::new());
        let clock = Arc::new(ManualClock::new());
        let manager = RentalManager::new(
            RentalConfig::default(),
            Collaborators::from_world(world.clone()),
            clock.clone(),
        );
        Fixture {
            world,
            clock,
            manager,
        }
    }

    fn at_desk(world: &SimWorld, name: &str, balance: u64) -> PlayerId {
        world.join(
            name,
            balance,
            Transform {
                position: Vec3::new(200.0, 5.0, 301.0),
                yaw: 90.0,
            },
        )
    }

    /// Advance in check-sized steps, keeping the renter active, running due checks
    fn drive_active(f: &mut Fixture, renter: PlayerId, minutes: u64) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..minutes * 2 {
            f.clock.advance(MINUTE / 2);
            f.manager.record_activity(renter);
            outcomes.extend(f.manager.run_due_checks().into_iter().map(|(_, o)| o));
        }
        outcomes
    }

    #[test]
    fn test_rent_with_exact_balance() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 200);

        let vehicle = f.manager.request_rental(alice).unwrap();

        assert_eq!(f.world.balance_of(alice), Some(0));
        let session = f.manager.session(alice).unwrap();
        assert!(!session.warned);
        assert_eq!(session.vehicle, vehicle);
        assert_eq!(session.start_time, session.last_activity);
        assert!(f.manager.is_check_scheduled(alice));

        let notices = f.world.notices_for(alice);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, Severity::Success);
    }

    #[test]
    fn test_vehicle_spawns_in_front_of_renter() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 500);

        let vehicle = f.manager.request_rental(alice).unwrap();
        let spawned = f.world.vehicle(vehicle).unwrap();

        assert_eq!(spawned.vehicle_type, 44);
        assert_eq!(spawned.owner, alice);
        assert_eq!(spawned.yaw, 90.0);
        assert!((spawned.position.x - 205.0).abs() < 1e-3);
        assert!((spawned.position.z - 301.0).abs() < 1e-3);
    }

    #[test]
    fn test_second_request_is_rejected_without_charge() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 1000);
        f.manager.request_rental(alice).unwrap();

        let err = f.manager.request_rental(alice).unwrap_err();

        assert_eq!(err, RentalError::AlreadyRenting);
        assert_eq!(f.world.balance_of(alice), Some(800));
        assert_eq!(f.world.spawns_attempted(), 1);
        assert_eq!(f.world.vehicle_count(), 1);
        assert_eq!(f.manager.active_count(), 1);
    }

    #[test]
    fn test_insufficient_funds_spawns_nothing() {
        let mut f = fixture();
        let bob = at_desk(&f.world, "bob", 199);

        let err = f.manager.request_rental(bob).unwrap_err();

        assert_eq!(
            err,
            RentalError::InsufficientFunds {
                balance: 199,
                price: 200
            }
        );
        assert_eq!(f.world.balance_of(bob), Some(199));
        assert!(f.world.ledger().is_empty());
        assert_eq!(f.world.spawns_attempted(), 0);
        assert!(!f.manager.has_session(bob));
    }

    #[test]
    fn test_failed_spawn_refunds_the_renter() {
        let mut f = fixture();
        let carol = at_desk(&f.world, "carol", 450);
        f.world.fail_spawns(true);

        let err = f.manager.request_rental(carol).unwrap_err();

        assert!(matches!(err, RentalError::SpawnFailed(_)));
        assert_eq!(f.world.balance_of(carol), Some(450));
        let net: i64 = f.world.ledger().iter().map(|e| e.amount).sum();
        assert_eq!(net, 0);
        assert!(!f.manager.has_session(carol));
        assert!(!f.manager.is_check_scheduled(carol));
    }

    #[test]
    fn test_renew_resets_period_and_warning() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 400);
        f.manager.request_rental(alice).unwrap();

        let outcomes = drive_active(&mut f, alice, 61);
        assert!(outcomes.contains(&CheckOutcome::Warned));
        assert!(f.manager.session(alice).unwrap().warned);

        f.manager.renew_rental(alice).unwrap();

        let session = f.manager.session(alice).unwrap();
        assert!(!session.warned);
        assert_eq!(session.start_time, f.clock.now());
        assert_eq!(session.last_activity, f.clock.now());
        assert_eq!(f.world.balance_of(alice), Some(0));
        assert_eq!(f.manager.time_remaining(alice), Some(Duration::from_secs(7200)));
        assert!(f.manager.is_check_scheduled(alice));

        // The old period's warning doesn't carry over: a new one fires an hour later
        let outcomes = drive_active(&mut f, alice, 59);
        assert!(!outcomes.contains(&CheckOutcome::Warned));
        let outcomes = drive_active(&mut f, alice, 2);
        assert!(outcomes.contains(&CheckOutcome::Warned));
    }

    #[test]
    fn test_renew_errors() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 250);

        assert_eq!(f.manager.renew_rental(alice), Err(RentalError::NoActiveSession));

        f.manager.request_rental(alice).unwrap();
        assert_eq!(
            f.manager.renew_rental(alice),
            Err(RentalError::InsufficientFunds {
                balance: 50,
                price: 200
            })
        );
        assert_eq!(f.world.balance_of(alice), Some(50));
    }

    #[test]
    fn test_warning_fires_once_per_period() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 200);
        f.manager.request_rental(alice).unwrap();

        f.clock.advance(61 * MINUTE);
        f.manager.record_activity(alice);
        assert_eq!(f.manager.periodic_check(alice), CheckOutcome::Warned);
        assert!(f.manager.session(alice).unwrap().warned);

        f.clock.advance(4 * MINUTE);
        f.manager.record_activity(alice);
        assert_eq!(f.manager.periodic_check(alice), CheckOutcome::Ongoing);

        let warnings = f
            .world
            .notices_for(alice)
            .into_iter()
            .filter(|n| n.severity == Severity::Warning)
            .count();
        assert_eq!(warnings, 1);
    }

    #[test]
    fn test_rental_expires_after_full_period() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 200);
        let vehicle = f.manager.request_rental(alice).unwrap();

        let outcomes = drive_active(&mut f, alice, 121);

        assert_eq!(outcomes.last(), Some(&CheckOutcome::Ended(EndReason::Expired)));
        assert!(!f.manager.has_session(alice));
        assert!(f.world.vehicle(vehicle).is_none());
        assert!(!f.manager.is_check_scheduled(alice));
        let last = f.world.notices_for(alice).pop().unwrap();
        assert_eq!(last.message, EndReason::Expired.notice().unwrap());
    }

    #[test]
    fn test_expiry_with_recent_activity_still_ends() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 200);
        f.manager.request_rental(alice).unwrap();

        f.clock.advance(121 * MINUTE);
        f.manager.record_activity(alice);

        // Warning and expiry both apply in one cycle; the session still ends
        assert_eq!(
            f.manager.periodic_check(alice),
            CheckOutcome::Ended(EndReason::Expired)
        );
    }

    #[test]
    fn test_inactivity_ends_rental_early() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 200);
        let vehicle = f.manager.request_rental(alice).unwrap();

        f.clock.advance(11 * MINUTE);

        assert_eq!(
            f.manager.periodic_check(alice),
            CheckOutcome::Ended(EndReason::Inactivity)
        );
        assert!(f.world.vehicle(vehicle).is_none());
        let last = f.world.notices_for(alice).pop().unwrap();
        assert_eq!(last.message, EndReason::Inactivity.notice().unwrap());
    }

    #[test]
    fn test_inactivity_wins_over_warning() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 200);
        f.manager.request_rental(alice).unwrap();

        f.clock.advance(50 * MINUTE);
        f.manager.record_activity(alice);
        f.clock.advance(15 * MINUTE);

        assert_eq!(
            f.manager.periodic_check(alice),
            CheckOutcome::Ended(EndReason::Inactivity)
        );
        assert!(f
            .world
            .notices_for(alice)
            .iter()
            .all(|n| !n.message.contains("expires in")));
    }

    #[test]
    fn test_movement_keeps_rental_alive() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 200);
        f.manager.request_rental(alice).unwrap();

        let outcomes = drive_active(&mut f, alice, 30);

        assert!(f.manager.has_session(alice));
        assert!(outcomes.iter().all(|o| *o == CheckOutcome::Ongoing));
        // Two checks per minute at the 30 second cadence
        assert_eq!(outcomes.len(), 60);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 200);
        f.manager.request_rental(alice).unwrap();

        assert!(f.manager.end_rental(alice, EndReason::Returned));
        assert!(!f.manager.end_rental(alice, EndReason::Expired));
        assert!(!f.manager.cleanup_session(alice));

        assert_eq!(f.world.destroys_attempted(), 1);
        assert_eq!(f.world.vehicle_count(), 0);
        let endings = f
            .world
            .notices_for(alice)
            .into_iter()
            .filter(|n| n.severity == Severity::Warning)
            .count();
        assert_eq!(endings, 1);
    }

    #[test]
    fn test_destroy_failure_does_not_block_cleanup() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 200);
        f.manager.request_rental(alice).unwrap();
        f.world.fail_destroys(true);

        assert!(f.manager.cleanup_session(alice));

        assert!(!f.manager.has_session(alice));
        assert!(!f.manager.is_check_scheduled(alice));
        assert_eq!(f.world.vehicle_count(), 1);
    }

    #[test]
    fn test_disconnected_renter_is_cleaned_on_next_check() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 200);
        let vehicle = f.manager.request_rental(alice).unwrap();
        let notices_before = f.world.notices().len();

        f.world.set_connected(alice, false);
        f.clock.advance(Duration::from_secs(30));
        let outcomes = f.manager.run_due_checks();

        assert_eq!(outcomes, vec![(alice, CheckOutcome::RenterGone)]);
        assert!(f.world.vehicle(vehicle).is_none());
        assert!(!f.manager.is_check_scheduled(alice));
        assert_eq!(f.world.notices().len(), notices_before);
    }

    #[test]
    fn test_at_most_one_session_per_renter() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 2000);
        let bob = at_desk(&f.world, "bob", 2000);

        for round in 0..4 {
            let _ = f.manager.request_rental(alice);
            let _ = f.manager.request_rental(bob);
            let _ = f.manager.request_rental(alice);
            let _ = f.manager.renew_rental(bob);
            if round % 2 == 0 {
                f.manager.end_rental(alice, EndReason::Returned);
            }
            assert!(f.manager.active_count() <= 2);
            assert_eq!(f.world.vehicle_count(), f.manager.active_count());
        }
        assert_eq!(f.manager.snapshot().len(), 2);
    }

    #[test]
    fn test_shutdown_reclaims_everything() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 200);
        let bob = at_desk(&f.world, "bob", 200);
        f.manager.request_rental(alice).unwrap();
        f.manager.request_rental(bob).unwrap();

        assert_eq!(f.manager.shutdown(), 2);

        assert_eq!(f.manager.active_count(), 0);
        assert_eq!(f.world.vehicle_count(), 0);
        assert_eq!(f.manager.next_check_due(), None);
        assert_eq!(f.manager.shutdown(), 0);
    }

    #[test]
    fn test_snapshot_reports_progress() {
        let mut f = fixture();
        let alice = at_desk(&f.world, "alice", 200);
        f.manager.request_rental(alice).unwrap();
        f.clock.advance(20 * MINUTE);
        f.manager.record_activity(alice);
        f.clock.advance(2 * MINUTE);

        let snapshot = f.manager.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].elapsed_secs, 22 * 60);
        assert_eq!(snapshot[0].idle_secs, 2 * 60);
        assert_eq!(snapshot[0].remaining_secs, 98 * 60);
        assert!(!snapshot[0].warned);
    }

    #[test]
    fn test_unrepresentable_check_interval_does_not_abort_rental() {
        let world = Arc::new(SimWorld::new());
        let clock = Arc::new(ManualClock::new());
        let config = RentalConfig {
            check_interval: Duration::from_secs(i64::MAX as u64),
            ..RentalConfig::default()
        };
        let mut manager = RentalManager::new(
            config,
            Collaborators::from_world(world.clone()),
            clock.clone(),
        );
        let alice = at_desk(&world, "alice", 200);

        manager.request_rental(alice).unwrap();
        assert!(manager.has_session(alice));
        assert!(!manager.is_check_scheduled(alice));
        assert_eq!(manager.next_check_due(), None);

        clock.advance(3 * 60 * MINUTE);
        assert!(manager.run_due_checks().is_empty());
        assert!(manager.end_rental(alice, EndReason::Returned));
        assert_eq!(world.vehicle_count(), 0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h 30min");
        assert_eq!(format_duration(Duration::from_secs(600)), "10min");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
    }
}
