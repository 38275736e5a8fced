//! Scripted rental simulations
//!
//! A scenario file describes players and timed actions. The runner replays
//! them against [`SimWorld`] on a [`ManualClock`], running every periodic
//! check at its exact due time, and reports what the players saw.
//!
//! ```toml
//! run_until = 7500
//!
//! [[player]]
//! name = "alice"
//! balance = 400
//! position = { x = 200.0, y = 5.0, z = 301.0 }
//!
//! [[step]]
//! at = 0
//! player = "alice"
//! action = "rent"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::ManualClock;
use crate::config::RentalConfig;
use crate::host::sim::{LedgerEntry, Notice, SimVehicle, SimWorld};
use crate::host::{Collaborators, PlayerId, Transform, Vec3};
use crate::plugin::{MenuAction, RentalMenu, RentalPlugin};
use crate::rental::{CheckOutcome, RentalManager, SessionSnapshot};

/// Longest timeline a scenario may describe, in seconds
pub const MAX_SCENARIO_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Overrides for the default rental settings
    #[serde(default)]
    pub config: Option<RentalConfig>,

    #[serde(default, rename = "player")]
    pub players: Vec<ScenarioPlayer>,

    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,

    /// Keep simulating after the last step, in seconds from the start
    #[serde(default)]
    pub run_until: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioPlayer {
    pub name: String,
    #[serde(default)]
    pub balance: u64,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub yaw: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Seconds since the start of the scenario
    pub at: u64,
    pub player: String,
    pub action: Action,
    /// Destination for `move`
    #[serde(default)]
    pub position: Option<Vec3>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Input,
    Rent,
    Renew,
    Return,
    Move,
    Disconnect,
    Reconnect,
}

/// One line of the scenario timeline
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub at: u64,
    pub player: String,
    pub what: String,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub finished_at: u64,
    pub events: Vec<Event>,
    pub notices: Vec<Notice>,
    pub ledger: Vec<LedgerEntry>,
    pub vehicles: Vec<SimVehicle>,
    pub sessions: Vec<SessionSnapshot>,
}

impl Scenario {
    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(content).context("Invalid scenario")?;
        if let Some(config) = &scenario.config {
            config.validate()?;
        }
        if let Some(until) = scenario.run_until {
            if until > MAX_SCENARIO_SECS {
                anyhow::bail!("run_until ({}s) is past the {}s limit", until, MAX_SCENARIO_SECS);
            }
        }
        for step in &scenario.steps {
            if step.at > MAX_SCENARIO_SECS {
                anyhow::bail!("Step at {}s is past the {}s limit", step.at, MAX_SCENARIO_SECS);
            }
            if !scenario.players.iter().any(|p| p.name == step.player) {
                anyhow::bail!("Step at {}s refers to unknown player '{}'", step.at, step.player);
            }
            if step.action == Action::Move && step.position.is_none() {
                anyhow::bail!("Move at {}s needs a position", step.at);
            }
        }
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content)
    }

    /// Run with `base` unless the scenario carries its own config
    pub fn run(&self, base: &RentalConfig) -> Result<Report> {
        let config = self.config.clone().unwrap_or_else(|| base.clone());
        let world = Arc::new(SimWorld::new());
        let clock = Arc::new(ManualClock::new());
        let manager = RentalManager::new(
            config,
            Collaborators::from_world(world.clone()),
            clock.clone(),
        );
        let mut runner = Runner {
            world,
            clock,
            plugin: RentalPlugin::new(manager),
            events: Vec::new(),
        };

        for player in &self.players {
            runner.world.join(
                &player.name,
                player.balance,
                Transform {
                    position: player.position,
                    yaw: player.yaw,
                },
            );
        }
        runner.plugin.on_init();

        let mut steps = self.steps.clone();
        steps.sort_by_key(|s| s.at);
        for step in &steps {
            runner.advance_to(Duration::from_secs(step.at))?;
            runner.apply(step)?;
        }

        if let Some(until) = self.run_until {
            runner.advance_to(Duration::from_secs(until))?;
        }

        Ok(runner.report())
    }
}

struct Runner {
    world: Arc<SimWorld>,
    clock: Arc<ManualClock>,
    plugin: RentalPlugin,
    events: Vec<Event>,
}

impl Runner {
    fn now_secs(&self) -> u64 {
        self.clock.elapsed().as_secs()
    }

    /// Move the clock forward, stopping at every due check on the way
    fn advance_to(&mut self, target: Duration) -> Result<()> {
        let target = self
            .clock
            .origin()
            .checked_add(target)
            .with_context(|| format!("Cannot simulate {}s ahead", target.as_secs()))?;
        loop {
            match self.plugin.next_check_due() {
                Some(due) if due <= target => {
                    self.clock.set_elapsed(due - self.clock.origin());
                    let outcomes = self.plugin.tick();
                    self.record_checks(outcomes);
                }
                _ => break,
            }
        }
        self.clock.set_elapsed(target.saturating_duration_since(self.clock.origin()));
        Ok(())
    }

    fn record_checks(&mut self, outcomes: Vec<(PlayerId, CheckOutcome)>) {
        for (renter, outcome) in outcomes {
            let what = match outcome {
                CheckOutcome::Ongoing | CheckOutcome::NoSession => continue,
                CheckOutcome::Warned => "expiry warning".to_string(),
                CheckOutcome::RenterGone => "reclaimed after disconnect".to_string(),
                CheckOutcome::Ended(reason) => format!("ended: {:?}", reason).to_lowercase(),
            };
            let player = self.world.name_of(renter).unwrap_or_else(|| renter.to_string());
            self.events.push(Event {
                at: self.now_secs(),
                player,
                what,
            });
        }
    }

    fn apply(&mut self, step: &Step) -> Result<()> {
        let player = self
            .world
            .find(&step.player)
            .with_context(|| format!("Unknown player '{}'", step.player))?;

        let what = match step.action {
            Action::Input => {
                let position = self
                    .world
                    .player(player)
                    .map(|p| p.transform.position)
                    .unwrap_or_default();
                match self.plugin.on_player_input(player, position) {
                    Some(RentalMenu::Offer { price, .. }) => {
                        format!("offered a rental for {}", price)
                    }
                    Some(RentalMenu::Manage { minutes_left, .. }) => {
                        format!("manage menu, {} min left", minutes_left)
                    }
                    None => "too far from the rental point".to_string(),
                }
            }
            Action::Rent => outcome("rent", self.plugin.select(player, MenuAction::Rent)),
            Action::Renew => outcome("renew", self.plugin.select(player, MenuAction::Renew)),
            Action::Return => outcome("return", self.plugin.select(player, MenuAction::Return)),
            Action::Move => {
                if let Some(position) = step.position {
                    self.world.move_to(player, position);
                }
                self.plugin.on_player_move(player);
                "moved".to_string()
            }
            Action::Disconnect => {
                self.world.set_connected(player, false);
                self.plugin.on_player_disconnected(player);
                "disconnected".to_string()
            }
            Action::Reconnect => {
                self.world.set_connected(player, true);
                "reconnected".to_string()
            }
        };

        self.events.push(Event {
            at: self.now_secs(),
            player: step.player.clone(),
            what,
        });
        Ok(())
    }

    fn report(self) -> Report {
        Report {
            finished_at: self.now_secs(),
            events: self.events,
            notices: self.world.notices(),
            ledger: self.world.ledger(),
            vehicles: self.world.vehicles(),
            sessions: self.plugin.snapshot(),
        }
    }
}

fn outcome(verb: &str, accepted: bool) -> String {
    if accepted {
        format!("{} accepted", verb)
    } else {
        format!("{} refused", verb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INACTIVE_RENTER: &str = r#"
        [[player]]
        name = "alice"
        balance = 200
        position = { x = 200.0, y = 5.0, z = 301.0 }

        [[step]]
        at = 0
        player = "alice"
        action = "rent"

        [[step]]
        at = 300
        player = "alice"
        action = "move"
        position = { x = 210.0, y = 5.0, z = 310.0 }

        [[step]]
        at = 1500
        player = "alice"
        action = "input"
    "#;

    #[test]
    fn test_inactive_renter_loses_vehicle() {
        let scenario = Scenario::parse(INACTIVE_RENTER).unwrap();
        let report = scenario.run(&RentalConfig::default()).unwrap();

        // Last movement at 300s, first check at or past 900s is at 900s
        let ended = report
            .events
            .iter()
            .find(|e| e.what == "ended: inactivity")
            .unwrap();
        assert_eq!(ended.at, 900);
        assert!(report.vehicles.is_empty());
        assert!(report.sessions.is_empty());
        assert_eq!(report.ledger.len(), 1);
        assert_eq!(report.events.last().unwrap().what, "too far from the rental point");
        assert_eq!(report.finished_at, 1500);
    }

    #[test]
    fn test_long_rental_is_warned_then_collected() {
        let mut content = String::from(
            r#"
            run_until = 7300

            [[player]]
            name = "bob"
            balance = 500
            position = { x = 200.0, y = 5.0, z = 300.0 }

            [[step]]
            at = 0
            player = "bob"
            action = "rent"
            "#,
        );
        // Keep moving every five minutes
        for minute in (5..=120).step_by(5) {
            content.push_str(&format!(
                "\n[[step]]\nat = {}\nplayer = \"bob\"\naction = \"move\"\nposition = {{ x = 1.0, y = 0.0, z = 1.0 }}\n",
                minute * 60
            ));
        }

        let report = Scenario::parse(&content)
            .unwrap()
            .run(&RentalConfig::default())
            .unwrap();

        let warned: Vec<_> = report.events.iter().filter(|e| e.what == "expiry warning").collect();
        assert_eq!(warned.len(), 1);
        assert_eq!(warned[0].at, 3600);
        let ended = report.events.iter().find(|e| e.what == "ended: expired").unwrap();
        assert_eq!(ended.at, 7200);
        assert!(report.vehicles.is_empty());
        assert_eq!(report.notices.len(), 3);
    }

    #[test]
    fn test_unknown_player_is_rejected() {
        let content = r#"
            [[step]]
            at = 0
            player = "nobody"
            action = "rent"
        "#;
        assert!(Scenario::parse(content).is_err());
    }

    #[test]
    fn test_scenario_config_overrides_base() {
        let content = r#"
            [config]
            price = 50
            rental_duration = 600
            warning_after = 300

            [[player]]
            name = "carol"
            balance = 60
            position = { x = 200.0, y = 5.0, z = 300.0 }

            [[step]]
            at = 0
            player = "carol"
            action = "rent"

            [[step]]
            at = 10
            player = "carol"
            action = "disconnect"
        "#;
        let report = Scenario::parse(content)
            .unwrap()
            .run(&RentalConfig::default())
            .unwrap();

        assert_eq!(report.ledger[0].amount, -50);
        assert!(report.vehicles.is_empty());
        assert_eq!(report.events[1].what, "disconnected");
    }

    #[test]
    fn test_timeline_past_limit_is_rejected() {
        let content = format!("run_until = {}\n\n[[player]]\nname = \"dave\"\n", i64::MAX);
        assert!(Scenario::parse(&content).is_err());

        let content = format!("run_until = {}\n", MAX_SCENARIO_SECS);
        let report = Scenario::parse(&content)
            .unwrap()
            .run(&RentalConfig::default())
            .unwrap();
        assert_eq!(report.finished_at, MAX_SCENARIO_SECS);

        let content = format!(
            "[[player]]\nname = \"dave\"\n\n[[step]]\nat = {}\nplayer = \"dave\"\naction = \"input\"\n",
            i64::MAX
        );
        assert!(Scenario::parse(&content).is_err());
    }

    #[test]
    fn test_huge_check_interval_is_rejected() {
        let content = format!(
            r#"
            [config]
            check_interval = {}

            [[player]]
            name = "erin"
            balance = 300

            [[step]]
            at = 0
            player = "erin"
            action = "rent"
            "#,
            i64::MAX
        );
        assert!(Scenario::parse(&content).is_err());
    }
}
