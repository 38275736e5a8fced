//! Rental service task
//!
//! The plugin is owned by a single tokio task. Player callbacks, menu choices
//! and the check ticker all become messages on one queue, handled strictly
//! one at a time, so no two transitions ever overlap.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::host::{PlayerId, Vec3};
use crate::plugin::{MenuAction, RentalMenu, RentalPlugin};
use crate::rental::{CheckOutcome, SessionSnapshot};

/// Messages accepted by the service task
#[derive(Debug)]
pub enum RentalCommand {
    PlayerInput {
        player: PlayerId,
        position: Vec3,
        reply: oneshot::Sender<Option<RentalMenu>>,
    },
    PlayerMoved(PlayerId),
    PlayerDisconnected(PlayerId),
    Select {
        player: PlayerId,
        action: MenuAction,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<SessionSnapshot>>,
    },
    Shutdown {
        reply: oneshot::Sender<usize>,
    },
}

/// Cheap, cloneable sender side of the service
#[derive(Debug, Clone)]
pub struct RentalHandle {
    tx: mpsc::UnboundedSender<RentalCommand>,
}

impl RentalHandle {
    fn send(&self, command: RentalCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| anyhow::anyhow!("Rental service has stopped"))
    }

    pub async fn player_input(
        &self,
        player: PlayerId,
        position: Vec3,
    ) -> Result<Option<RentalMenu>> {
        let (reply, rx) = oneshot::channel();
        self.send(RentalCommand::PlayerInput {
            player,
            position,
            reply,
        })?;
        rx.await.context("Rental service dropped the request")
    }

    pub fn player_moved(&self, player: PlayerId) -> Result<()> {
        self.send(RentalCommand::PlayerMoved(player))
    }

    pub fn player_disconnected(&self, player: PlayerId) -> Result<()> {
        self.send(RentalCommand::PlayerDisconnected(player))
    }

    pub async fn select(&self, player: PlayerId, action: MenuAction) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(RentalCommand::Select {
            player,
            action,
            reply,
        })?;
        rx.await.context("Rental service dropped the request")
    }

    pub async fn rent(&self, player: PlayerId) -> Result<bool> {
        self.select(player, MenuAction::Rent).await
    }

    pub async fn renew(&self, player: PlayerId) -> Result<bool> {
        self.select(player, MenuAction::Renew).await
    }

    pub async fn return_vehicle(&self, player: PlayerId) -> Result<bool> {
        self.select(player, MenuAction::Return).await
    }

    pub async fn snapshot(&self) -> Result<Vec<SessionSnapshot>> {
        let (reply, rx) = oneshot::channel();
        self.send(RentalCommand::Snapshot { reply })?;
        rx.await.context("Rental service dropped the request")
    }

    /// Reclaim every vehicle and stop the task. Returns how many were reclaimed.
    pub async fn shutdown(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(RentalCommand::Shutdown { reply })?;
        rx.await.context("Rental service dropped the request")
    }
}

/// Start the service task. `tick` is how often due checks are looked for.
pub fn spawn(plugin: RentalPlugin, tick: Duration) -> (RentalHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(plugin, rx, tick));
    (RentalHandle { tx }, task)
}

async fn run(
    mut plugin: RentalPlugin,
    mut rx: mpsc::UnboundedReceiver<RentalCommand>,
    tick: Duration,
) {
    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    plugin.on_init();

    loop {
        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else {
                    // Every handle is gone; nobody can reach the vehicles anymore
                    plugin.on_destroy();
                    break;
                };
                if !handle_command(&mut plugin, command) {
                    break;
                }
            }
            _ = ticker.tick() => {
                for (renter, outcome) in plugin.tick() {
                    if let CheckOutcome::Ended(reason) = outcome {
                        tracing::debug!("Check ended the rental of {} ({:?})", renter, reason);
                    }
                }
            }
        }
    }

    tracing::info!("Rental service stopped");
}

/// Returns false once the service should stop
fn handle_command(plugin: &mut RentalPlugin, command: RentalCommand) -> bool {
    match command {
        RentalCommand::PlayerInput {
            player,
            position,
            reply,
        } => {
            let _ = reply.send(plugin.on_player_input(player, position));
        }
        RentalCommand::PlayerMoved(player) => plugin.on_player_move(player),
        RentalCommand::PlayerDisconnected(player) => plugin.on_player_disconnected(player),
        RentalCommand::Select {
            player,
            action,
            reply,
        } => {
            let _ = reply.send(plugin.select(player, action));
        }
        RentalCommand::Snapshot { reply } => {
            let _ = reply.send(plugin.snapshot());
        }
        RentalCommand::Shutdown { reply } => {
            let _ = reply.send(plugin.on_destroy());
            return false;
        }
    }
    true
}
