mod clock;
mod config;
mod host;
mod plugin;
mod rental;
mod scenario;
mod service;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clock::SystemClock;
use config::RentalConfig;
use host::desktop::DesktopNotifier;
use host::sim::SimWorld;
use host::{Collaborators, PlayerId, Transform, Vec3};
use plugin::{RentalMenu, RentalPlugin};
use rental::RentalManager;
use service::RentalHandle;

#[derive(Parser, Debug)]
#[command(name = "rentpoint")]
#[command(author = "Sean Fournier")]
#[command(version = "0.1.0")]
#[command(about = "Timed vehicle rentals for multiplayer game servers")]
struct Args {
    /// Replay a scenario file and print the JSON report
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Use this config file instead of the one in the user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML
    #[arg(long)]
    print_config: bool,

    /// Show rental notices as desktop notifications (console mode)
    #[arg(short, long)]
    desktop_notifications: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for reports
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RentalConfig::load_from(path)?,
        None => RentalConfig::load()?,
    };

    if args.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Some(path) = &args.scenario {
        return run_scenario(path, &config);
    }

    run_console(config, args.desktop_notifications).await
}

fn run_scenario(path: &Path, config: &RentalConfig) -> Result<()> {
    let scenario = scenario::Scenario::load(path)?;
    let report = scenario.run(config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Interactive host: a simulated world driven from stdin
async fn run_console(config: RentalConfig, desktop_notifications: bool) -> Result<()> {
    let world = Arc::new(SimWorld::new());
    let mut services = Collaborators::from_world(world.clone());
    if desktop_notifications {
        services = services.with_notifier(Arc::new(DesktopNotifier::new("rentpoint")));
    }

    let tick = config.scheduler_tick;
    let rental_point = config.rental_point;
    let manager = RentalManager::new(config, services, Arc::new(SystemClock));
    let (handle, task) = service::spawn(RentalPlugin::new(manager), tick);

    // Notices produced by background checks show up without waiting for input
    let printer = {
        let world = world.clone();
        tokio::spawn(async move {
            let mut every = tokio::time::interval(Duration::from_millis(500));
            loop {
                every.tick().await;
                print_notices(&world);
            }
        })
    };

    println!("rentpoint console, rental point at {}. Type 'help' for commands.", rental_point);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        match run_command(&world, &handle, rental_point, &words).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("error: {}", e),
        }
        print_notices(&world);
    }

    let reclaimed = handle.shutdown().await?;
    task.await.context("Rental service panicked")?;
    printer.abort();
    print_notices(&world);
    println!("Reclaimed {} vehicle(s), bye.", reclaimed);
    Ok(())
}

/// Returns Ok(false) when the console should exit
async fn run_command(
    world: &SimWorld,
    handle: &RentalHandle,
    rental_point: Vec3,
    words: &[&str],
) -> Result<bool> {
    match words {
        ["help"] => print_help(),
        ["quit"] | ["exit"] => return Ok(false),
        ["join", name, balance] => {
            let balance: u64 = balance.parse().context("Balance must be a number")?;
            let id = world.join(
                name,
                balance,
                Transform {
                    position: rental_point,
                    yaw: 0.0,
                },
            );
            println!("{} joined as {} with {}", name, id, balance);
        }
        ["goto", name, x, y, z] => {
            let id = find_player(world, name)?;
            let position = Vec3::new(parse_coord(x)?, parse_coord(y)?, parse_coord(z)?);
            world.move_to(id, position);
            handle.player_moved(id)?;
        }
        ["face", name, yaw] => {
            let id = find_player(world, name)?;
            world.face(id, parse_coord(yaw)?);
            handle.player_moved(id)?;
        }
        ["use", name] => {
            let id = find_player(world, name)?;
            let position = world
                .player(id)
                .map(|p| p.transform.position)
                .unwrap_or_default();
            match handle.player_input(id, position).await? {
                Some(RentalMenu::Offer {
                    vehicle,
                    price,
                    duration_secs,
                }) => println!(
                    "Rent a {} for {} ({}). Type 'rent {}' to confirm.",
                    vehicle,
                    rental::format_duration(Duration::from_secs(duration_secs)),
                    price,
                    name
                ),
                Some(RentalMenu::Manage {
                    minutes_left,
                    renew_price,
                }) => println!(
                    "{} minutes left. 'renew {}' ({}) or 'return {}'.",
                    minutes_left, name, renew_price, name
                ),
                None => println!("Nothing here. The rental point is at {}.", rental_point),
            }
        }
        ["rent", name] => {
            handle.rent(find_player(world, name)?).await?;
        }
        ["renew", name] => {
            handle.renew(find_player(world, name)?).await?;
        }
        ["return", name] => {
            if !handle.return_vehicle(find_player(world, name)?).await? {
                println!("{} has no vehicle to return", name);
            }
        }
        ["leave", name] => {
            let id = find_player(world, name)?;
            world.set_connected(id, false);
            handle.player_disconnected(id)?;
        }
        ["status"] => {
            let sessions = handle.snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
            for vehicle in world.vehicles() {
                println!("{} parked at {}", vehicle.handle, vehicle.position);
            }
            println!(
                "{} vehicle(s) in the world, {} spawn and {} destroy request(s) so far",
                world.vehicle_count(),
                world.spawns_attempted(),
                world.destroys_attempted()
            );
        }
        ["wallet", name] => {
            let id = find_player(world, name)?;
            let balance = world.balance_of(id).unwrap_or_default();
            println!("{} has {}", name, balance);
        }
        ["fault", kind, state] => {
            let fail = match *state {
                "on" => true,
                "off" => false,
                _ => anyhow::bail!("Expected 'on' or 'off', got '{}'", state),
            };
            match *kind {
                "spawn" => world.fail_spawns(fail),
                "destroy" => world.fail_destroys(fail),
                _ => anyhow::bail!("Unknown fault '{}', use 'spawn' or 'destroy'", kind),
            }
            println!("{} failures {}", kind, state);
        }
        _ => println!("Unknown command, type 'help'"),
    }
    Ok(true)
}

fn find_player(world: &SimWorld, name: &str) -> Result<PlayerId> {
    world
        .find(name)
        .with_context(|| format!("No player named '{}'", name))
}

fn parse_coord(value: &str) -> Result<f32> {
    value
        .parse()
        .with_context(|| format!("'{}' is not a number", value))
}

fn print_notices(world: &SimWorld) {
    for notice in world.drain_notices() {
        let name = world
            .name_of(notice.player)
            .unwrap_or_else(|| notice.player.to_string());
        println!("[{}] {:?} to {}: {}", notice.title, notice.severity, name, notice.message);
    }
}

fn print_help() {
    println!(
        "\
join <name> <balance>     add a player standing at the rental point
goto <name> <x> <y> <z>   move a player
face <name> <yaw>         turn a player
use <name>                interact (opens the menu near the rental point)
rent <name>               confirm a rental
renew <name>              pay for another period
return <name>             hand the vehicle back
leave <name>              disconnect a player
status                    list active rentals
wallet <name>             show a player's balance
fault <spawn|destroy> <on|off>
                          make the world refuse spawns or destroys
quit                      reclaim every vehicle and exit"
    );
}
