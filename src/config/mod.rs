use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::host::Vec3;

pub const DEFAULT_VEHICLE_TYPE_ID: u32 = 44;
pub const DEFAULT_VEHICLE_NAME: &str = "Peugeot 206";
pub const DEFAULT_PRICE: u64 = 200;
pub const DEFAULT_RENTAL_DURATION: Duration = Duration::from_secs(2 * 60 * 60);
pub const DEFAULT_WARNING_AFTER: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_INACTIVITY_LIMIT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_SCHEDULER_TICK: Duration = Duration::from_secs(1);
pub const DEFAULT_RENTAL_POINT: Vec3 = Vec3::new(200.0, 5.0, 300.0);
pub const DEFAULT_PROXIMITY_RADIUS: f32 = 3.0;
pub const DEFAULT_SPAWN_DISTANCE: f32 = 5.0;

/// Upper bound for every configured duration
pub const MAX_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Rental point settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RentalConfig {
    /// Vehicle model spawned for renters
    pub vehicle_type_id: u32,

    /// Display name of that model
    pub vehicle_name: String,

    /// Charged for every rental period, including renewals
    pub price: u64,

    #[serde(with = "secs")]
    pub rental_duration: Duration,

    /// Elapsed time after which the renter is told the rental will run out
    #[serde(with = "secs")]
    pub warning_after: Duration,

    /// A renter who hasn't moved for this long loses the vehicle
    #[serde(with = "secs")]
    pub inactivity_limit: Duration,

    /// Cadence of the per-session expiry checks
    #[serde(with = "secs")]
    pub check_interval: Duration,

    /// How often the service looks for due checks
    #[serde(with = "secs")]
    pub scheduler_tick: Duration,

    /// Players closer than this to the rental point get the menu
    pub proximity_radius: f32,

    /// Vehicles appear this far in front of the renter
    pub spawn_distance: f32,

    /// Title used for every notice
    pub notice_title: String,

    pub rental_point: Vec3,
}

impl Default for RentalConfig {
    fn default() -> Self {
        Self {
            vehicle_type_id: DEFAULT_VEHICLE_TYPE_ID,
            vehicle_name: DEFAULT_VEHICLE_NAME.to_string(),
            price: DEFAULT_PRICE,
            rental_duration: DEFAULT_RENTAL_DURATION,
            warning_after: DEFAULT_WARNING_AFTER,
            inactivity_limit: DEFAULT_INACTIVITY_LIMIT,
            check_interval: DEFAULT_CHECK_INTERVAL,
            scheduler_tick: DEFAULT_SCHEDULER_TICK,
            proximity_radius: DEFAULT_PROXIMITY_RADIUS,
            spawn_distance: DEFAULT_SPAWN_DISTANCE,
            notice_title: "Rental".to_string(),
            rental_point: DEFAULT_RENTAL_POINT,
        }
    }
}

impl RentalConfig {
    /// Get the config file path
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("rentpoint");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from the user config directory, or create default
    pub fn load() -> Result<Self> {
        let path = match Self::config_path() {
            Ok(p) => p,
            Err(_) => return Ok(RentalConfig::default()),
        };

        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str::<RentalConfig>(&content) {
                    Ok(config) => match config.validate() {
                        Ok(()) => return Ok(config),
                        Err(e) => tracing::warn!("Ignoring invalid config: {}", e),
                    },
                    Err(e) => tracing::warn!("Failed to parse config: {}", e),
                },
                Err(e) => tracing::warn!("Failed to read config: {}", e),
            }
            return Ok(RentalConfig::default());
        }

        let config = RentalConfig::default();
        if let Err(e) = config.save_to(&path) {
            tracing::warn!("Could not write default config: {}", e);
        }
        Ok(config)
    }

    /// Load an explicit config file. Unlike [`RentalConfig::load`] errors are not swallowed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: RentalConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rental_duration.is_zero() {
            anyhow::bail!("rental_duration must be positive");
        }
        if self.warning_after >= self.rental_duration {
            anyhow::bail!(
                "warning_after ({}s) must be shorter than rental_duration ({}s)",
                self.warning_after.as_secs(),
                self.rental_duration.as_secs()
            );
        }
        if self.inactivity_limit.is_zero() {
            anyhow::bail!("inactivity_limit must be positive");
        }
        if self.check_interval.is_zero() || self.scheduler_tick.is_zero() {
            anyhow::bail!("check_interval and scheduler_tick must be positive");
        }
        for (name, value) in [
            ("rental_duration", self.rental_duration),
            ("inactivity_limit", self.inactivity_limit),
            ("check_interval", self.check_interval),
            ("scheduler_tick", self.scheduler_tick),
        ] {
            if value > MAX_DURATION {
                anyhow::bail!(
                    "{} ({}s) exceeds the limit of {}s",
                    name,
                    value.as_secs(),
                    MAX_DURATION.as_secs()
                );
            }
        }
        if self.proximity_radius <= 0.0 {
            anyhow::bail!("proximity_radius must be positive");
        }
        Ok(())
    }
}

/// Durations stored as whole seconds
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
