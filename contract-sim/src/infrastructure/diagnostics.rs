//! Channel diagnostics
//!
//! Deploys terrestrial operators and their users over a square area, places a
//! LEO satellite moving along x, and computes link gains in dB. Output is
//! logged for sanity checking only; nothing here feeds the mechanisms.
//!
//! - Satellite links: free-space path loss, antenna gains, rain fade
//! - Terrestrial links: UMi-LoS style `A log10(d) + B + C log10(f_GHz)`,
//!   plus log-normal shadowing

use contract_core::ConfigError;
use rand::prelude::*;
use rand_distr::{Normal, Poisson};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, info};

pub const SPEED_OF_LIGHT: f64 = 3e8;

/// Terrestrial path loss is flat below this distance
const MIN_TERRESTRIAL_DISTANCE_M: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub area_width_m: f64,
    pub area_height_m: f64,
    pub num_operators: usize,
    /// Mean of the Poisson user count per operator
    pub users_per_operator: f64,
    pub cell_radius_m: f64,
    pub satellite_altitude_m: f64,
    pub satellite_velocity_mps: f64,
    /// Snapshot time for the satellite position
    pub time_s: f64,
    pub satellite_frequency_hz: f64,
    pub terrestrial_frequency_hz: f64,
    pub satellite_antenna_gain_db: f64,
    pub user_antenna_gain_db: f64,
    pub terrestrial_antenna_gain_db: f64,
    pub rain_fade_db: f64,
    pub path_loss_a: f64,
    pub path_loss_b: f64,
    pub path_loss_c: f64,
    pub shadowing_std_db: f64,
    pub seed: Option<u64>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            area_width_m: 20_000.0,
            area_height_m: 20_000.0,
            num_operators: 10,
            users_per_operator: 15.0,
            cell_radius_m: 1_000.0,
            satellite_altitude_m: 600_000.0,
            satellite_velocity_mps: 7_500.0,
            time_s: 1.0,
            satellite_frequency_hz: 20e9,
            terrestrial_frequency_hz: 3.5e9,
            satellite_antenna_gain_db: 30.0,
            user_antenna_gain_db: 0.0,
            terrestrial_antenna_gain_db: 15.0,
            rain_fade_db: 3.0,
            path_loss_a: 21.0,
            path_loss_b: 32.4,
            path_loss_c: 20.0,
            shadowing_std_db: 4.0,
            seed: Some(42),
        }
    }
}

impl DiagnosticsConfig {
    /// Reject settings the deployment sampler or the path-loss models cannot use
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("area_width_m", self.area_width_m),
            ("area_height_m", self.area_height_m),
            ("users_per_operator", self.users_per_operator),
            ("satellite_frequency_hz", self.satellite_frequency_hz),
            ("terrestrial_frequency_hz", self.terrestrial_frequency_hz),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidSetting(format!(
                    "diagnostics {} must be positive and finite, got {}",
                    name, value
                )));
            }
        }

        let non_negative = [
            ("cell_radius_m", self.cell_radius_m),
            ("satellite_altitude_m", self.satellite_altitude_m),
            ("shadowing_std_db", self.shadowing_std_db),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidSetting(format!(
                    "diagnostics {} must be non-negative and finite, got {}",
                    name, value
                )));
            }
        }

        let finite = [
            ("satellite_velocity_mps", self.satellite_velocity_mps),
            ("time_s", self.time_s),
            ("satellite_antenna_gain_db", self.satellite_antenna_gain_db),
            ("user_antenna_gain_db", self.user_antenna_gain_db),
            ("terrestrial_antenna_gain_db", self.terrestrial_antenna_gain_db),
            ("rain_fade_db", self.rain_fade_db),
            ("path_loss_a", self.path_loss_a),
            ("path_loss_b", self.path_loss_b),
            ("path_loss_c", self.path_loss_c),
        ];
        if let Some((name, value)) = finite.into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::InvalidSetting(format!(
                "diagnostics {} must be finite, got {}",
                name, value
            )));
        }
        Ok(())
    }
}

#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    10.0 * linear.log10()
}

/// `20 log10(4 pi d / lambda)`
pub fn free_space_path_loss_db(distance_m: f64, frequency_hz: f64) -> f64 {
    let wavelength = SPEED_OF_LIGHT / frequency_hz;
    20.0 * (4.0 * PI * distance_m / wavelength).log10()
}

pub fn terrestrial_path_loss_db(distance_m: f64, config: &DiagnosticsConfig) -> f64 {
    let d = distance_m.max(MIN_TERRESTRIAL_DISTANCE_M);
    config.path_loss_a * d.log10()
        + config.path_loss_b
        + config.path_loss_c * (config.terrestrial_frequency_hz / 1e9).log10()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn ground(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }
}

/// Satellite position at time `t`, flying along x over the middle of the area
pub fn satellite_position(config: &DiagnosticsConfig, time_s: f64) -> Position {
    Position {
        x: (config.satellite_velocity_mps * time_s).rem_euclid(config.area_width_m),
        y: config.area_height_m / 2.0,
        z: config.satellite_altitude_m,
    }
}

/// Satellite to ground gain (dB)
pub fn satellite_gain_db(satellite: &Position, ground: &Position, config: &DiagnosticsConfig) -> f64 {
    let path_loss = free_space_path_loss_db(satellite.distance(ground), config.satellite_frequency_hz);
    config.satellite_antenna_gain_db + config.user_antenna_gain_db - path_loss - config.rain_fade_db
}

/// Base station to user gain (dB), `shadowing_db` drawn by the caller
pub fn terrestrial_gain_db(
    station: &Position,
    user: &Position,
    shadowing_db: f64,
    config: &DiagnosticsConfig,
) -> f64 {
    config.terrestrial_antenna_gain_db + config.user_antenna_gain_db
        - terrestrial_path_loss_db(station.distance(user), config)
        - shadowing_db
}

#[derive(Debug, Clone)]
pub struct Deployment {
    pub satellite: Position,
    pub operators: Vec<Position>,
    /// Users of each operator, same order as `operators`
    pub users: Vec<Vec<Position>>,
}

impl Deployment {
    pub fn generate<R: Rng + ?Sized>(config: &DiagnosticsConfig, rng: &mut R) -> Result<Self, ConfigError> {
        config.validate()?;
        let user_count = Poisson::new(config.users_per_operator)
            .map_err(|e| ConfigError::InvalidSetting(format!("users_per_operator: {}", e)))?;

        let operators: Vec<Position> = (0..config.num_operators)
            .map(|_| {
                Position::ground(
                    rng.gen_range(0.0..config.area_width_m),
                    rng.gen_range(0.0..config.area_height_m),
                )
            })
            .collect();

        let users = operators
            .iter()
            .map(|station| {
                let count: f64 = user_count.sample(rng);
                (0..count as usize)
                    .map(|_| {
                        // sqrt keeps users uniform over the disc
                        let radius = config.cell_radius_m * rng.gen_range(0.0f64..1.0).sqrt();
                        let angle = 2.0 * PI * rng.gen_range(0.0f64..1.0);
                        Position::ground(station.x + radius * angle.cos(), station.y + radius * angle.sin())
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            satellite: satellite_position(config, config.time_s),
            operators,
            users,
        })
    }

    pub fn num_users(&self) -> usize {
        self.users.iter().map(Vec::len).sum()
    }
}

/// Link summary for one operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorLink {
    pub operator: usize,
    pub users: usize,
    pub satellite_gain_db: f64,
    /// `None` when the operator has no users
    pub mean_user_gain_db: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub total_users: usize,
    pub links: Vec<OperatorLink>,
}

/// Deploy nodes, compute gains and log them
pub fn run_diagnostics(config: &DiagnosticsConfig) -> Result<ChannelReport, ConfigError> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let shadowing = Normal::new(0.0, config.shadowing_std_db)
        .map_err(|e| ConfigError::InvalidSetting(format!("shadowing_std_db: {}", e)))?;
    let deployment = Deployment::generate(config, &mut rng)?;

    info!(
        operators = deployment.operators.len(),
        users = deployment.num_users(),
        satellite = ?deployment.satellite,
        "Deployment generated"
    );

    let mut links = Vec::with_capacity(deployment.operators.len());
    for (i, (station, users)) in deployment.operators.iter().zip(&deployment.users).enumerate() {
        let satellite_gain = satellite_gain_db(&deployment.satellite, station, config);
        let gains: Vec<f64> = users
            .iter()
            .map(|user| terrestrial_gain_db(station, user, shadowing.sample(&mut rng), config))
            .collect();
        // Average received power, not dB values
        let linear: Vec<f64> = gains.iter().map(|&g| db_to_linear(g)).collect();
        let mean_user_gain = contract_core::stats::mean(&linear).map(linear_to_db);

        debug!(
            operator = i,
            users = users.len(),
            satellite_gain_db = satellite_gain,
            mean_user_gain_db = ?mean_user_gain,
            "Link gains"
        );
        links.push(OperatorLink {
            operator: i,
            users: users.len(),
            satellite_gain_db: satellite_gain,
            mean_user_gain_db: mean_user_gain,
        });
    }

    Ok(ChannelReport {
        total_users: deployment.num_users(),
        links,
    })
}
