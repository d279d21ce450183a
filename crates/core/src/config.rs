//! Simulation input schema, validation, and derived run parameters.
//!
//! Inputs are a single JSON document with `time`, `space`, `properties`,
//! `source`, and an optional `sampling` section. Loading validates every
//! field and computes the derived quantities (stable time step, step count,
//! output/monitor intervals) that the rest of the crate consumes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Time integration controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Courant number; the stable step is `Co * h^2 / alpha`.
    #[serde(rename = "Co")]
    pub co: f64,
    pub start_time: f64,
    pub end_time: f64,
    /// Number of full-field snapshots over the run; 0 suppresses snapshots.
    pub total_output_steps: u32,
    /// Number of wall-clock monitor entries over the run; 0 suppresses them.
    pub total_monitor_steps: u32,
}

/// Spatial domain controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceConfig {
    pub initial_temperature: f64,
    pub cell_size: f64,
    pub global_low_corner: [f64; 3],
    pub global_high_corner: [f64; 3],
    /// Requested ranks per axis. Zeros (or a product that disagrees with the
    /// communicator size) select the automatic balanced factorization.
    #[serde(default)]
    pub ranks_per_dim: [usize; 3],
}

/// Material properties. Units are SI throughout (kg/m^3, J/(kg K), W/(m K),
/// J/kg, K).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Properties {
    pub density: f64,
    pub specific_heat: f64,
    pub thermal_conductivity: f64,
    pub latent_heat: f64,
    pub solidus: f64,
    pub liquidus: f64,
}

/// Moving heat source controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Absorption efficiency, unitless.
    pub absorption: f64,
    /// Beam diameters (two standard deviations) per axis, meters. Stored as
    /// absolute values.
    pub two_sigma: [f64; 3],
    pub scan_path_file: String,
}

/// Optional solidification sampling controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(rename = "type")]
    pub kind: SamplingKind,
    #[serde(default)]
    pub format: String,
    #[serde(default = "default_sampling_directory")]
    pub directory_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingKind {
    #[serde(rename = "solidification_data")]
    SolidificationData,
}

fn default_sampling_directory() -> String {
    "solidification".to_string()
}

/// Event file format: the gradient columns are written for `Default` and
/// omitted for `Exaca`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingFormat {
    Default,
    Exaca,
}

impl SamplingConfig {
    /// Resolved output format. Anything other than `"exaca"` selects the
    /// default format.
    pub fn resolved_format(&self) -> SamplingFormat {
        if self.format == "exaca" {
            SamplingFormat::Exaca
        } else {
            SamplingFormat::Default
        }
    }
}

/// Parameters derived from the configuration that drive the stepping loop.
#[derive(Debug, Clone, Copy)]
pub struct RunParams {
    /// Stable explicit time step, seconds.
    pub dt: f64,
    pub num_steps: usize,
    pub output_interval: usize,
    pub monitor_interval: usize,
}

/// Full simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub time: TimeConfig,
    pub space: SpaceConfig,
    pub properties: Properties,
    pub source: SourceConfig,
    #[serde(default)]
    pub sampling: Option<SamplingConfig>,
}

impl Config {
    /// Load and validate a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| Error::InputRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Config =
            serde_json::from_str(&contents).map_err(|source| Error::InputParse {
                path: path.to_path_buf(),
                source,
            })?;

        config.source.two_sigma = config.source.two_sigma.map(f64::abs);
        config.validate()?;
        Ok(config)
    }

    /// Check every startup invariant. Violations are fatal.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(Error::InvalidConfig(reason));

        if !(self.time.co > 0.0) {
            return invalid(format!("time.Co must be positive, got {}", self.time.co));
        }
        if self.time.end_time <= self.time.start_time {
            return invalid(format!(
                "time.end_time ({}) must exceed time.start_time ({})",
                self.time.end_time, self.time.start_time
            ));
        }
        if !(self.space.cell_size > 0.0) {
            return invalid(format!(
                "space.cell_size must be positive, got {}",
                self.space.cell_size
            ));
        }
        for d in 0..3 {
            let extent = self.space.global_high_corner[d] - self.space.global_low_corner[d];
            if !(extent > 0.0) {
                return invalid(format!(
                    "domain extent along axis {d} must be positive, got {extent}"
                ));
            }
        }
        let p = &self.properties;
        if !(p.density > 0.0) || !(p.specific_heat > 0.0) || !(p.thermal_conductivity > 0.0) {
            return invalid(
                "properties.density, specific_heat, and thermal_conductivity must be positive"
                    .to_string(),
            );
        }
        if p.liquidus <= p.solidus {
            return invalid(format!(
                "properties.liquidus ({}) must exceed properties.solidus ({})",
                p.liquidus, p.solidus
            ));
        }
        if !(self.source.absorption > 0.0) {
            return invalid(format!(
                "source.absorption must be positive, got {}",
                self.source.absorption
            ));
        }
        for (d, sigma) in self.source.two_sigma.iter().enumerate() {
            if !(*sigma > 0.0) {
                return invalid(format!(
                    "source.two_sigma[{d}] must be non-zero, got {sigma}"
                ));
            }
        }
        if self.source.scan_path_file.is_empty() {
            return invalid("source.scan_path_file must not be empty".to_string());
        }
        Ok(())
    }

    /// Thermal diffusivity `alpha = k / (rho * cp)`, m^2/s.
    pub fn thermal_diffusivity(&self) -> f64 {
        self.properties.thermal_conductivity
            / (self.properties.density * self.properties.specific_heat)
    }

    /// Derive the stable time step, step count, and output/monitor intervals.
    pub fn run_params(&self) -> RunParams {
        let h = self.space.cell_size;
        let dt = self.time.co * h * h / self.thermal_diffusivity();
        let num_steps = ((self.time.end_time - self.time.start_time) / dt) as usize;

        RunParams {
            dt,
            num_steps,
            output_interval: interval(self.time.total_output_steps, num_steps),
            monitor_interval: interval(self.time.total_monitor_steps, num_steps),
        }
    }

    /// Echo the full parameter set. Call on rank 0 only.
    pub fn log_summary(&self, params: &RunParams) {
        info!("Simulation will be performed using parameters:");
        info!("Time:");
        info!("  Co: {}", self.time.co);
        info!("  Start Time: {}", self.time.start_time);
        info!("  End Time: {}", self.time.end_time);
        info!("  Num Output Steps: {}", self.time.total_output_steps);
        info!("  Num Monitor Steps: {}", self.time.total_monitor_steps);
        info!("  Calculated time step: {}", params.dt);
        info!("Space:");
        info!(
            "  Initial temperature: {}",
            self.space.initial_temperature
        );
        info!("  Cell Size: {}", self.space.cell_size);
        info!("  Global Low Corner: {:?}", self.space.global_low_corner);
        info!("  Global High Corner: {:?}", self.space.global_high_corner);
        info!("Properties:");
        info!("  Density: {}", self.properties.density);
        info!("  Specific Heat: {}", self.properties.specific_heat);
        info!(
            "  Thermal Conductivity: {}",
            self.properties.thermal_conductivity
        );
        info!("  Latent Heat: {}", self.properties.latent_heat);
        info!("  Solidus: {}", self.properties.solidus);
        info!("  Liquidus: {}", self.properties.liquidus);
        info!("Source:");
        info!("  Absorption: {}", self.source.absorption);
        info!("  two-sigma: {:?}", self.source.two_sigma);
        info!("  scan path file: {}", self.source.scan_path_file);
        match &self.sampling {
            Some(sampling) => {
                info!("Sampling:");
                info!("  type: {:?}", sampling.kind);
                info!("  format: {:?}", sampling.resolved_format());
                info!("  directory name: {}", sampling.directory_name);
            }
            None => info!("Skipping optional sampling."),
        }
    }
}

/// Interval between emissions for a requested number of emissions over
/// `num_steps`. A request of 0 pushes the interval past the end of the run.
fn interval(total_steps: u32, num_steps: usize) -> usize {
    if total_steps == 0 {
        num_steps + 1
    } else {
        (num_steps / total_steps as usize).clamp(1, num_steps.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            time: TimeConfig {
                co: 0.25,
                start_time: 0.0,
                end_time: 1.0e-3,
                total_output_steps: 2,
                total_monitor_steps: 10,
            },
            space: SpaceConfig {
                initial_temperature: 300.0,
                cell_size: 25.0e-6,
                global_low_corner: [0.0, 0.0, 0.0],
                global_high_corner: [1.0e-3, 1.0e-3, 0.5e-3],
                ranks_per_dim: [0, 0, 0],
            },
            properties: Properties {
                density: 7952.0,
                specific_heat: 578.0,
                thermal_conductivity: 23.7,
                latent_heat: 2.6e5,
                solidus: 1658.0,
                liquidus: 1723.0,
            },
            source: SourceConfig {
                absorption: 0.36,
                two_sigma: [100.0e-6, 100.0e-6, 50.0e-6],
                scan_path_file: "scan.txt".to_string(),
            },
            sampling: None,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_liquidus_below_solidus_rejected() {
        let mut config = base_config();
        config.properties.liquidus = config.properties.solidus;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("liquidus"), "got: {err}");
    }

    #[test]
    fn test_nonpositive_cell_size_rejected() {
        let mut config = base_config();
        config.space.cell_size = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_scan_path_rejected() {
        let mut config = base_config();
        config.source.scan_path_file.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_time_step_derivation() {
        let config = base_config();
        let params = config.run_params();
        let alpha = 23.7 / (7952.0 * 578.0);
        let expected = 0.25 * 25.0e-6 * 25.0e-6 / alpha;
        assert!(
            (params.dt - expected).abs() < 1e-18,
            "dt was {}",
            params.dt
        );
        assert_eq!(params.num_steps, (1.0e-3 / expected) as usize);
    }

    #[test]
    fn test_interval_suppressed_when_zero() {
        assert_eq!(interval(0, 100), 101);
    }

    #[test]
    fn test_interval_clamped() {
        assert_eq!(interval(200, 100), 1);
        assert_eq!(interval(4, 100), 25);
        assert_eq!(interval(1, 100), 100);
    }

    #[test]
    fn test_json_round_trip_with_sampling() {
        let text = r#"{
            "time": {"Co": 0.25, "start_time": 0.0, "end_time": 1e-3,
                     "total_output_steps": 2, "total_monitor_steps": 10},
            "space": {"initial_temperature": 300.0, "cell_size": 25e-6,
                      "global_low_corner": [0.0, 0.0, 0.0],
                      "global_high_corner": [1e-3, 1e-3, 0.5e-3]},
            "properties": {"density": 7952.0, "specific_heat": 578.0,
                           "thermal_conductivity": 23.7, "latent_heat": 2.6e5,
                           "solidus": 1658.0, "liquidus": 1723.0},
            "source": {"absorption": 0.36, "two_sigma": [1e-4, 1e-4, -5e-5],
                       "scan_path_file": "scan.txt"},
            "sampling": {"type": "solidification_data", "format": "unknown"}
        }"#;
        let mut config: Config = serde_json::from_str(text).unwrap();
        config.source.two_sigma = config.source.two_sigma.map(f64::abs);
        assert!(config.validate().is_ok());
        assert_eq!(config.space.ranks_per_dim, [0, 0, 0]);
        assert!(config.source.two_sigma[2] > 0.0);

        let sampling = config.sampling.unwrap();
        assert_eq!(sampling.kind, SamplingKind::SolidificationData);
        assert_eq!(sampling.resolved_format(), SamplingFormat::Default);
        assert_eq!(sampling.directory_name, "solidification");
    }

    #[test]
    fn test_unknown_sampling_type_rejected() {
        let text = r#"{"type": "melt_pool_shape"}"#;
        assert!(serde_json::from_str::<SamplingConfig>(text).is_err());
    }

    #[test]
    fn test_missing_required_key_rejected() {
        // properties.liquidus is absent.
        let text = r#"{
            "time": {"Co": 0.25, "start_time": 0.0, "end_time": 1e-3,
                     "total_output_steps": 0, "total_monitor_steps": 0},
            "space": {"initial_temperature": 300.0, "cell_size": 25e-6,
                      "global_low_corner": [0.0, 0.0, 0.0],
                      "global_high_corner": [1e-3, 1e-3, 0.5e-3]},
            "properties": {"density": 7952.0, "specific_heat": 578.0,
                           "thermal_conductivity": 23.7, "latent_heat": 2.6e5,
                           "solidus": 1658.0},
            "source": {"absorption": 0.36, "two_sigma": [1e-4, 1e-4, 5e-5],
                       "scan_path_file": "scan.txt"}
        }"#;
        assert!(serde_json::from_str::<Config>(text).is_err());
    }
}
