//! Shared scenario helpers: unit-property configurations on small grids.
#![allow(dead_code)]

use meltsim_core::config::{
    Config, Properties, SamplingConfig, SamplingKind, SourceConfig, SpaceConfig, TimeConfig,
};
use meltsim_core::{LocalGrid, Solver};

/// Configuration with unit material properties (`k = rho = cp = 1`, so
/// `alpha = 1`) on `[0, extent]^3` with unit cells. The mushy interval is
/// pushed far above any test temperature unless a test overrides it.
pub fn unit_config(extent: [f64; 3], co: f64, end_time: f64) -> Config {
    Config {
        time: TimeConfig {
            co,
            start_time: 0.0,
            end_time,
            total_output_steps: 0,
            total_monitor_steps: 0,
        },
        space: SpaceConfig {
            initial_temperature: 0.0,
            cell_size: 1.0,
            global_low_corner: [0.0, 0.0, 0.0],
            global_high_corner: extent,
            ranks_per_dim: [0, 0, 0],
        },
        properties: Properties {
            density: 1.0,
            specific_heat: 1.0,
            thermal_conductivity: 1.0,
            latent_heat: 0.0,
            solidus: 1.0e5,
            liquidus: 2.0e5,
        },
        source: SourceConfig {
            absorption: 1.0,
            two_sigma: [2.0_f64.sqrt(); 3],
            scan_path_file: "unused.txt".to_string(),
        },
        sampling: None,
    }
}

pub fn sampling_into(directory: &std::path::Path) -> SamplingConfig {
    SamplingConfig {
        kind: SamplingKind::SolidificationData,
        format: "default".to_string(),
        directory_name: directory.display().to_string(),
    }
}

/// One source-free step: copy to the previous buffer, diffuse, refresh the
/// ghost layer.
pub fn diffuse_step(grid: &mut LocalGrid, solver: &Solver) {
    grid.store_previous();
    let (block, t, t0) = grid.step_views();
    solver.step(block, t, t0, 0.0, [0.0; 3]);
    grid.update_boundaries();
    grid.gather();
}

/// Sum of the owned cells.
pub fn owned_sum(grid: &LocalGrid) -> f64 {
    let block = grid.block();
    let t = grid.temperature();
    let mut sum = 0.0;
    for k in 1..=block.nz {
        for j in 1..=block.ny {
            for i in 1..=block.nx {
                sum += t[block.idx(i, j, k)];
            }
        }
    }
    sum
}

/// Maximum of `|T - reference|` over the owned cells.
pub fn owned_max_error(grid: &LocalGrid, reference: f64) -> f64 {
    let block = grid.block();
    let t = grid.temperature();
    let mut max = 0.0_f64;
    for k in 1..=block.nz {
        for j in 1..=block.ny {
            for i in 1..=block.nx {
                max = max.max((t[block.idx(i, j, k)] - reference).abs());
            }
        }
    }
    max
}

pub fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("meltsim_it_{name}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
