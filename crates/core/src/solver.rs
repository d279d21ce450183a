//! Explicit FTCS update with latent heat and a moving Gaussian source.
//!
//! One step advances every owned cell from the previous-step field: a
//! six-point centered Laplacian, an anisotropic Gaussian volumetric source
//! centered on the beam, and an apparent heat capacity that folds the latent
//! heat of fusion into `rho * cp` across the mushy interval. Cells are
//! independent within a step, so the update runs parallel over z-planes.

use rayon::prelude::*;

use crate::config::Config;
use crate::grid::Block;

/// Precomputed step constants and the per-cell FTCS kernel.
#[derive(Debug, Clone)]
pub struct Solver {
    dt: f64,
    solidus: f64,
    liquidus: f64,
    rho_cp: f64,
    /// `rho * Lf / (liquidus - solidus)`: latent heat released per kelvin
    /// across the mushy interval.
    rho_lf_by_dt: f64,
    k_by_h2: f64,
    /// Inverse squared Gaussian radii per axis.
    a_inv: [f64; 3],
    /// Peak volumetric intensity of the source at unit power.
    i0: f64,
    /// Cutoff in the Gaussian's natural variable (three standard
    /// deviations from the beam center).
    w_max: f64,
}

impl Solver {
    pub fn new(config: &Config) -> Self {
        let h = config.space.cell_size;
        let p = &config.properties;

        let mut r = [0.0; 3];
        let mut a_inv = [0.0; 3];
        for d in 0..3 {
            r[d] = config.source.two_sigma[d] / 2.0_f64.sqrt();
            a_inv[d] = 1.0 / (r[d] * r[d]);
        }

        let pi = std::f64::consts::PI;
        let i0 = 2.0 * config.source.absorption / (pi * pi.sqrt() * r[0] * r[1] * r[2]);

        Solver {
            dt: config.run_params().dt,
            solidus: p.solidus,
            liquidus: p.liquidus,
            rho_cp: p.density * p.specific_heat,
            rho_lf_by_dt: p.density * p.latent_heat / (p.liquidus - p.solidus),
            k_by_h2: p.thermal_conductivity / (h * h),
            a_inv,
            i0,
            w_max: 3.0_f64.ln() + 2.0 * 10.0_f64.ln(),
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Advance one step: read the previous field `t0` (ghosts included),
    /// write every owned cell of `t`. Ghosts of `t0` must be authoritative
    /// from the previous step's boundary update and halo gather.
    pub fn step(&self, block: Block, t: &mut [f64], t0: &[f64], power: f64, beam: [f64; 3]) {
        let row = block.row_len();
        let plane = block.plane_len();

        t.par_chunks_mut(plane)
            .enumerate()
            .skip(1)
            .take(block.nz)
            .for_each(|(k, t_plane)| {
                for j in 1..=block.ny {
                    for i in 1..=block.nx {
                        let offset = j * row + i;
                        let c = k * plane + offset;
                        let x = t0[c];

                        // Apparent heat capacity across the mushy interval.
                        let dt_by_ceff = if x >= self.solidus && x <= self.liquidus {
                            self.dt / (self.rho_cp + self.rho_lf_by_dt)
                        } else {
                            self.dt / self.rho_cp
                        };

                        let laplacian = self.k_by_h2
                            * (t0[c - 1]
                                + t0[c + 1]
                                + t0[c - row]
                                + t0[c + row]
                                + t0[c - plane]
                                + t0[c + plane]
                                - 6.0 * x);

                        let source = self.source(block.coordinate(i, j, k), beam, power);

                        t_plane[offset] = x + (laplacian + source) * dt_by_ceff;
                    }
                }
            });
    }

    /// Volumetric heating at a cell center. The exponential is skipped when
    /// the power is off or the cell lies beyond the cutoff.
    #[inline]
    fn source(&self, cell: [f64; 3], beam: [f64; 3], power: f64) -> f64 {
        if power <= 0.0 {
            return 0.0;
        }
        let mut w = 0.0;
        for d in 0..3 {
            let dist = cell[d] - beam[d];
            w += dist * dist * self.a_inv[d];
        }
        if w < self.w_max {
            self.i0 * power * (-w).exp()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Properties, SourceConfig, SpaceConfig, TimeConfig};

    fn unit_config() -> Config {
        Config {
            time: TimeConfig {
                co: 0.1,
                start_time: 0.0,
                end_time: 10.0,
                total_output_steps: 0,
                total_monitor_steps: 0,
            },
            space: SpaceConfig {
                initial_temperature: 0.0,
                cell_size: 1.0,
                global_low_corner: [0.0; 3],
                global_high_corner: [5.0; 3],
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
                scan_path_file: "scan.txt".to_string(),
            },
            sampling: None,
        }
    }

    fn field(block: &Block, value: f64) -> Vec<f64> {
        vec![value; block.total_len()]
    }

    #[test]
    fn test_precomputed_constants() {
        let solver = Solver::new(&unit_config());
        // Co * h^2 / alpha with alpha = 1.
        assert!((solver.dt() - 0.1).abs() < 1e-15);
        // two_sigma = sqrt(2) gives unit radii, so A_inv = 1 and
        // I0 = 2 / pi^(3/2).
        let pi = std::f64::consts::PI;
        assert!((solver.a_inv[0] - 1.0).abs() < 1e-12);
        assert!((solver.i0 - 2.0 / (pi * pi.sqrt())).abs() < 1e-12);
        // Cutoff at ln(3) + 2 ln(10) = ln(300).
        assert!((solver.w_max - 300.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_uniform_field_is_stationary_without_power() {
        let block = Block::new(3, 3, 3, 1.0, [0.0; 3]);
        let solver = Solver::new(&unit_config());
        let t0 = field(&block, 500.0);
        let mut t = field(&block, 0.0);

        solver.step(block, &mut t, &t0, 0.0, [0.0; 3]);

        for k in 1..=3 {
            for j in 1..=3 {
                for i in 1..=3 {
                    assert_eq!(t[block.idx(i, j, k)], 500.0);
                }
            }
        }
    }

    #[test]
    fn test_hot_cell_diffuses_by_explicit_formula() {
        let block = Block::new(3, 3, 3, 1.0, [0.0; 3]);
        let solver = Solver::new(&unit_config());
        let mut t0 = field(&block, 0.0);
        t0[block.idx(2, 2, 2)] = 1.0;
        let mut t = field(&block, 0.0);

        solver.step(block, &mut t, &t0, 0.0, [0.0; 3]);

        // Center: x + dt * (0 - 6x) = 1 - 0.6.
        assert!((t[block.idx(2, 2, 2)] - 0.4).abs() < 1e-15);
        // Each face neighbor gains dt * x = 0.1.
        assert!((t[block.idx(1, 2, 2)] - 0.1).abs() < 1e-15);
        assert!((t[block.idx(2, 3, 2)] - 0.1).abs() < 1e-15);
        // Diagonal neighbors are untouched by the 6-point stencil.
        assert_eq!(t[block.idx(1, 1, 2)], 0.0);
    }

    #[test]
    fn test_latent_heat_slows_mushy_cells() {
        let mut config = unit_config();
        config.properties.solidus = 0.0;
        config.properties.liquidus = 10.0;
        config.properties.latent_heat = 40.0;
        let solver = Solver::new(&config);
        let block = Block::new(3, 3, 3, 1.0, [0.0; 3]);

        // Center inside the mushy interval, one neighbor hotter.
        let mut t0 = field(&block, 5.0);
        t0[block.idx(1, 2, 2)] = 9.0;
        let mut t = field(&block, 0.0);
        solver.step(block, &mut t, &t0, 0.0, [0.0; 3]);
        let mushy_rise = t[block.idx(2, 2, 2)] - 5.0;

        // Same gradient far above the liquidus: no latent heat term.
        let mut t0 = field(&block, 500.0);
        t0[block.idx(1, 2, 2)] = 504.0;
        let mut t = field(&block, 0.0);
        solver.step(block, &mut t, &t0, 0.0, [0.0; 3]);
        let liquid_rise = t[block.idx(2, 2, 2)] - 500.0;

        // rho * Lf / dT = 4, so C_eff is 5x the liquid heat capacity.
        assert!(
            (liquid_rise / mushy_rise - 5.0).abs() < 1e-9,
            "mushy {mushy_rise}, liquid {liquid_rise}"
        );
    }

    #[test]
    fn test_distant_beam_leaves_field_untouched() {
        let block = Block::new(3, 3, 3, 1.0, [0.0; 3]);
        let solver = Solver::new(&unit_config());
        let t0 = field(&block, 100.0);
        let mut t = field(&block, 0.0);

        // Power on, but the whole block is beyond the cutoff radius.
        solver.step(block, &mut t, &t0, 500.0, [100.0, 100.0, 100.0]);

        for k in 1..=3 {
            for j in 1..=3 {
                for i in 1..=3 {
                    assert_eq!(t[block.idx(i, j, k)], 100.0);
                }
            }
        }
    }

    #[test]
    fn test_powered_beam_heats_nearest_cell_most() {
        let block = Block::new(3, 3, 3, 1.0, [0.0; 3]);
        let solver = Solver::new(&unit_config());
        let t0 = field(&block, 0.0);
        let mut t = field(&block, 0.0);

        // Beam on the center cell of the top plane.
        solver.step(block, &mut t, &t0, 100.0, [2.0, 2.0, 3.0]);

        let center = t[block.idx(2, 2, 3)];
        assert!(center > 0.0);
        assert!(center > t[block.idx(1, 2, 3)]);
        assert!(center > t[block.idx(2, 2, 2)]);
    }

    #[test]
    fn test_source_peaks_at_beam_center_and_cuts_off() {
        let solver = Solver::new(&unit_config());
        let beam = [2.5; 3];

        let at_center = solver.source(beam, beam, 100.0);
        let pi = std::f64::consts::PI;
        assert!((at_center - 200.0 / (pi * pi.sqrt())).abs() < 1e-9);

        let near = solver.source([3.0, 2.5, 2.5], beam, 100.0);
        assert!(near > 0.0 && near < at_center);

        // Beyond three standard deviations the host path returns zero.
        let far = solver.source([2.5 + 20.0, 2.5, 2.5], beam, 100.0);
        assert_eq!(far, 0.0);

        // No power, no source.
        assert_eq!(solver.source(beam, beam, 0.0), 0.0);
    }
}
