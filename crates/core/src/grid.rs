//! Distributed structured grid owning the temperature fields.
//!
//! Each rank holds one axis-aligned block of the global uniform lattice plus
//! a single layer of ghost cells on every face. The grid owns the current
//! and previous temperature fields, applies physical boundary conditions to
//! its global-boundary ghosts, and swaps halo slabs with Cartesian neighbors
//! for interior ghosts.

use std::path::Path;

use tracing::info;

use crate::boundary::{Boundary, BoundaryCondition};
use crate::comm::Communicator;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::partition::Partition;
use crate::snapshot;

/// Shape and geometry of one rank's block, including the ghost layer.
///
/// Storage is a flat buffer with x fastest and z slowest:
/// `idx(i, j, k) = (k * (ny + 2) + j) * (nx + 2) + i`, with owned cells at
/// `1..=n` along each axis and ghosts at `0` and `n + 1`.
#[derive(Debug, Clone, Copy)]
pub struct Block {
    /// Owned cells along x.
    pub nx: usize,
    /// Owned cells along y.
    pub ny: usize,
    /// Owned cells along z.
    pub nz: usize,
    /// Cell size, meters.
    pub cell_size: f64,
    /// Physical coordinate offset such that the center of local cell `i`
    /// along axis `d` is `origin[d] + i * cell_size`.
    pub origin: [f64; 3],
}

impl Block {
    pub fn new(nx: usize, ny: usize, nz: usize, cell_size: f64, origin: [f64; 3]) -> Self {
        Block {
            nx,
            ny,
            nz,
            cell_size,
            origin,
        }
    }

    #[inline]
    pub fn row_len(&self) -> usize {
        self.nx + 2
    }

    #[inline]
    pub fn plane_len(&self) -> usize {
        (self.nx + 2) * (self.ny + 2)
    }

    #[inline]
    pub fn total_len(&self) -> usize {
        self.plane_len() * (self.nz + 2)
    }

    #[inline]
    pub fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        (k * (self.ny + 2) + j) * (self.nx + 2) + i
    }

    /// Cell-center physical coordinates of a local (ghost-inclusive) index.
    #[inline]
    pub fn coordinate(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        [
            self.origin[0] + i as f64 * self.cell_size,
            self.origin[1] + j as f64 * self.cell_size,
            self.origin[2] + k as f64 * self.cell_size,
        ]
    }

    pub fn owned_cells(&self) -> usize {
        self.nx * self.ny * self.nz
    }
}

/// One rank's view of the distributed temperature field.
pub struct LocalGrid {
    comm: Box<dyn Communicator>,
    partition: Partition,
    block: Block,
    boundary: Boundary,
    /// Current temperature, Kelvin.
    t: Vec<f64>,
    /// Previous-step temperature. A separate allocation, never aliased
    /// with `t`.
    t0: Vec<f64>,
}

impl LocalGrid {
    /// Construct the local block of the global domain, partition it across
    /// the communicator, and initialize both fields to
    /// `initial_temperature`. Ghosts are made authoritative immediately
    /// (boundary update followed by a halo gather).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        comm: Box<dyn Communicator>,
        cell_size: f64,
        global_low_corner: [f64; 3],
        global_high_corner: [f64; 3],
        ranks_per_dim: [usize; 3],
        conditions: [BoundaryCondition; 6],
        initial_temperature: f64,
    ) -> Result<Self> {
        let mut num_cells = [0usize; 3];
        for d in 0..3 {
            let extent = global_high_corner[d] - global_low_corner[d];
            let cells = (extent / cell_size).round();
            if !(cells >= 1.0) {
                return Err(Error::InvalidConfig(format!(
                    "domain extent {extent} along axis {d} is smaller than one cell"
                )));
            }
            num_cells[d] = cells as usize;
        }

        let partition = Partition::new(comm.size(), comm.rank(), ranks_per_dim, num_cells)?;
        if comm.rank() == 0 {
            info!(
                "Global grid: {} x {} x {} cells",
                num_cells[0], num_cells[1], num_cells[2]
            );
        }

        let origin = std::array::from_fn(|d| {
            global_low_corner[d] + (partition.owned[d].start as f64 - 0.5) * cell_size
        });
        let block = Block::new(
            partition.owned[0].len(),
            partition.owned[1].len(),
            partition.owned[2].len(),
            cell_size,
            origin,
        );

        let mut boundary = Boundary::new(conditions);
        let physical = std::array::from_fn(|face| {
            let axis = face / 2;
            let side = if face % 2 == 0 { -1 } else { 1 };
            partition.neighbor(axis, side).is_none()
        });
        boundary.create(&block, physical);

        let t = vec![initial_temperature; block.total_len()];
        let t0 = t.clone();

        let mut grid = LocalGrid {
            comm,
            partition,
            block,
            boundary,
            t,
            t0,
        };
        grid.update_boundaries();
        grid.gather();
        Ok(grid)
    }

    /// Convenience constructor from a validated configuration.
    pub fn from_config(
        comm: Box<dyn Communicator>,
        config: &Config,
        conditions: [BoundaryCondition; 6],
    ) -> Result<Self> {
        LocalGrid::new(
            comm,
            config.space.cell_size,
            config.space.global_low_corner,
            config.space.global_high_corner,
            config.space.ranks_per_dim,
            conditions,
            config.space.initial_temperature,
        )
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn block(&self) -> Block {
        self.block
    }

    /// Local index ranges of the owned cells (ghosts excluded), per axis.
    pub fn owned_index_space(&self) -> [std::ops::Range<usize>; 3] {
        [
            1..self.block.nx + 1,
            1..self.block.ny + 1,
            1..self.block.nz + 1,
        ]
    }

    /// Cell-center coordinates of a local (ghost-inclusive) index.
    pub fn local_coordinates(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        self.block.coordinate(i, j, k)
    }

    pub fn temperature(&self) -> &[f64] {
        &self.t
    }

    pub fn temperature_mut(&mut self) -> &mut [f64] {
        &mut self.t
    }

    pub fn previous_temperature(&self) -> &[f64] {
        &self.t0
    }

    pub fn previous_temperature_mut(&mut self) -> &mut [f64] {
        &mut self.t0
    }

    /// Copy the current field into the previous-step field.
    pub fn store_previous(&mut self) {
        self.t0.copy_from_slice(&self.t);
    }

    /// Split views for one solver step: the block descriptor, the writable
    /// current field, and the read-only previous field.
    pub fn step_views(&mut self) -> (Block, &mut [f64], &[f64]) {
        (self.block, &mut self.t, &self.t0)
    }

    /// Apply the physical boundary conditions to global-boundary ghosts.
    pub fn update_boundaries(&mut self) {
        self.boundary.update(&mut self.t, &self.block);
    }

    /// One halo exchange: every ghost slab facing a neighboring rank is
    /// overwritten with that rank's adjacent owned plane.
    pub fn gather(&mut self) {
        let owned = [self.block.nx, self.block.ny, self.block.nz];
        for axis in 0..3 {
            for side in [-1i64, 1] {
                let Some(peer) = self.partition.neighbor(axis, side) else {
                    continue;
                };
                let send_layer = if side < 0 { 1 } else { owned[axis] };
                let ghost_layer = if side < 0 { 0 } else { owned[axis] + 1 };

                let mut payload = Vec::with_capacity(self.plane_cells(axis));
                for_plane(&self.block, axis, send_layer, |idx| {
                    payload.push(self.t[idx]);
                });

                let received = self.comm.exchange(peer, axis as u64, payload);
                debug_assert_eq!(received.len(), self.plane_cells(axis));

                let block = self.block;
                let mut pos = 0;
                for_plane(&block, axis, ghost_layer, |idx| {
                    self.t[idx] = received[pos];
                    pos += 1;
                });
            }
        }
    }

    fn plane_cells(&self, axis: usize) -> usize {
        let owned = [self.block.nx, self.block.ny, self.block.nz];
        (owned[0] * owned[1] * owned[2]) / owned[axis]
    }

    /// Write a snapshot of the owned temperature block, labeled by step
    /// index and simulated time.
    pub fn output(&self, step: usize, time: f64) -> Result<()> {
        let mut payload = Vec::with_capacity(self.block.owned_cells());
        for k in 1..=self.block.nz {
            for j in 1..=self.block.ny {
                for i in 1..=self.block.nx {
                    payload.push(self.t[self.block.idx(i, j, k)]);
                }
            }
        }
        snapshot::write_time_step(
            Path::new("."),
            step,
            time,
            self.rank(),
            &self.block,
            &payload,
        )
    }
}

/// Visit every cell of the plane `axis = layer` whose tangential extent is
/// the owned range, in increasing-index order.
fn for_plane(block: &Block, axis: usize, layer: usize, mut f: impl FnMut(usize)) {
    match axis {
        0 => {
            for k in 1..=block.nz {
                for j in 1..=block.ny {
                    f(block.idx(layer, j, k));
                }
            }
        }
        1 => {
            for k in 1..=block.nz {
                for i in 1..=block.nx {
                    f(block.idx(i, layer, k));
                }
            }
        }
        _ => {
            for j in 1..=block.ny {
                for i in 1..=block.nx {
                    f(block.idx(i, j, layer));
                }
            }
        }
    }
}
