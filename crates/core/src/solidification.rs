//! Per-cell solidification event recording for microstructure prediction.
//!
//! Every step the recorder scans the owned cells for liquidus crossings.
//! An upward crossing stores the interpolated melting time in a per-cell
//! field; a downward crossing appends one event row carrying the cell
//! position, melting and solidification times, cooling rate, and the local
//! temperature gradient. Rows are claimed with an atomic counter so the scan
//! can run fully parallel; when the claimed count outruns the buffer the
//! pass is re-run against a grown buffer (the scan is idempotent: the fields
//! it reads do not change between attempts).

use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::debug;

use crate::comm::Communicator;
use crate::config::{SamplingConfig, SamplingFormat};
use crate::error::{Error, Result};
use crate::grid::LocalGrid;

/// Columns per event row: x, y, z, tm, ts, R, Gx, Gy, Gz.
pub const EVENT_COMPONENTS: usize = 9;

/// Shared writer for concurrent event rows.
///
/// Rows are claimed by `fetch_add` on the event counter, so two writers
/// never receive the same row index; the parallel pass joins before any
/// read. That makes the raw writes data-race free.
struct EventRows {
    ptr: *mut f64,
    rows: usize,
}

unsafe impl Send for EventRows {}
unsafe impl Sync for EventRows {}

impl EventRows {
    fn new(events: &mut [f64]) -> Self {
        EventRows {
            ptr: events.as_mut_ptr(),
            rows: events.len() / EVENT_COMPONENTS,
        }
    }

    /// # Safety
    ///
    /// `row` must be below the buffer's row count and must not be written
    /// by any other thread during the pass.
    unsafe fn write(&self, row: usize, values: [f64; EVENT_COMPONENTS]) {
        debug_assert!(row < self.rows);
        let dst = self.ptr.add(row * EVENT_COMPONENTS);
        for (offset, value) in values.into_iter().enumerate() {
            dst.add(offset).write(value);
        }
    }
}

/// Concurrent recorder of per-cell solidification events.
pub struct SolidificationData {
    rank: usize,
    directory: PathBuf,
    format: SamplingFormat,
    liquidus: f64,
    dt: f64,
    cell_size: f64,
    /// Number of valid rows in `events`; rows are claimed pre-increment.
    count: AtomicUsize,
    capacity: usize,
    /// `capacity * EVENT_COMPONENTS` flat row-major buffer.
    events: Vec<f64>,
    /// Most recent melting time per cell, ghost layout matching the grid.
    /// NaN until the cell is first observed melting, so the first recorded
    /// event of a cell that started molten carries a NaN melting time.
    tm: Vec<f64>,
}

impl SolidificationData {
    /// Create a recorder sized to the grid's owned cell count.
    pub fn new(
        sampling: &SamplingConfig,
        liquidus: f64,
        dt: f64,
        grid: &LocalGrid,
    ) -> Self {
        let capacity = grid.block().owned_cells().max(1);
        Self::with_capacity(sampling, liquidus, dt, grid, capacity)
    }

    /// Create a recorder with an explicit initial event capacity.
    pub fn with_capacity(
        sampling: &SamplingConfig,
        liquidus: f64,
        dt: f64,
        grid: &LocalGrid,
        capacity: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        SolidificationData {
            rank: grid.rank(),
            directory: PathBuf::from(&sampling.directory_name),
            format: sampling.resolved_format(),
            liquidus,
            dt,
            cell_size: grid.block().cell_size,
            count: AtomicUsize::new(0),
            capacity,
            events: vec![0.0; capacity * EVENT_COMPONENTS],
            tm: vec![f64::NAN; grid.block().total_len()],
        }
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Scan for liquidus crossings between the grid's previous and current
    /// fields at simulated time `time`, growing the event buffer as needed.
    pub fn update(&mut self, grid: &LocalGrid, time: f64) {
        let count_before = self.count.load(Ordering::Acquire);
        self.scan(grid, time);

        let new_count = self.count.load(Ordering::Acquire);
        if new_count >= self.capacity {
            // Overflow: some events were dropped. Grow, roll the counter
            // back to the pre-pass snapshot, and re-run the scan.
            debug!(
                "event buffer overflow ({} events, capacity {}); rescanning",
                new_count, self.capacity
            );
            self.capacity = 2 * new_count;
            self.events.resize(self.capacity * EVENT_COMPONENTS, 0.0);
            self.count.store(count_before, Ordering::Release);
            self.scan(grid, time);
        } else if new_count as f64 / self.capacity as f64 > 0.9 {
            // Near full: grow ahead of the next pass, keeping all rows.
            self.capacity = 2 * new_count;
            self.events.resize(self.capacity * EVENT_COMPONENTS, 0.0);
        }
    }

    fn scan(&mut self, grid: &LocalGrid, time: f64) {
        let block = grid.block();
        let t = grid.temperature();
        let t0 = grid.previous_temperature();

        let liquidus = self.liquidus;
        let dt = self.dt;
        let two_h = 2.0 * self.cell_size;
        let capacity = self.capacity;
        let row = block.row_len();
        let plane = block.plane_len();

        let count = &self.count;
        let rows = EventRows::new(&mut self.events);
        let rows = &rows;

        self.tm
            .par_chunks_mut(plane)
            .enumerate()
            .skip(1)
            .take(block.nz)
            .for_each(|(k, tm_plane)| {
                for j in 1..=block.ny {
                    for i in 1..=block.nx {
                        let offset = j * row + i;
                        let c = k * plane + offset;
                        let temp = t[c];
                        let temp0 = t0[c];

                        if temp <= liquidus && temp0 > liquidus {
                            let claimed = count.fetch_add(1, Ordering::AcqRel);
                            if claimed < capacity {
                                let p = block.coordinate(i, j, k);
                                let m = ((temp - liquidus) / (temp - temp0)).clamp(0.0, 1.0);
                                // SAFETY: `claimed` is unique per fetch_add
                                // and bounded by the capacity check above.
                                unsafe {
                                    rows.write(
                                        claimed,
                                        [
                                            p[0],
                                            p[1],
                                            p[2],
                                            tm_plane[offset],
                                            time - m * dt,
                                            (temp0 - temp) / dt,
                                            (t[c + 1] - t[c - 1]) / two_h,
                                            (t[c + row] - t[c - row]) / two_h,
                                            (t[c + plane] - t[c - plane]) / two_h,
                                        ],
                                    );
                                }
                            }
                        } else if temp > liquidus && temp0 <= liquidus {
                            let m = ((temp - liquidus) / (temp - temp0)).clamp(0.0, 1.0);
                            tm_plane[offset] = time - m * dt;
                        }
                    }
                }
            });
    }

    /// Dense copy of all recorded rows in insertion order. Insertion order
    /// is a race-resolved permutation of the events detected in a pass, not
    /// a lexicographic cell order.
    pub fn get(&self) -> Vec<[f64; EVENT_COMPONENTS]> {
        let n = self.len();
        (0..n)
            .map(|r| std::array::from_fn(|c| self.events[r * EVENT_COMPONENTS + c]))
            .collect()
    }

    /// Component-wise minimum event position across all ranks. Ranks with no
    /// events contribute the identity.
    pub fn lower_bounds(&self, comm: &dyn Communicator) -> [f64; 3] {
        let mut bounds = [f64::INFINITY; 3];
        for r in 0..self.len() {
            for d in 0..3 {
                bounds[d] = bounds[d].min(self.events[r * EVENT_COMPONENTS + d]);
            }
        }
        comm.all_reduce_min(bounds)
    }

    /// Component-wise maximum event position across all ranks.
    pub fn upper_bounds(&self, comm: &dyn Communicator) -> [f64; 3] {
        let mut bounds = [f64::NEG_INFINITY; 3];
        for r in 0..self.len() {
            for d in 0..3 {
                bounds[d] = bounds[d].max(self.events[r * EVENT_COMPONENTS + d]);
            }
        }
        comm.all_reduce_max(bounds)
    }

    /// Write this rank's events to `<directory>/data_<rank>.csv` with
    /// ten-decimal fixed-point columns `x,y,z,tm,ts,R` plus `,Gx,Gy,Gz` for
    /// the default format. No header line.
    pub fn write(&self) -> Result<()> {
        let io_err = |what: String| move |source: std::io::Error| Error::OutputIo { what, source };

        fs::create_dir_all(&self.directory)
            .map_err(io_err(format!("directory '{}'", self.directory.display())))?;

        let path = self.directory.join(format!("data_{}.csv", self.rank));
        let file = fs::File::create(&path).map_err(io_err(format!("'{}'", path.display())))?;
        let mut out = BufWriter::new(file);

        let columns = match self.format {
            SamplingFormat::Default => EVENT_COMPONENTS,
            SamplingFormat::Exaca => 6,
        };

        for r in 0..self.len() {
            let base = r * EVENT_COMPONENTS;
            for c in 0..columns {
                if c > 0 {
                    write!(out, ",").map_err(io_err(format!("'{}'", path.display())))?;
                }
                write!(out, "{:.10}", self.events[base + c])
                    .map_err(io_err(format!("'{}'", path.display())))?;
            }
            writeln!(out).map_err(io_err(format!("'{}'", path.display())))?;
        }
        out.flush().map_err(io_err(format!("'{}'", path.display())))?;
        Ok(())
    }
}
