//! Cartesian block decomposition of the global lattice.
//!
//! Each rank owns an axis-aligned block of cells; blocks tile the domain
//! exactly. A fully-specified `ranks_per_dim` whose product matches the
//! communicator size is honored; anything else falls back to a balanced
//! factorization of the size across the three axes.

use std::ops::Range;

use tracing::{info, warn};

use crate::error::{Error, Result};

/// One rank's placement within the Cartesian decomposition.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Ranks per axis.
    pub dims: [usize; 3],
    /// This rank's coordinate within `dims`.
    pub coords: [usize; 3],
    /// Global cell ranges owned by this rank, per axis.
    pub owned: [Range<usize>; 3],
}

impl Partition {
    /// Decompose `num_cells` across `size` ranks and locate `rank` in it.
    ///
    /// Fails when some axis ends up with more ranks than cells, which would
    /// leave a rank with an empty block.
    pub fn new(
        size: usize,
        rank: usize,
        requested: [usize; 3],
        num_cells: [usize; 3],
    ) -> Result<Self> {
        let dims = ranks_per_dimension(size, requested);
        if rank == 0 {
            info!("Ranks per dimension: {} {} {}", dims[0], dims[1], dims[2]);
        }

        for axis in 0..3 {
            if dims[axis] > num_cells[axis] {
                return Err(Error::PartitionInfeasible {
                    axis,
                    cells: num_cells[axis],
                    ranks: dims[axis],
                });
            }
        }

        let coords = coords_of(rank, dims);
        let owned = [
            block_range(num_cells[0], dims[0], coords[0]),
            block_range(num_cells[1], dims[1], coords[1]),
            block_range(num_cells[2], dims[2], coords[2]),
        ];

        Ok(Partition {
            dims,
            coords,
            owned,
        })
    }

    /// Rank of the neighboring block offset by `side` (-1 or +1) along
    /// `axis`, or `None` on the global boundary. The decomposition is not
    /// periodic.
    pub fn neighbor(&self, axis: usize, side: i64) -> Option<usize> {
        let c = self.coords[axis] as i64 + side;
        if c < 0 || c >= self.dims[axis] as i64 {
            return None;
        }
        let mut coords = self.coords;
        coords[axis] = c as usize;
        Some(rank_of(coords, self.dims))
    }

    /// Owned cell count.
    pub fn owned_cells(&self) -> usize {
        self.owned.iter().map(|r| r.len()).product()
    }
}

/// Rank layout: the first axis varies slowest.
fn rank_of(coords: [usize; 3], dims: [usize; 3]) -> usize {
    (coords[0] * dims[1] + coords[1]) * dims[2] + coords[2]
}

fn coords_of(rank: usize, dims: [usize; 3]) -> [usize; 3] {
    [
        rank / (dims[1] * dims[2]),
        (rank / dims[2]) % dims[1],
        rank % dims[2],
    ]
}

/// Split `n` cells across `p` blocks; the first `n % p` blocks take the
/// extra cell.
fn block_range(n: usize, p: usize, c: usize) -> Range<usize> {
    let base = n / p;
    let rem = n % p;
    let start = c * base + c.min(rem);
    let len = base + usize::from(c < rem);
    start..start + len
}

/// Resolve the ranks-per-axis grid for `size` ranks. A complete request with
/// a matching product wins; otherwise the size is factorized into three
/// balanced, non-increasing factors (largest prime factors are assigned to
/// the currently smallest axis).
pub fn ranks_per_dimension(size: usize, requested: [usize; 3]) -> [usize; 3] {
    if requested.iter().all(|&r| r > 0) && requested.iter().product::<usize>() == size {
        return requested;
    }
    let dims = balanced_dims(size);
    if requested != [0, 0, 0] {
        warn!(
            "requested ranks per dimension {:?} do not fit {} ranks; using {:?}",
            requested, size, dims
        );
    }
    dims
}

fn balanced_dims(size: usize) -> [usize; 3] {
    let mut dims = [1usize; 3];
    for factor in prime_factors_descending(size) {
        let smallest = (0..3).min_by_key(|&d| dims[d]).expect("three axes");
        dims[smallest] *= factor;
    }
    dims.sort_unstable_by(|a, b| b.cmp(a));
    dims
}

fn prime_factors_descending(mut n: usize) -> Vec<usize> {
    let mut factors = Vec::new();
    let mut f = 2;
    while f * f <= n {
        while n % f == 0 {
            factors.push(f);
            n /= f;
        }
        f += 1;
    }
    if n > 1 {
        factors.push(n);
    }
    factors.reverse();
    factors
}
