//! Per-face boundary conditions applied on ghost slabs.
//!
//! Faces are indexed in the fixed order `-x, +x, -y, +y, -z, +z`. Each face
//! owns a disjoint ghost slab whose tangential extent is the owned range, so
//! the application order between faces is unobservable. A slab is active
//! only when its face lies on the global domain boundary; ghosts on interior
//! faces belong to the halo exchange.

use std::ops::Range;

use crate::error::{Error, Result};
use crate::grid::Block;

/// Outward unit normals in face order.
pub(crate) const FACE_NORMALS: [[i64; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

/// Boundary condition for one face of the domain.
///
/// - `Dirichlet(v)` imposes `v` on the ghost cell.
/// - `Neumann(v)` adds `v` to the ghost cell each application; the increment
///   encodes a gradient boundary.
/// - `Adiabatic` mirrors the adjacent interior cell into the ghost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryCondition {
    Dirichlet(f64),
    Neumann(f64),
    Adiabatic,
}

impl BoundaryCondition {
    /// Build a condition from its configuration name and optional value.
    /// Dirichlet and Neumann require the value.
    pub fn from_name(kind: &str, value: Option<f64>) -> Result<Self> {
        match kind {
            "dirichlet" => value
                .map(BoundaryCondition::Dirichlet)
                .ok_or_else(|| Error::BoundaryValueMissing {
                    kind: kind.to_string(),
                }),
            "neumann" => value
                .map(BoundaryCondition::Neumann)
                .ok_or_else(|| Error::BoundaryValueMissing {
                    kind: kind.to_string(),
                }),
            "adiabatic" => Ok(BoundaryCondition::Adiabatic),
            _ => Err(Error::UnknownBoundary {
                kind: kind.to_string(),
            }),
        }
    }
}

type Slab = [Range<usize>; 3];

/// The six face conditions of one partition plus their ghost slabs.
#[derive(Debug, Clone)]
pub struct Boundary {
    conditions: [BoundaryCondition; 6],
    slabs: [Option<Slab>; 6],
}

impl Boundary {
    pub fn new(conditions: [BoundaryCondition; 6]) -> Self {
        Boundary {
            conditions,
            slabs: std::array::from_fn(|_| None),
        }
    }

    /// Store the ghost slab of every face that lies on the global boundary.
    /// `physical[face]` marks faces without a neighboring rank.
    pub(crate) fn create(&mut self, block: &Block, physical: [bool; 6]) {
        let owned = [block.nx, block.ny, block.nz];
        for face in 0..6 {
            if !physical[face] {
                self.slabs[face] = None;
                continue;
            }
            let axis = face / 2;
            let ghost_layer = if face % 2 == 0 { 0 } else { owned[axis] + 1 };
            let slab = std::array::from_fn(|d| {
                if d == axis {
                    ghost_layer..ghost_layer + 1
                } else {
                    1..owned[d] + 1
                }
            });
            self.slabs[face] = Some(slab);
        }
    }

    /// Apply all six face conditions to the ghost slabs of `t`. Interior
    /// cells are never modified.
    pub fn update(&self, t: &mut [f64], block: &Block) {
        for face in 0..6 {
            let Some(slab) = &self.slabs[face] else {
                continue;
            };
            let condition = self.conditions[face];
            let normal = FACE_NORMALS[face];
            for k in slab[2].clone() {
                for j in slab[1].clone() {
                    for i in slab[0].clone() {
                        let ghost = block.idx(i, j, k);
                        match condition {
                            BoundaryCondition::Dirichlet(value) => t[ghost] = value,
                            BoundaryCondition::Neumann(value) => t[ghost] += value,
                            BoundaryCondition::Adiabatic => {
                                // Mirror inward along the outward normal.
                                let src = block.idx(
                                    (i as i64 - normal[0]) as usize,
                                    (j as i64 - normal[1]) as usize,
                                    (k as i64 - normal[2]) as usize,
                                );
                                t[ghost] = t[src];
                            }
                        }
                    }
                }
            }
        }
    }
}
