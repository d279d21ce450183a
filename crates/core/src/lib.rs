//! Melt pool heat transport for additive manufacturing.
//!
//! A domain-decomposed explicit finite-difference solver for transient 3D
//! heat conduction driven by a moving Gaussian beam, plus a concurrent
//! recorder of per-cell solidification events for downstream microstructure
//! prediction.
//!
//! The pieces compose bottom-up: a [`comm::Communicator`] connects the
//! Cartesian blocks of a [`grid::LocalGrid`], a [`beam::MovingBeam`] turns a
//! scan path into a time-parameterized heat source, a [`solver::Solver`]
//! advances the temperature field one FTCS step at a time, and a
//! [`layer::Layer`] drives the loop while [`solidification`] records
//! liquidus crossings.

pub mod beam;
pub mod boundary;
pub mod comm;
pub mod config;
pub mod error;
pub mod grid;
pub mod layer;
pub mod monitor;
pub mod partition;
pub mod snapshot;
pub mod solidification;
pub mod solver;

pub use beam::{MovingBeam, Segment, SegmentMode};
pub use boundary::{Boundary, BoundaryCondition};
pub use comm::{Communicator, SerialComm, ThreadedComm};
pub use config::{Config, RunParams};
pub use error::{Error, Result};
pub use grid::{Block, LocalGrid};
pub use layer::Layer;
pub use monitor::TimeMonitor;
pub use solidification::SolidificationData;
pub use solver::Solver;
