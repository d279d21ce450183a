//! Brick-of-values snapshots of the temperature field.
//!
//! Each invocation writes one plain-text header plus a raw binary payload of
//! the rank's owned block, labeled by step index and simulated time. The
//! payload is the owned cells in storage order (x fastest), 8-byte floats in
//! native (little-endian on all supported targets) byte order.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::grid::Block;

/// Write `temperature_<step>_<rank>.bov` and the matching `.dat` payload
/// into `dir`.
pub fn write_time_step(
    dir: &Path,
    step: usize,
    time: f64,
    rank: usize,
    block: &Block,
    data: &[f64],
) -> Result<()> {
    debug_assert_eq!(data.len(), block.owned_cells());

    let stem = format!("temperature_{step:06}_{rank}");
    let data_name = format!("{stem}.dat");

    let io_err = |what: &str| {
        let what = what.to_string();
        move |source: std::io::Error| Error::OutputIo { what, source }
    };

    fs::write(dir.join(&data_name), bytemuck::cast_slice::<f64, u8>(data))
        .map_err(io_err(&data_name))?;

    // Cell-centered brick: origin at the low corner of the owned block.
    let h = block.cell_size;
    let first = block.coordinate(1, 1, 1);
    let origin = [first[0] - 0.5 * h, first[1] - 0.5 * h, first[2] - 0.5 * h];

    let header_name = format!("{stem}.bov");
    let mut header = String::new();
    header.push_str(&format!("TIME: {time}\n"));
    header.push_str(&format!("DATA_FILE: {data_name}\n"));
    header.push_str(&format!(
        "DATA_SIZE: {} {} {}\n",
        block.nx, block.ny, block.nz
    ));
    header.push_str("DATA_FORMAT: DOUBLE\n");
    header.push_str("VARIABLE: temperature\n");
    header.push_str("DATA_ENDIAN: LITTLE\n");
    header.push_str("CENTERING: zonal\n");
    header.push_str(&format!(
        "BRICK_ORIGIN: {} {} {}\n",
        origin[0], origin[1], origin[2]
    ));
    header.push_str(&format!(
        "BRICK_SIZE: {} {} {}\n",
        block.nx as f64 * h,
        block.ny as f64 * h,
        block.nz as f64 * h
    ));

    let mut file = fs::File::create(dir.join(&header_name)).map_err(io_err(&header_name))?;
    file.write_all(header.as_bytes()).map_err(io_err(&header_name))?;
    Ok(())
}
