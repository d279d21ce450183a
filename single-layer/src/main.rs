//! Standalone single-layer driver: one beam pass over a fresh layer.

use anyhow::{bail, Context, Result};
use tracing::info;

use meltsim_core::{
    BoundaryCondition, Config, Layer, LocalGrid, MovingBeam, SerialComm, Solver,
};

fn main() {
    // Respects RUST_LOG; defaults to info-level progress output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn input_file() -> Result<String> {
    let mut args = std::env::args().skip(1);
    let mut input = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-i" => input = args.next(),
            other => bail!("unknown argument '{other}'; usage: single-layer -i <input.json>"),
        }
    }
    input.context("the input file must be specified using -i <input.json>")
}

fn run() -> Result<()> {
    let input = input_file()?;
    let config = Config::from_file(&input).with_context(|| format!("loading '{input}'"))?;
    let params = config.run_params();
    config.log_summary(&params);

    let mut beam = MovingBeam::from_file(&config.source.scan_path_file)
        .context("loading the scan path")?;

    // The single-layer problem is insulated on all six faces.
    let conditions = [BoundaryCondition::Adiabatic; 6];
    let mut grid = LocalGrid::from_config(Box::new(SerialComm), &config, conditions)
        .context("constructing the grid")?;

    let solver = Solver::new(&config);
    let mut layer = Layer::new(&config, &grid);

    layer
        .run(&config, &params, &mut grid, &mut beam, &solver)
        .context("running the layer")?;

    layer
        .write_solidification_data()
        .context("writing solidification data")?;

    if config.sampling.is_some() {
        let lower = layer.lower_solidification_bounds(grid.comm());
        let upper = layer.upper_solidification_bounds(grid.comm());
        info!("Solidification lower bounds: {lower:?}");
        info!("Solidification upper bounds: {upper:?}");
    }

    Ok(())
}
