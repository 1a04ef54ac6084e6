use bigearth_sr::cli::{Args, CheckBandsArgs, Command, SuperResolveArgs};
use bigearth_sr::error::Result;
use bigearth_sr::{downsample, solver, superres, BandStackReader};
use clap::Parser;
use env_logger::Env;
use log::info;

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger; third-party crates stay at warn
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(
        Env::default().default_filter_or(format!("warn,bigearth_sr={}", log_level)),
    )
    .format_timestamp_secs()
    .init();

    info!("=== BigEarthNet Super-Resolution ===");

    // Set thread pool size if specified
    if let Some(n_threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()?;
        info!("Using {} threads", n_threads);
    } else {
        info!("Using all available threads");
    }

    match args.command {
        Command::Downsample(d) => {
            let config = d.config();
            info!(
                "Downsampling {} -> {} (scale {})",
                config.input_root.display(),
                config.output_root.display(),
                config.scale
            );
            downsample::run(&config)?;
        }
        Command::SuperResolve(s) => run_super_resolve(&s)?,
        Command::CheckBands(c) => run_check_bands(&c)?,
    }

    info!("=== Done! ===");
    Ok(())
}

fn run_super_resolve(args: &SuperResolveArgs) -> Result<()> {
    let reader = BandStackReader::open(&args.input, args.backend.into())?;
    let scratch = args.scratch_dir()?;
    let solver = solver::build_solver(args.solver_command(), scratch.path());
    let config = args.config();

    info!(
        "Super-resolving {} -> {}",
        reader.root().display(),
        config.output_root.display()
    );
    if let Some(log) = &config.batch.error_log {
        info!("Failed items are appended to {}", log.display());
    }

    superres::run(&config, &reader, solver.as_ref())?;
    Ok(())
}

fn run_check_bands(args: &CheckBandsArgs) -> Result<()> {
    let reader = BandStackReader::open(&args.input, args.backend.into())?;
    for patch in &args.patches {
        reader.check_bands(patch)?;
    }
    Ok(())
}
