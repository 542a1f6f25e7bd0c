//! Command line entry point.
//!
//! ```text
//! diode3d run --config run.json --events 1000 --output B4.csv --threads 4
//! diode3d efficiency --ntuple B4_nt_B4.csv --label "1 MeV" --out e_efficiency_data.dat
//! diode3d geometry --config run.json --dump geometry.json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use diode3d::io::write_geometry;
use diode3d::sim::actions::DiodeActions;
use diode3d::sim::detector::DetectorConstruction;
use diode3d::sim::efficiency;
use diode3d::sim::framework::{RunContext, SimulationCallbacks};
use diode3d::{RunConfig, RunManager};

#[derive(Parser, Debug)]
#[command(name = "diode3d")]
#[command(about = "Silicon diode detector simulation")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate a run and write histograms and the event n-tuple
    Run {
        /// JSON run configuration (defaults are used when omitted)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Number of events
        #[arg(long, short = 'n')]
        events: Option<usize>,

        /// Output file; the extension selects csv, xml or json
        #[arg(long, short = 'o')]
        output: Option<String>,

        #[arg(long, short = 't')]
        threads: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Append the detection efficiency of a CSV n-tuple to a data file
    Efficiency {
        #[arg(long)]
        ntuple: PathBuf,

        #[arg(long)]
        label: String,

        #[arg(long)]
        out: PathBuf,

        /// Column holding the deposited energy
        #[arg(long, default_value = "Ediode")]
        column: String,
    },

    /// Print the detector summary and volume tree
    Geometry {
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Also write the volume tree as JSON
        #[arg(long)]
        dump: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<RunConfig> {
    match path {
        Some(p) => RunConfig::from_json_file(p),
        None => Ok(RunConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Run {
            config,
            events,
            output,
            threads,
            seed,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(output) = output {
                config.analysis.output = output;
            }
            if let Some(threads) = threads {
                config.run.threads = threads;
            }
            if let Some(seed) = seed {
                config.run.seed = seed;
            }
            let n_events = events.unwrap_or(config.run.events);
            let manager = RunManager::new(config, || -> Box<dyn SimulationCallbacks> {
                Box::new(DiodeActions::new())
            });
            let outcome = manager.beam_on(n_events)?;
            if let Some(summary) = &outcome.summary {
                println!("{summary}");
            }
            for f in &outcome.files {
                info!("Output: {}", f.display());
            }
        }
        Command::Efficiency {
            ntuple,
            label,
            out,
            column,
        } => {
            let eff = efficiency::from_ntuple_csv(&ntuple, &column)?;
            println!("{label}: {eff}");
            efficiency::append_record(&out, &label, &eff)?;
        }
        Command::Geometry { config, dump } => {
            let config = load_config(config.as_ref())?;
            config.validate()?;
            let detector = DetectorConstruction::new(config.geometry.clone());
            let mut ctx = RunContext::new(config);
            let tree = detector.build(&mut ctx)?;
            println!("{}", detector.summary());
            println!("{tree}");
            if let Some(path) = dump {
                write_geometry(&path, &tree)?;
                info!("Volume tree written to {}", path.display());
            }
        }
    }
    Ok(())
}
