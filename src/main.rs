//! Command-line front end.

use clap::{Parser, Subcommand};
use edmd::config::{load, write};
use edmd::plugins;
use edmd::Simulation;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "edmd")]
#[command(version)]
#[command(about = "Event-driven molecular dynamics engine", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulation to a target event count.
    Run {
        /// Input configuration (.xml or .xml.bz2).
        config: PathBuf,

        /// Number of events to run.
        #[arg(short = 'n', long, default_value = "100000")]
        events: u64,

        /// Final configuration output path.
        #[arg(short = 'o', long, default_value = "config.out.xml.bz2")]
        out: PathBuf,

        /// Suppress the periodic screen output.
        #[arg(long)]
        silent: bool,

        /// Seed for the random number generator.
        #[arg(long)]
        seed: Option<u64>,

        /// Reduce the decimal precision on write-back.
        #[arg(long)]
        round: bool,

        /// Attach an output plugin by name (repeatable).
        #[arg(long = "plugin")]
        plugins: Vec<String>,

        /// Treat detected overlap as a fatal diagnostic.
        #[arg(long)]
        overlap_debug: bool,
    },
    /// Load a configuration and write it back out (normalisation).
    Dump {
        /// Input configuration (.xml or .xml.bz2).
        config: PathBuf,

        /// Output path.
        #[arg(short = 'o', long, default_value = "config.out.xml")]
        out: PathBuf,

        /// Reduce the decimal precision on write-back.
        #[arg(long)]
        round: bool,
    },
}

fn run(args: Args) -> edmd::Result<()> {
    match args.command {
        Command::Run {
            config,
            events,
            out,
            silent,
            seed,
            round,
            plugins: plugin_names,
            overlap_debug,
        } => {
            let mut sim: Simulation = load::load_config_file(&config, seed)?;
            sim.round_output = round;
            sim.world.overlap_debug = overlap_debug;

            let mut attached = Vec::new();
            for name in &plugin_names {
                attached.push(plugins::attach_plugin(name, &mut sim)?);
            }

            sim.initialise()?;
            let target = sim.world.event_count + events;
            sim.world.end_event_count = sim.world.end_event_count.min(target);

            sim.run(silent, |s| {
                if let Some(p) = attached.first() {
                    println!("{}", p.periodic_line(s));
                }
            })?;

            for plugin in &attached {
                print!("{}", plugin.summary(&sim));
            }
            sim.dynamics.update_all(&mut sim.world);
            write::write_config_file(&sim, &out)?;
            log::info!("final configuration written to {}", out.display());
            Ok(())
        }
        Command::Dump { config, out, round } => {
            let mut sim = load::load_config_file(&config, None)?;
            sim.round_output = round;
            write::write_config_file(&sim, &out)?;
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
