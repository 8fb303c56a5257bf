use fdsim::{ScenarioConfig, Scenario, System, TickObserver};
use fdsim::{bench_nbody, bench_tick, bench_tick_curve};

use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario and print the final particle states as YAML
    Run {
        #[arg(short, default_value = "test_file.yaml")]
        file_name: String,
        /// Override the tick count from the scenario file
        #[arg(short, long)]
        ticks: Option<usize>,
    },
    /// Timing benchmarks
    Bench {
        #[arg(value_enum, default_value = "nbody")]
        which: BenchKind,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BenchKind {
    Nbody,
    Tick,
    Curve,
}

/// Logs kinetic energy every `every` ticks
struct EnergyLog {
    every: usize,
    ticks: usize,
}

impl TickObserver for EnergyLog {
    fn on_tick_complete(&mut self, sys: &System) {
        self.ticks += 1;
        if self.every > 0 && self.ticks % self.every == 0 {
            info!(tick = self.ticks, energy = sys.kinetic_energy(), "tick");
        }
    }
}

// relative names resolve against the crate's scenarios/ directory
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let direct = PathBuf::from(file_name);
    let config_path = if direct.is_file() {
        direct
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name)
    };

    let file = File::open(&config_path)
        .with_context(|| format!("failed to open {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg = ScenarioConfig::from_reader(reader)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;

    Ok(scenario_cfg)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Run { file_name, ticks } => {
            let scenario_cfg = load_scenario_from_yaml(&file_name)?;
            let mut scenario = Scenario::build_scenario(scenario_cfg)?;
            if let Some(t) = ticks {
                scenario.ticks = t;
            }

            info!(
                particles = scenario.simulation.particle_count(),
                springs = scenario.simulation.spring_count(),
                ticks = scenario.ticks,
                "running scenario"
            );

            let mut log = EnergyLog { every: 50, ticks: 0 };
            scenario.run(&mut log);

            print!("{}", serde_yaml::to_string(&scenario.snapshot())?);
        }
        Command::Bench { which } => match which {
            BenchKind::Nbody => bench_nbody(),
            BenchKind::Tick => bench_tick()?,
            BenchKind::Curve => bench_tick_curve()?,
        },
    }

    Ok(())
}
