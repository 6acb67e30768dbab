use clap::{Parser, Subcommand};
use gf_network::SolverNode;
use gf_sim::{BuiltNetwork, Network, NetworkDef, Recorder};
use std::error::Error;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gf-cli")]
#[command(about = "Gridflow CLI - lumped-parameter network simulation tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a network definition file
    Validate {
        /// Path to the network YAML file
        network_path: PathBuf,
    },
    /// Run a network for a number of major steps
    Run {
        /// Path to the network YAML file
        network_path: PathBuf,
        /// Major time step (seconds)
        #[arg(long, default_value_t = 0.1)]
        dt: f64,
        /// Number of major steps
        #[arg(long, default_value_t = 100)]
        steps: u64,
        /// Record every N-th step
        #[arg(long, default_value_t = 10)]
        record_every: usize,
        /// Write recorded telemetry as JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn load(path: &Path) -> Result<NetworkDef, Box<dyn Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(NetworkDef::from_yaml(&text)?)
}

fn run_network<N: SolverNode>(
    network: &mut Network<N>,
    dt: f64,
    steps: u64,
    record_every: usize,
) -> Result<Recorder, Box<dyn Error>> {
    let mut recorder = Recorder::new(record_every);
    for _ in 0..steps {
        let summary = network.step(dt)?;
        recorder.observe(network.nodes(), &summary);
        if !summary.converged {
            tracing::warn!(step = summary.step, "step did not converge");
        }
    }

    println!("{} after {} steps (t = {:.3} s):", network.name(), steps, network.time());
    for node in network.nodes() {
        println!("  {:<16} {:>14.6}", node.name(), node.potential());
    }
    Ok(recorder)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(error) = execute(Cli::parse()) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn execute(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Commands::Validate { network_path } => {
            let def = load(&network_path)?;
            def.build()?;
            println!(
                "{}: ok ({} nodes, {} links)",
                def.name,
                def.nodes.len(),
                def.links.len()
            );
        }
        Commands::Run {
            network_path,
            dt,
            steps,
            record_every,
            output,
        } => {
            let def = load(&network_path)?;
            let recorder = match def.build()? {
                BuiltNetwork::Electrical(mut network) => {
                    run_network(&mut network, dt, steps, record_every)?
                }
                BuiltNetwork::Fluid(mut network) => {
                    run_network(&mut network, dt, steps, record_every)?
                }
            };
            if let Some(path) = output {
                std::fs::write(&path, recorder.to_json()?)?;
                println!("telemetry written to {}", path.display());
            }
        }
    }
    Ok(())
}
