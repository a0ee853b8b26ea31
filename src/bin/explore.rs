use aedificium::api;
use aedificium::graph::Graph;
use aedificium::plan::Plan;
use anyhow::Context;
use clap::Parser;
use itertools::Itertools;

/// Runs route plans against a map stored as JSON and prints one trace per line.
#[derive(Parser, Debug)]
struct Cli {
    /// Path to a map JSON file (bare or `{"map": ...}`).
    map: String,
    /// Plans such as `0[1]05`.
    #[clap(required = true)]
    plans: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let json = std::fs::read_to_string(&cli.map)
        .with_context(|| format!("Failed to read {}", cli.map))?;
    let graph = Graph::from_map(&api::parse_map_json(&json)?)?;
    for s in &cli.plans {
        let plan: Plan = s.parse().with_context(|| format!("Bad plan: {}", s))?;
        let trace = graph.explore(&plan)?;
        println!("{}", trace.iter().join(""));
    }
    Ok(())
}
