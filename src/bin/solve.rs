use aedificium::api;
use aedificium::judge::{Judge, LocalJudge};
use aedificium::reconstruct::{self, ReconstructConfig};
use anyhow::{Context, bail};
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

#[derive(Parser, Debug)]
struct Cli {
    #[clap(long, short = 'p', default_value = "probatio")]
    problem: String,
    /// Solve against the contest service instead of a local simulator.
    #[clap(long, default_value_t = false)]
    remote: bool,
    /// Use the hidden graph from this map JSON file.
    #[clap(long, short = 'm')]
    map: Option<String>,
    #[clap(long, short = 's')]
    seed: Option<u64>,
    #[clap(long)]
    max_attempts: Option<usize>,
    #[clap(long)]
    max_rounds: Option<usize>,
    #[clap(long, default_value = "0.75")]
    max_prefix_ratio: f64,
    /// Transport retries per request; unbounded when absent.
    #[clap(long)]
    max_retries: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let config = ReconstructConfig {
        max_prefix_ratio: cli.max_prefix_ratio,
        max_rounds: cli.max_rounds,
        max_attempts: cli.max_attempts,
    };
    let mut rng = match cli.seed {
        Some(s) => ChaCha20Rng::seed_from_u64(s),
        None => ChaCha20Rng::from_os_rng(),
    };

    let mut judge: Box<dyn Judge> = if cli.remote {
        if cli.map.is_some() {
            bail!("--map cannot be combined with --remote");
        }
        remote_judge(&cli)?
    } else if let Some(path) = &cli.map {
        let json =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
        let map = api::parse_map_json(&json)?;
        Box::new(LocalJudge::new_json(Some(cli.problem.clone()), &map)?)
    } else {
        Box::new(LocalJudge::new(&cli.problem, cli.seed)?)
    };

    let result = reconstruct::solve(judge.as_mut(), &config, &mut rng);
    let score = judge.query_count();
    match result {
        Ok(graph) => {
            println!("{}", serde_json::to_string(&graph.to_map())?);
            eprintln!("!log status AC");
            eprintln!("!log score {}", score);
            Ok(())
        }
        Err(e) => {
            eprintln!("!log status WA");
            eprintln!("!log score {}", score);
            Err(e.into())
        }
    }
}

#[cfg(feature = "reqwest")]
fn remote_judge(cli: &Cli) -> anyhow::Result<Box<dyn Judge>> {
    Ok(Box::new(aedificium::judge::RemoteJudge::new(
        &cli.problem,
        cli.max_retries,
    )?))
}

#[cfg(not(feature = "reqwest"))]
fn remote_judge(_cli: &Cli) -> anyhow::Result<Box<dyn Judge>> {
    bail!("built without the reqwest feature")
}
