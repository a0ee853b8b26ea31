use aedificium::mapgen::random::{self, GeneratorConfig};
use aedificium::problems;
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

#[derive(Parser)]
struct Cli {
    /// Named problem; overrides `--base-size` and `--layers`.
    #[clap(long, short = 'p')]
    problem: Option<String>,
    #[clap(long, short = 'n', default_value = "10")]
    base_size: usize,
    #[clap(long, short = 'l', default_value = "1")]
    layers: usize,
    #[clap(long, short = 's')]
    seed: Option<u64>,
    #[clap(long, default_value = "0.2")]
    swap_probability: f64,
    #[clap(long, short = 'c', default_value_t = false)]
    compact: bool,
    /// Print the problem table and exit.
    #[clap(long, default_value_t = false)]
    list: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Cli::parse();
    if args.list {
        for p in problems::all_problems() {
            println!("{}\t{}\t{}\t{}", p.problem_name, p.base_size, p.layers, p.size());
        }
        return Ok(());
    }
    let config = GeneratorConfig {
        swap_probability: args.swap_probability,
    };
    let mut rng = match args.seed {
        Some(s) => ChaCha20Rng::seed_from_u64(s),
        None => ChaCha20Rng::from_os_rng(),
    };
    let graph = match &args.problem {
        Some(name) => random::generate_problem(name, &config, &mut rng)?,
        None => random::generate_with(args.base_size, args.layers, &config, &mut rng)?,
    };
    let map = graph.to_map();
    if args.compact {
        println!("{}", serde_json::to_string(&map)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&map)?);
    }
    Ok(())
}
