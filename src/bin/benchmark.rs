//! Head-to-head benchmark binary for Long Nardi strategies.
//!
//! Usage:
//!   cargo run --release --bin benchmark -- [OPTIONS]
//!
//! Options:
//!   --model <FILE>            Network for model-backed strategies (default: nardi_value.bin)
//!   --strategy <NAME>         Strategy A (default: greedy)
//!   --opponent <NAME>         Strategy B (default: heuristic)
//!   --opponent-model <FILE>   Separate network for B (default: same as A)
//!   --arch <ARCH>             Shape of A's network when its file is missing
//!   --opponent-arch <ARCH>    Shape of B's network when its file is missing
//!   --games <N>               Games per seating (default: 1000)
//!   --chunk <N>               Games per parallel job (default: 64)
//!   --threads <N>             Number of threads (default: auto)
//!   --seed <N>                Random seed (default: 0)
//!
//! Strategies: greedy, noisy, lookahead, random, heuristic.

use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use nardi_td::games::nardi::{NardiEngine, NARDI_FEATURES};
use nardi_td::models::{Architecture, ValueNet};
use nardi_td::td::{benchmark_parallel, BenchmarkSettings, Contender, Strategy};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();

    let mut model_file = PathBuf::from("nardi_value.bin");
    let mut opponent_model_file: Option<PathBuf> = None;
    let mut arch = Architecture::default();
    let mut opponent_arch: Option<Architecture> = None;
    let mut strategy = "greedy".to_string();
    let mut opponent = "heuristic".to_string();
    let mut games: usize = 1000;
    let mut chunk: usize = 64;
    let mut threads: usize = 0;
    let mut seed: u64 = 0;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--model" | "-m" => {
                i += 1;
                if i < args.len() {
                    model_file = PathBuf::from(&args[i]);
                }
            }
            "--opponent-model" => {
                i += 1;
                if i < args.len() {
                    opponent_model_file = Some(PathBuf::from(&args[i]));
                }
            }
            "--arch" => {
                i += 1;
                if i < args.len() {
                    arch = parse_arch(&args[i]);
                }
            }
            "--opponent-arch" => {
                i += 1;
                if i < args.len() {
                    opponent_arch = Some(parse_arch(&args[i]));
                }
            }
            "--strategy" | "-a" => {
                i += 1;
                if i < args.len() {
                    strategy = args[i].clone();
                }
            }
            "--opponent" | "-b" => {
                i += 1;
                if i < args.len() {
                    opponent = args[i].clone();
                }
            }
            "--games" | "-g" => {
                i += 1;
                if i < args.len() {
                    games = args[i].parse().unwrap_or(games);
                }
            }
            "--chunk" => {
                i += 1;
                if i < args.len() {
                    chunk = args[i].parse().unwrap_or(chunk);
                }
            }
            "--threads" | "-t" => {
                i += 1;
                if i < args.len() {
                    threads = args[i].parse().unwrap_or(0);
                }
            }
            "--seed" | "-s" => {
                i += 1;
                if i < args.len() {
                    seed = args[i].parse().unwrap_or(0);
                }
            }
            "--help" | "-h" => {
                print_help();
                return;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                return;
            }
        }
        i += 1;
    }

    let parse = |name: &str| match name.parse::<Strategy>() {
        Ok(Strategy::Human) => {
            eprintln!("Error: the human strategy cannot be benchmarked");
            process::exit(1);
        }
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let strategy_a = parse(&strategy);
    let strategy_b = parse(&opponent);

    println!("=================================================");
    println!("  Long Nardi Benchmark");
    println!("=================================================");
    println!();

    // Stored networks keep their own hidden sizes; `arch` only shapes a fresh one.
    let load = |path: &PathBuf, arch: Architecture| match ValueNet::open(
        path,
        arch,
        NARDI_FEATURES,
        seed,
    ) {
        Ok(net) => net,
        Err(e) => {
            eprintln!("Error loading {}: {}", path.display(), e);
            process::exit(1);
        }
    };

    let model_a = load(&model_file, arch);
    let model_b = opponent_model_file
        .as_ref()
        .map(|path| load(path, opponent_arch.unwrap_or(arch)));

    let (h1, h2) = model_a.hidden_sizes();
    println!("A: {} ({}, {}x{})", strategy_a, model_file.display(), h1, h2);
    match (&opponent_model_file, &model_b) {
        (Some(path), Some(net)) => {
            let (h1, h2) = net.hidden_sizes();
            println!("B: {} ({}, {}x{})", strategy_b, path.display(), h1, h2);
        }
        _ => println!("B: {}", strategy_b),
    }
    println!("Games: {} per seating", games);
    println!(
        "Threads: {}",
        if threads == 0 { "auto".to_string() } else { threads.to_string() }
    );
    println!("Seed: {}", seed);
    println!();

    let a = Contender::with_model(strategy_a, &model_a);
    let b = Contender::with_model(strategy_b, model_b.as_ref().unwrap_or(&model_a));

    let settings = BenchmarkSettings {
        games_per_seating: games,
        chunk: chunk.max(1),
        threads: (threads > 0).then_some(threads),
        seed,
    };

    let bar = ProgressBar::new(2 * games as u64);
    bar.set_style(
        ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} games ({per_sec}, eta {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let start_time = Instant::now();
    let result = benchmark_parallel(&NardiEngine::new(), a, b, &settings, |done| {
        bar.set_position(done as u64);
    });
    bar.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Benchmark failed: {}", e);
            process::exit(1);
        }
    };

    let elapsed = start_time.elapsed().as_secs_f64();
    println!("Games played: {}", result.games);
    println!("Points: A {} - B {}", result.points_a, result.points_b);
    println!("Win rate of A: {:.2}%", result.win_rate() * 100.0);
    println!("Total time: {:.2}s ({:.1} games/s)", elapsed, result.games as f64 / elapsed.max(1e-9));
}

fn parse_arch(text: &str) -> Architecture {
    match Architecture::parse(text) {
        Ok(arch) => arch,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn print_help() {
    println!("Long Nardi Benchmark");
    println!();
    println!("Usage: benchmark [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -m, --model <FILE>           Network for strategy A (default: nardi_value.bin)");
    println!("  -a, --strategy <NAME>        Strategy A (default: greedy)");
    println!("  -b, --opponent <NAME>        Strategy B (default: heuristic)");
    println!("      --opponent-model <FILE>  Separate network for B");
    println!("      --arch <ARCH>            Shape of a fresh network for A (default: compact)");
    println!("      --opponent-arch <ARCH>   Shape of a fresh network for B (default: --arch)");
    println!("  -g, --games <N>              Games per seating (default: 1000)");
    println!("      --chunk <N>              Games per parallel job (default: 64)");
    println!("  -t, --threads <N>            Number of threads (default: auto)");
    println!("  -s, --seed <N>               Random seed (default: 0)");
    println!("  -h, --help                   Print help");
    println!();
    println!("Strategies: greedy, noisy, lookahead, random, heuristic");
}
