//! Self-play TD(λ) training binary for Long Nardi.
//!
//! Usage:
//!   cargo run --release --bin train -- [OPTIONS]
//!
//! Options:
//!   --config <FILE>        Configuration JSON file (optional)
//!   --stages <N>           Number of stages
//!   --episodes <N>         Self-play episodes per stage
//!   --checkpoint <FILE>    Network file, loaded if present and saved every stage
//!                          (default: nardi_value.bin)
//!   --diagnostics <DIR>    Directory for training_report.json
//!   --arch <ARCH>          compact, wide or H1xH2
//!   --seed <N>             Random seed (optional)
//!   --fast                 Use fast testing configuration

use std::env;
use std::path::PathBuf;
use std::process;

use indicatif::{ProgressBar, ProgressStyle};

use nardi_td::games::nardi::{NardiEngine, NARDI_FEATURES};
use nardi_td::models::{Architecture, ValueNet, NUM_OUTCOMES};
use nardi_td::td::trainer::{EdgePhase, TrainerEvent};
use nardi_td::td::{TdTrainer, TrainerConfig};

const DEFAULT_CHECKPOINT: &str = "nardi_value.bin";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();

    let mut config_file: Option<String> = None;
    let mut stages: Option<usize> = None;
    let mut episodes: Option<usize> = None;
    let mut checkpoint = PathBuf::from(DEFAULT_CHECKPOINT);
    let mut diagnostics: Option<PathBuf> = None;
    let mut arch: Option<String> = None;
    let mut seed: Option<u64> = None;
    let mut fast_mode = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_file = Some(args[i].clone());
                }
            }
            "--stages" => {
                i += 1;
                if i < args.len() {
                    stages = args[i].parse().ok();
                }
            }
            "--episodes" | "-e" => {
                i += 1;
                if i < args.len() {
                    episodes = args[i].parse().ok();
                }
            }
            "--checkpoint" | "-o" => {
                i += 1;
                if i < args.len() {
                    checkpoint = PathBuf::from(&args[i]);
                }
            }
            "--diagnostics" | "-d" => {
                i += 1;
                if i < args.len() {
                    diagnostics = Some(PathBuf::from(&args[i]));
                }
            }
            "--arch" => {
                i += 1;
                if i < args.len() {
                    arch = Some(args[i].clone());
                }
            }
            "--seed" | "-s" => {
                i += 1;
                if i < args.len() {
                    seed = args[i].parse().ok();
                }
            }
            "--fast" | "-f" => {
                fast_mode = true;
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

    println!("=================================================");
    println!("  Long Nardi TD(lambda) Trainer");
    println!("=================================================");
    println!();

    let mut config = if let Some(path) = &config_file {
        println!("Loading configuration from: {}", path);
        match TrainerConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                process::exit(1);
            }
        }
    } else if fast_mode {
        println!("Using fast testing configuration");
        TrainerConfig::fast()
    } else {
        TrainerConfig::default()
    };

    if let Some(n) = stages {
        config = config.with_stages(n);
    }
    if let Some(n) = episodes {
        config = config.with_episodes_per_stage(n);
    }
    if let Some(text) = &arch {
        match Architecture::parse(text) {
            Ok(a) => config = config.with_architecture(a),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }
    if let Some(s) = seed {
        config = config.with_seed(s);
    }
    if let Some(dir) = &diagnostics {
        config = config.with_diagnostics_dir(dir);
    }
    config = config.with_checkpoint(&checkpoint);

    let (h1, h2) = config.architecture.hidden_sizes();
    println!(
        "Network: {} -> {} -> {} -> {}",
        NARDI_FEATURES, h1, h2, NUM_OUTCOMES
    );
    println!(
        "Stages: {} x {} episodes",
        config.stages, config.episodes_per_stage
    );
    println!("Lambda: {}  Learning rate: {}", config.lambda, config.learning_rate);
    println!(
        "Benchmark: {} games per seating vs {}",
        config.benchmark_games, config.baseline
    );
    if let Some(s) = config.seed {
        println!("Seed: {}", s);
    }
    println!("Checkpoint: {}", checkpoint.display());
    println!();

    let model = match ValueNet::load_or_init(
        &checkpoint,
        config.architecture,
        NARDI_FEATURES,
        config.seed.unwrap_or(0),
    ) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Error loading network: {}", e);
            process::exit(1);
        }
    };

    let mut trainer = match TdTrainer::new(NardiEngine::new(), model, config) {
        Ok(trainer) => trainer,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    println!("Starting training...");
    println!();

    let style = ProgressStyle::with_template(
        "stage {prefix:>4} [{bar:40.cyan/blue}] {pos}/{len} episodes ({per_sec}, eta {eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    let mut bar: Option<ProgressBar> = None;

    let result = trainer.train_with_callback(|event| match event {
        TrainerEvent::StageStarted { stage, episodes } => {
            let pb = ProgressBar::new(*episodes as u64);
            pb.set_style(style.clone());
            pb.set_prefix(stage.to_string());
            bar = Some(pb);
        }
        TrainerEvent::EpisodeFinished { report, .. } => {
            if let Some(pb) = &bar {
                pb.inc(1);
                pb.set_message(format!("surprise {:.3}", report.max_surprise));
            }
        }
        TrainerEvent::StageFinished(record) => {
            if let Some(pb) = bar.take() {
                pb.finish_and_clear();
            }
            println!(
                "Stage {:>4} | win rate {:>6.2}% | surprise {:>7.4} | lr {:.6} | eps {:.3} | T {:.3}",
                record.stage,
                record.win_rate() * 100.0,
                record.max_surprise,
                record.learning_rate,
                record.eps,
                record.temperature
            );
        }
        TrainerEvent::EdgeBenchmark { phase, result } => {
            let label = match phase {
                EdgePhase::Before => "Before training",
                EdgePhase::After => "After training",
            };
            println!(
                "{}: win rate {:.2}% ({}-{} over {} games)",
                label,
                result.win_rate() * 100.0,
                result.points_a,
                result.points_b,
                result.games
            );
        }
    });

    let stats = match result {
        Ok(stats) => stats.clone(),
        Err(e) => {
            eprintln!("Training failed: {}", e);
            process::exit(1);
        }
    };

    println!();
    println!("Training complete!");
    println!("Episodes: {}", stats.episodes);
    println!("Total time: {:.2}s", stats.elapsed_seconds);
    println!("Speed: {:.1} episodes/s", stats.episodes_per_second);
    if let Some(best) = stats
        .stages
        .iter()
        .max_by(|a, b| a.win_rate().total_cmp(&b.win_rate()))
    {
        println!(
            "Best stage: {} ({:.2}%)",
            best.stage,
            best.win_rate() * 100.0
        );
    }
    println!("Network saved to: {}", checkpoint.display());
    if let Some(dir) = &diagnostics {
        println!("Report written to: {}", dir.join("training_report.json").display());
    }
}

fn print_help() {
    println!("Long Nardi TD(lambda) Trainer");
    println!();
    println!("Usage: train [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>      Configuration JSON file");
    println!("      --stages <N>         Number of stages");
    println!("  -e, --episodes <N>       Self-play episodes per stage");
    println!("  -o, --checkpoint <FILE>  Network file (default: {})", DEFAULT_CHECKPOINT);
    println!("  -d, --diagnostics <DIR>  Directory for training_report.json");
    println!("      --arch <ARCH>        compact, wide or H1xH2 (e.g. 256x64)");
    println!("  -s, --seed <N>           Random seed");
    println!("  -f, --fast               Use fast testing configuration");
    println!("  -h, --help               Print help");
}
