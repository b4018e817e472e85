//! Signalling game training CLI.
//!
//! Generates an attribute-game dataset, trains sender, receiver and (for the
//! predictor variants) predictor, logs metrics and sample messages, and
//! writes one safetensors file per network.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -p signal-learn --bin train-game -- \
//!   --config hparams.json \
//!   --variant with_prediction --predictor-weight 0.5 \
//!   --epochs 50 --samples 10000 \
//!   --output checkpoints/
//! ```
//!
//! Flags override values loaded from `--config`.

use std::path::PathBuf;
use std::time::Instant;

use candle_core::Device;
use signal_core::{GameVariant, Hparams};
use signal_learn::dataset::{AttributeGameDataset, DatasetConfig};
use signal_learn::inspect::log_message_samples;
use signal_learn::setup::build_game;
use signal_soft::training::{fit, FitConfig};
use tracing_subscriber::EnvFilter;

const PROBE_SIZE: usize = 5;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args);
    let hparams = cli.resolve_hparams();

    eprintln!("=== Signal Game Training ===");
    eprintln!("Variant:    {}", hparams.variant.label());
    eprintln!("Message:    {} × {} symbols", hparams.msg_len, hparams.n_symbols);
    eprintln!("Hidden dim: {}", hparams.hidden_dim);
    eprintln!("Epochs:     {}", hparams.epochs);
    eprintln!("Batch size: {}", hparams.batch_size);
    eprintln!("LR:         {}", hparams.learning_rate);
    eprintln!("Pred. wt.:  {}", hparams.predictor_loss_weight);
    eprintln!("Packed:     {}", hparams.pack_message);
    eprintln!("Samples:    {}", cli.samples);
    eprintln!("Seed:       {}", hparams.seed);
    eprintln!();

    let device = Device::Cpu;
    let data_config = DatasetConfig {
        n_samples: cli.samples,
        ..DatasetConfig::default()
    };

    let start = Instant::now();
    let mut train_set = AttributeGameDataset::generate(&data_config, hparams.seed).unwrap_or_else(|e| {
        eprintln!("ERROR: failed to generate dataset: {e}");
        std::process::exit(1);
    });
    let val_set = train_set.split_off(cli.val_fraction).unwrap_or_else(|e| {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    });
    eprintln!(
        "Generated {} train / {} validation games in {:.1}s",
        train_set.len(),
        val_set.len(),
        start.elapsed().as_secs_f32()
    );

    let batches = |ds: &AttributeGameDataset| {
        ds.batches(hparams.batch_size, &device).unwrap_or_else(|e| {
            eprintln!("ERROR: failed to batch dataset: {e}");
            std::process::exit(1);
        })
    };
    let train_batches = batches(&train_set);
    let val_batches = batches(&val_set);

    let setup = build_game(&hparams, data_config.feature_dim(), &device).unwrap_or_else(|e| {
        eprintln!("ERROR: failed to build game: {e}");
        std::process::exit(1);
    });
    eprintln!("Game:       {:?}", setup.game);
    eprintln!("Parameters: {} tensors", setup.game.parameters().len());

    let mut optimizer = setup.game.configure_optimizer(&hparams).unwrap_or_else(|e| {
        eprintln!("ERROR: failed to build optimizer: {e}");
        std::process::exit(1);
    });

    eprintln!("\nStarting training...");
    let start = Instant::now();
    let fit_config = FitConfig {
        epochs: hparams.epochs,
        validation_interval: 1,
        log_every_n_steps: cli.log_every,
    };
    let result = fit(
        &setup.game,
        &mut optimizer,
        &train_batches,
        &val_batches,
        &fit_config,
    )
    .unwrap_or_else(|e| {
        eprintln!("ERROR: training failed: {e}");
        std::process::exit(1);
    });

    let elapsed = start.elapsed().as_secs_f32();
    eprintln!("\n=== Training Complete ===");
    eprintln!("Steps:      {}", result.steps_completed);
    eprintln!("Final loss: {:.6}", result.final_loss);
    eprintln!(
        "Time:       {:.1}s ({:.1} steps/s)",
        elapsed,
        result.steps_completed as f32 / elapsed.max(f32::EPSILON)
    );

    if !result.validation.is_empty() {
        eprintln!("\nValidation History:");
        for record in &result.validation {
            let line: Vec<String> = record
                .metrics
                .iter()
                .map(|(name, value)| format!("{name}={value:.4}"))
                .collect();
            eprintln!("  Epoch {:3}: {}", record.epoch, line.join("  "));
        }
    }

    // Probe messages for the first few validation games.
    let probe_source = if val_set.is_empty() { &train_set } else { &val_set };
    let probe_samples = &probe_source.samples()[..PROBE_SIZE.min(probe_source.len())];
    let labels: Vec<String> = probe_samples
        .iter()
        .map(|s| s.sender_item().label())
        .collect();
    if let Some(probe) = probe_source
        .batches(PROBE_SIZE, &device)
        .ok()
        .and_then(|b| b.into_iter().next())
    {
        match log_message_samples(&setup.game, &probe, &labels, hparams.epochs) {
            Ok(report) => {
                eprintln!("\nSample messages:");
                for (label, msg) in labels.iter().zip(&report.messages) {
                    eprintln!("  {label:<16} {msg:?}");
                }
                eprintln!("Symbol frequencies: {:?}", report.frequencies);
            }
            Err(e) => eprintln!("WARNING: failed to sample messages: {e}"),
        }
    }

    if let Err(e) = std::fs::create_dir_all(&cli.output) {
        eprintln!("ERROR: failed to create {}: {e}", cli.output.display());
        std::process::exit(1);
    }
    for (name, var_map) in &setup.var_maps {
        let path = cli.output.join(format!("{name}.safetensors"));
        eprintln!("Saving {name} to {}...", path.display());
        var_map.save(&path).unwrap_or_else(|e| {
            eprintln!("ERROR: failed to save {name}: {e}");
            std::process::exit(1);
        });
    }
    eprintln!("Done.");
}

struct CliConfig {
    config: Option<PathBuf>,
    output: PathBuf,
    samples: usize,
    val_fraction: f64,
    log_every: usize,
    variant: Option<GameVariant>,
    epochs: Option<usize>,
    batch_size: Option<usize>,
    lr: Option<f64>,
    msg_len: Option<usize>,
    n_symbols: Option<usize>,
    hidden_dim: Option<usize>,
    predictor_weight: Option<f64>,
    ignore_index: Option<u32>,
    no_pack: bool,
    seed: Option<u64>,
}

impl CliConfig {
    /// File values first, then flags, then validation.
    fn resolve_hparams(&self) -> Hparams {
        let mut hp = match &self.config {
            Some(path) => Hparams::from_json_file(path).unwrap_or_else(|e| {
                eprintln!("ERROR: failed to load {}: {e}", path.display());
                std::process::exit(1);
            }),
            None => Hparams::default(),
        };
        if let Some(v) = self.variant {
            hp.variant = v;
        }
        if let Some(v) = self.epochs {
            hp.epochs = v;
        }
        if let Some(v) = self.batch_size {
            hp.batch_size = v;
        }
        if let Some(v) = self.lr {
            hp.learning_rate = v;
        }
        if let Some(v) = self.msg_len {
            hp.msg_len = v;
        }
        if let Some(v) = self.n_symbols {
            hp.n_symbols = v;
        }
        if let Some(v) = self.hidden_dim {
            hp.hidden_dim = v;
        }
        if let Some(v) = self.predictor_weight {
            hp.predictor_loss_weight = v;
        }
        if self.ignore_index.is_some() {
            hp.ignore_index = self.ignore_index;
        }
        if self.no_pack {
            hp.pack_message = false;
        }
        if let Some(v) = self.seed {
            hp.seed = v;
        }
        if let Err(e) = hp.validate() {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
        hp
    }
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> &'a str {
    *i += 1;
    args.get(*i).map(String::as_str).unwrap_or_else(|| {
        eprintln!("ERROR: {flag} needs a value");
        std::process::exit(1);
    })
}

fn parsed<T: std::str::FromStr>(args: &[String], i: &mut usize, flag: &str) -> T {
    value(args, i, flag).parse().unwrap_or_else(|_| {
        eprintln!("ERROR: invalid {flag} value");
        std::process::exit(1);
    })
}

fn parse_args(args: &[String]) -> CliConfig {
    let mut config = CliConfig {
        config: None,
        output: PathBuf::from("checkpoints"),
        samples: 10_000,
        val_fraction: 0.1,
        log_every: 0,
        variant: None,
        epochs: None,
        batch_size: None,
        lr: None,
        msg_len: None,
        n_symbols: None,
        hidden_dim: None,
        predictor_weight: None,
        ignore_index: None,
        no_pack: false,
        seed: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => config.config = Some(PathBuf::from(value(args, &mut i, "--config"))),
            "--output" => config.output = PathBuf::from(value(args, &mut i, "--output")),
            "--samples" => config.samples = parsed(args, &mut i, "--samples"),
            "--val-fraction" => config.val_fraction = parsed(args, &mut i, "--val-fraction"),
            "--log-every" => config.log_every = parsed(args, &mut i, "--log-every"),
            "--variant" => {
                config.variant = Some(value(args, &mut i, "--variant").parse().unwrap_or_else(
                    |e| {
                        eprintln!("ERROR: {e}");
                        std::process::exit(1);
                    },
                ))
            }
            "--epochs" => config.epochs = Some(parsed(args, &mut i, "--epochs")),
            "--batch-size" => config.batch_size = Some(parsed(args, &mut i, "--batch-size")),
            "--lr" => config.lr = Some(parsed(args, &mut i, "--lr")),
            "--msg-len" => config.msg_len = Some(parsed(args, &mut i, "--msg-len")),
            "--n-symbols" => config.n_symbols = Some(parsed(args, &mut i, "--n-symbols")),
            "--hidden-dim" => config.hidden_dim = Some(parsed(args, &mut i, "--hidden-dim")),
            "--predictor-weight" => {
                config.predictor_weight = Some(parsed(args, &mut i, "--predictor-weight"))
            }
            "--ignore-index" => config.ignore_index = Some(parsed(args, &mut i, "--ignore-index")),
            "--no-pack" => config.no_pack = true,
            "--seed" => config.seed = Some(parsed(args, &mut i, "--seed")),
            "--help" | "-h" => {
                eprintln!("Usage: train-game [options]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --config PATH          JSON hyperparameter file (flags override it)");
                eprintln!("  --output DIR           Checkpoint directory (default: checkpoints)");
                eprintln!("  --samples N            Generated games (default: 10000)");
                eprintln!("  --val-fraction F       Held-out fraction (default: 0.1)");
                eprintln!("  --log-every N          Per-step metric logging interval (default: off)");
                eprintln!("  --variant V            baseline, with_prediction, merged (default: baseline)");
                eprintln!("  --epochs N             Training epochs (default: 10)");
                eprintln!("  --batch-size N         Batch size (default: 32)");
                eprintln!("  --lr FLOAT             Learning rate (default: 1e-3)");
                eprintln!("  --msg-len N            Message length (default: 5)");
                eprintln!("  --n-symbols N          Vocabulary size incl. stop symbol (default: 3)");
                eprintln!("  --hidden-dim N         Agent hidden width (default: 64)");
                eprintln!("  --predictor-weight F   Predictor loss weight (default: 1.0)");
                eprintln!("  --ignore-index N       Symbol excluded from predictor loss (default: none)");
                eprintln!("  --no-pack              Feed the receiver the raw message");
                eprintln!("  --seed N               Data generation seed (default: 42)");
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                eprintln!("Use --help for usage information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}
