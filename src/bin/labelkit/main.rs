//! Developer CLI over the label utilities and trainer schedule.

mod args;
mod io;

use std::path::Path;

use labelkit::logging::{self, LogOptions};
use labelkit::ml::metrics::score_predictions;
use labelkit::training::{LoaderSpec, TrainerConfig, TrainingPlan};
use labelkit::utils::{preds_to_probs, probs_to_preds, set_seed, to_label_vector};
use serde_json::{Value, json};

use args::{CliOptions, Command, parse_args};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    init_logging(&options);
    let output = execute(&options.command)?;
    let text = serde_json::to_string_pretty(&output).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}

fn init_logging(options: &CliOptions) {
    let log_options = LogOptions {
        default_filter: if options.quiet { "warn" } else { "info" }.to_string(),
        log_to_file: options.log_to_file,
    };
    if let Err(err) = logging::init_with(&log_options) {
        eprintln!("Logging disabled: {err}");
    }
}

fn execute(command: &Command) -> Result<Value, String> {
    match command {
        Command::Preds {
            input,
            policy,
            tol,
            seed,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            match seed {
                Some(seed) => set_seed(*seed),
                None => config.apply_seed(),
            }
            let probs = io::read_matrix(input)?;
            let preds = probs_to_preds(&probs, *policy, *tol).map_err(|err| err.to_string())?;
            tracing::info!("Converted {} probability rows to predictions", preds.len());
            Ok(io::vector_to_json(&preds))
        }
        Command::Probs { input, classes } => {
            let preds = read_labels(input)?;
            let probs = preds_to_probs(&preds, *classes).map_err(|err| err.to_string())?;
            Ok(io::matrix_to_json(&probs))
        }
        Command::Score {
            golds,
            preds,
            classes,
        } => {
            let golds = read_labels(golds)?;
            let preds = read_labels(preds)?;
            let report =
                score_predictions(&golds, &preds, *classes).map_err(|err| err.to_string())?;
            serde_json::to_value(report).map_err(|err| err.to_string())
        }
        Command::LrSchedule {
            config,
            batches_per_epoch,
        } => {
            let config = load_config(config.as_deref())?;
            let loader = LoaderSpec::new("cli", config.train_split.clone(), *batches_per_epoch);
            let plan = TrainingPlan::new(&config, &[loader]).map_err(|err| err.to_string())?;
            let steps: Vec<Value> = plan
                .steps()
                .map(|step| {
                    json!({
                        "epoch": step.epoch,
                        "batch": step.batch,
                        "loader": step.loader,
                        "lr": step.lr,
                    })
                })
                .collect();
            Ok(Value::Array(steps))
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<TrainerConfig, String> {
    match path {
        Some(path) => TrainerConfig::load_from_path(path),
        None => TrainerConfig::load_from_app_dir(),
    }
    .map_err(|err| err.to_string())
}

fn read_labels(path: &Path) -> Result<ndarray::Array1<i64>, String> {
    let array = io::read_array(path)?;
    to_label_vector(&array).map_err(|err| format!("{}: {err}", path.display()))
}
