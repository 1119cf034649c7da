use std::path::PathBuf;

use labelkit::utils::{DEFAULT_TIE_TOLERANCE, TieBreakPolicy};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Preds {
        input: PathBuf,
        policy: TieBreakPolicy,
        tol: f64,
        seed: Option<u64>,
        config: Option<PathBuf>,
    },
    Probs {
        input: PathBuf,
        classes: usize,
    },
    Score {
        golds: PathBuf,
        preds: PathBuf,
        classes: usize,
    },
    LrSchedule {
        config: Option<PathBuf>,
        batches_per_epoch: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CliOptions {
    pub command: Command,
    pub quiet: bool,
    pub log_to_file: bool,
}

pub(crate) fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut iter = args.into_iter();
    let command_name = iter.next().ok_or_else(help_text)?;
    if command_name == "-h" || command_name == "--help" {
        return Err(help_text());
    }

    let mut input: Option<PathBuf> = None;
    let mut golds: Option<PathBuf> = None;
    let mut preds: Option<PathBuf> = None;
    let mut config: Option<PathBuf> = None;
    let mut classes: Option<usize> = None;
    let mut batches_per_epoch: Option<usize> = None;
    let mut policy = TieBreakPolicy::default();
    let mut tol = DEFAULT_TIE_TOLERANCE;
    let mut seed: Option<u64> = None;
    let mut quiet = false;
    let mut log_to_file = true;

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match arg.as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--input" => input = Some(PathBuf::from(value("--input")?)),
            "--golds" => golds = Some(PathBuf::from(value("--golds")?)),
            "--preds" => preds = Some(PathBuf::from(value("--preds")?)),
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--classes" => classes = Some(parse_number(&value("--classes")?, "--classes")?),
            "--batches-per-epoch" => {
                batches_per_epoch = Some(parse_number(
                    &value("--batches-per-epoch")?,
                    "--batches-per-epoch",
                )?)
            }
            "--policy" => {
                policy = value("--policy")?
                    .parse::<TieBreakPolicy>()
                    .map_err(|err| err.to_string())?
            }
            "--tol" => tol = parse_number(&value("--tol")?, "--tol")?,
            "--seed" => seed = Some(parse_number(&value("--seed")?, "--seed")?),
            "--quiet" => quiet = true,
            "--no-log-file" => log_to_file = false,
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
    }

    let required = |path: Option<PathBuf>, flag: &str| {
        path.ok_or_else(|| format!("{command_name} requires {flag}"))
    };
    let command = match command_name.as_str() {
        "preds" => Command::Preds {
            input: required(input, "--input")?,
            policy,
            tol,
            seed,
            config,
        },
        "probs" => Command::Probs {
            input: required(input, "--input")?,
            classes: classes.ok_or_else(|| "probs requires --classes".to_string())?,
        },
        "score" => Command::Score {
            golds: required(golds, "--golds")?,
            preds: required(preds, "--preds")?,
            classes: classes.ok_or_else(|| "score requires --classes".to_string())?,
        },
        "lr-schedule" => Command::LrSchedule {
            config,
            batches_per_epoch: batches_per_epoch
                .ok_or_else(|| "lr-schedule requires --batches-per-epoch".to_string())?,
        },
        other => return Err(format!("Unknown command: {other}\n\n{}", help_text())),
    };

    Ok(CliOptions {
        command,
        quiet,
        log_to_file,
    })
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("Invalid {flag} value: {value}"))
}

pub(crate) fn help_text() -> String {
    [
        "labelkit",
        "",
        "Label array utilities for weak supervision pipelines.",
        "",
        "Usage:",
        "  labelkit preds --input probs.json [--policy random|true-random|abstain] [--tol 1e-5] [--seed n]",
        "  labelkit probs --input preds.json --classes <n>",
        "  labelkit score --golds golds.json --preds preds.json --classes <n>",
        "  labelkit lr-schedule --batches-per-epoch <n> [--config trainer.toml]",
        "",
        "Options:",
        "  --config <file>        Trainer config overrides (default: app dir trainer.toml).",
        "  --seed <u64>           Seed for random tie-breaking (overrides the config seed).",
        "  --quiet                Only log warnings and errors.",
        "  --no-log-file          Do not write a log file.",
    ]
    .join("\n")
}
