mod display;

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use diabrisk_ai::{LifecycleError, ModelManager};
use diabrisk_core::pima::{FEATURE_COUNT, FEATURES};
use diabrisk_core::{Observation, Outcome, OutcomeChoice, Settings};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Diabetes risk prediction from the Pima clinical features.
#[derive(Parser, Debug)]
#[command(name = "diabrisk", version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    paths: SettingsArgs,

    #[command(subcommand)]
    command: Command,
}

/// Overrides applied on top of the defaults and the optional config file.
#[derive(Args, Debug, Default)]
struct SettingsArgs {
    /// JSON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory that relative data and model paths resolve against
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Base dataset CSV
    #[arg(long, env = "DIABRISK_BASE", global = true)]
    base: Option<PathBuf>,

    /// Append-only CSV of user-labelled rows
    #[arg(long, env = "DIABRISK_INCREMENT", global = true)]
    increment: Option<PathBuf>,

    /// Model artifact path
    #[arg(long, env = "DIABRISK_MODEL", global = true)]
    model: Option<PathBuf>,

    /// Number of trees in the forest
    #[arg(long, env = "DIABRISK_TREES", global = true)]
    trees: Option<usize>,

    /// Seed for bootstrap sampling and feature selection
    #[arg(long, env = "DIABRISK_SEED", global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict the outcome for one set of feature values
    Predict(FeatureArgs),
    /// Store the true outcome for one set of feature values and retrain
    Record {
        #[command(flatten)]
        features: FeatureArgs,

        /// Ground-truth outcome; only a known outcome is stored
        #[arg(long, value_enum, default_value_t = OutcomeArg::Unknown)]
        outcome: OutcomeArg,
    },
    /// Retrain over the base dataset and every recorded row
    Retrain,
    /// Show dataset sizes and model metadata
    Info,
}

/// Feature values, defaulting to the form defaults.
#[derive(Args, Debug)]
struct FeatureArgs {
    #[arg(long, default_value_t = FEATURES[0].default)]
    pregnancies: f64,
    #[arg(long, default_value_t = FEATURES[1].default)]
    glucose: f64,
    #[arg(long, default_value_t = FEATURES[2].default)]
    blood_pressure: f64,
    #[arg(long, default_value_t = FEATURES[3].default)]
    skin_thickness: f64,
    #[arg(long, default_value_t = FEATURES[4].default)]
    insulin: f64,
    #[arg(long, default_value_t = FEATURES[5].default)]
    bmi: f64,
    #[arg(long, default_value_t = FEATURES[6].default)]
    diabetes_pedigree_function: f64,
    #[arg(long, default_value_t = FEATURES[7].default)]
    age: f64,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutcomeArg {
    Unknown,
    NonDiabetic,
    Diabetic,
}

impl From<OutcomeArg> for OutcomeChoice {
    fn from(arg: OutcomeArg) -> Self {
        match arg {
            OutcomeArg::Unknown => OutcomeChoice::Unknown,
            OutcomeArg::NonDiabetic => OutcomeChoice::Known(Outcome::NonDiabetic),
            OutcomeArg::Diabetic => OutcomeChoice::Known(Outcome::Diabetic),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = cli.paths.resolve()?;
    tracing::info!(
        base = %settings.base_dataset.display(),
        model = %settings.model_path.display(),
        "diabrisk v{}",
        env!("CARGO_PKG_VERSION")
    );

    match cli.command {
        Command::Predict(features) => {
            let observation = features.observation()?;
            let manager = start(&settings)?;
            let outcome = manager.predict(&observation);
            let risk = manager.risk(&observation);
            print!("{}", display::prediction(&observation, outcome, risk));
        }
        Command::Record { features, outcome } => {
            let Some(outcome) = OutcomeChoice::from(outcome).known() else {
                bail!(
                    "the true outcome is unknown; pass --outcome diabetic or \
                     --outcome non-diabetic to record it"
                );
            };
            let observation = features.observation()?;
            let mut manager = start(&settings)?;
            let report = manager
                .record_and_retrain(&observation, outcome)
                .map_err(lifecycle)
                .context("recording outcome")?;
            print!("{}", display::recorded(outcome, &report));
        }
        Command::Retrain => {
            let mut manager = start(&settings)?;
            let report = manager
                .retrain()
                .map_err(lifecycle)
                .context("retraining model")?;
            print!("{}", display::retrained(&report));
        }
        Command::Info => {
            let manager = start(&settings)?;
            let increment_rows = manager
                .store()
                .increment_len()
                .context("reading increment dataset")?;
            print!("{}", display::info(&manager, increment_rows));
        }
    }

    Ok(())
}

fn start(settings: &Settings) -> anyhow::Result<ModelManager> {
    ModelManager::from_settings(settings)
        .map_err(lifecycle)
        .context("initializing model")
}

/// Tag a lifecycle error with its category.
fn lifecycle(err: LifecycleError) -> anyhow::Error {
    let kind = err.kind();
    anyhow::Error::new(err).context(kind.to_string())
}

impl SettingsArgs {
    /// Defaults, then the config file, then flags and environment, then `--data-dir`.
    fn resolve(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_json_file(path)?,
            None => Settings::default(),
        };
        if let Some(path) = &self.base {
            settings.base_dataset = path.clone();
        }
        if let Some(path) = &self.increment {
            settings.increment_path = path.clone();
        }
        if let Some(path) = &self.model {
            settings.model_path = path.clone();
        }
        if let Some(trees) = self.trees {
            settings.forest.n_trees = trees;
        }
        if let Some(seed) = self.seed {
            settings.forest.seed = seed;
        }
        if let Some(dir) = &self.data_dir {
            settings = settings.rooted_at(dir);
        }
        Ok(settings)
    }
}

impl FeatureArgs {
    fn raw(&self) -> [f64; FEATURE_COUNT] {
        [
            self.pregnancies,
            self.glucose,
            self.blood_pressure,
            self.skin_thickness,
            self.insulin,
            self.bmi,
            self.diabetes_pedigree_function,
            self.age,
        ]
    }

    /// Clamp into the form bounds and validate.
    fn observation(&self) -> anyhow::Result<Observation> {
        let mut values = self.raw();
        for (spec, value) in FEATURES.iter().zip(values.iter_mut()) {
            let clamped = spec.clamp(*value);
            if clamped != *value {
                warn!(
                    feature = spec.name,
                    value = *value,
                    clamped,
                    "value outside form bounds; clamped"
                );
                *value = clamped;
            }
        }
        Observation::from_values(values).context("invalid feature values")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diabrisk_ai::ErrorKind;
    use std::path::Path;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("diabrisk").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn feature_flags_default_to_form_values() {
        let cli = parse(&["predict"]);
        let Command::Predict(features) = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(features.observation().unwrap(), Observation::default());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cli = parse(&["predict", "--glucose", "450", "--bmi", "-3"]);
        let Command::Predict(features) = cli.command else {
            panic!("expected predict");
        };
        let obs = features.observation().unwrap();
        assert_eq!(obs.glucose, 300);
        assert_eq!(obs.bmi, 0.0);
    }

    #[test]
    fn fractional_count_is_rejected() {
        let cli = parse(&["predict", "--pregnancies", "2.5"]);
        let Command::Predict(features) = cli.command else {
            panic!("expected predict");
        };
        assert!(features.observation().is_err());
    }

    #[test]
    fn record_outcome_defaults_to_unknown() {
        let cli = parse(&["record"]);
        let Command::Record { outcome, .. } = cli.command else {
            panic!("expected record");
        };
        assert_eq!(OutcomeChoice::from(outcome), OutcomeChoice::Unknown);

        let cli = parse(&["record", "--outcome", "non-diabetic"]);
        let Command::Record { outcome, .. } = cli.command else {
            panic!("expected record");
        };
        assert_eq!(
            OutcomeChoice::from(outcome).known(),
            Some(Outcome::NonDiabetic)
        );
    }

    #[test]
    fn flags_override_config_file_and_data_dir_roots_relative_paths() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = tmp.path().join("diabrisk.json");
        std::fs::write(
            &config,
            r#"{"model_path": "models/m.json", "forest": {"n_trees": 7}}"#,
        )
        .unwrap();

        let cli = parse(&[
            "--config",
            config.to_str().unwrap(),
            "--data-dir",
            "/srv/diabrisk",
            "--seed",
            "9",
            "info",
        ]);
        let settings = cli.paths.resolve().unwrap();

        assert_eq!(settings.model_path, Path::new("/srv/diabrisk/models/m.json"));
        assert_eq!(settings.base_dataset, Path::new("/srv/diabrisk/diabetes.csv"));
        assert_eq!(settings.forest.n_trees, 7);
        assert_eq!(settings.forest.seed, 9);
    }

    #[test]
    fn lifecycle_errors_carry_their_kind() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = Settings::default().rooted_at(tmp.path());
        let err = ModelManager::from_settings(&settings).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);

        let rendered = format!("{:#}", lifecycle(err));
        assert!(rendered.starts_with("data unavailable: "), "{rendered}");
    }
}
