//! Animal health verdict CLI
//!
//! Loads the model artifacts once, then classifies a single symptom record,
//! prints the known vocabularies, or checks the bundle fingerprint.

use animal_health_core::config::LoggingConfig;
use animal_health_core::schema::ANIMAL_NAME_FIELD;
use animal_health_core::{
    predictor_from_config, ArtifactBundle, FeatureSchema, HealthConfig, Prediction, Predictor,
    RawInputRecord,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "health-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Graded health verdicts from categorical symptom observations", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Artifact directory, takes precedence over the configuration
    #[arg(short, long, global = true)]
    artifacts: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify one symptom record
    Predict {
        /// Feature value, e.g. `GeneralDisease=fever`
        #[arg(long = "set", value_name = "FEATURE=VALUE")]
        set: Vec<String>,

        /// Form field value, e.g. `lung=coughing`
        #[arg(long = "form", value_name = "FIELD=VALUE")]
        form: Vec<String>,

        /// JSON object mapping feature names to values
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// List known values per feature and the target labels
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load every artifact strictly and print the bundle fingerprint
    Verify {
        /// Fail unless the fingerprint equals this hex digest
        #[arg(long)]
        expected_hash: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.logging, args.verbose)?;

    debug!("health-check v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Artifact directory: {}",
        config.artifacts.directory.display()
    );

    match args.command {
        Command::Predict {
            set,
            form,
            input,
            json,
        } => {
            let record = build_record(input.as_deref(), &form, &set)?;
            let predictor =
                predictor_from_config(&config).context("Failed to initialise predictor")?;
            run_predict(&predictor, &record, json)
        }
        Command::Info { json } => {
            let predictor =
                predictor_from_config(&config).context("Failed to initialise predictor")?;
            run_info(&predictor, json)
        }
        Command::Verify { expected_hash } => {
            run_verify(&config, expected_hash.or(config.artifacts.expected_hash.clone()))
        }
    }
}

fn load_config(args: &Args) -> Result<HealthConfig> {
    let mut config = match &args.config {
        Some(path) => HealthConfig::load_from_file(path)
            .with_context(|| format!("Unable to load config file at {}", path.display()))?,
        None => HealthConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    if let Some(dir) = &args.artifacts {
        config.artifacts.directory = dir.clone();
    }
    Ok(config)
}

fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(logging.with_target)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("Failed to set tracing subscriber")
}

/// Merge the input file, form fields and feature assignments, later sources winning
fn build_record(input: Option<&Path>, form: &[String], set: &[String]) -> Result<RawInputRecord> {
    let mut record = match input {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read input file {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("Input file {} is not a JSON object", path.display()))?
        }
        None => RawInputRecord::new(),
    };

    let mut fields = Vec::with_capacity(form.len());
    for assignment in form {
        let (field, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("expected field=value, got {assignment:?}"))?;
        fields.push((field.trim(), value));
    }
    for (feature, value) in RawInputRecord::from_form(fields).iter() {
        record.insert(feature, value);
    }

    for assignment in set {
        record.insert_assignment(assignment)?;
    }
    Ok(record)
}

fn run_predict(predictor: &Predictor, record: &RawInputRecord, json: bool) -> Result<()> {
    if json {
        let outcome = predictor.evaluate(record);
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return match outcome.error {
            Some(error) => Err(anyhow!(error)),
            None => Ok(()),
        };
    }

    let prediction = predictor.predict(record).context("Prediction failed")?;
    print!("{}", render_prediction(record, &prediction));
    Ok(())
}

fn render_prediction(record: &RawInputRecord, prediction: &Prediction) -> String {
    let mut out = String::new();
    if let Some(name) = record.get(ANIMAL_NAME_FIELD).filter(|n| !n.trim().is_empty()) {
        out.push_str(&format!("Animal:     {}\n", name.trim()));
    }
    out.push_str(&format!("Verdict:    {}\n", prediction.verdict.message));
    out.push_str(&format!("Confidence: {}\n", prediction.verdict.confidence_text));
    out.push_str(&format!("Label:      {}\n", prediction.label));
    for class in &prediction.probabilities {
        out.push_str(&format!("  {:<12} {:.4}\n", class.label, class.probability));
    }
    for unknown in &prediction.encoded.diagnostics {
        out.push_str(&format!(
            "note: {} value {:?} is unknown, treated as {:?}\n",
            unknown.feature, unknown.value, unknown.substitute
        ));
    }
    out
}

fn run_info(predictor: &Predictor, json: bool) -> Result<()> {
    let view = predictor.info()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        for (feature, values) in &view {
            println!("{feature}: {}", values.join(", "));
        }
    }
    Ok(())
}

fn run_verify(config: &HealthConfig, expected: Option<String>) -> Result<()> {
    let paths = config.artifact_paths();
    let bundle = ArtifactBundle::load_strict(&paths).context("Artifact bundle is incomplete")?;
    let fingerprint = bundle.fingerprint()?;

    Predictor::strict(
        FeatureSchema::animal_health(),
        bundle,
        config.verdict_policy(),
    )
    .context("Artifacts do not match the feature schema")?;

    println!("{fingerprint}");
    if let Some(expected) = expected {
        let expected = expected.trim();
        if !fingerprint.eq_ignore_ascii_case(expected) {
            bail!("Fingerprint mismatch: expected {expected}, computed {fingerprint}");
        }
        info!("Artifact bundle fingerprint verified");
    }
    Ok(())
}
