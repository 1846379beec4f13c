mod config;
mod logging;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use docschema_core::{Error as CoreError, JsonOptions, build_reference_report, into_document};
use docschema_model::ModelRegistry;
use schemars::schema_for;
use serde_json::{Value, json};
use thiserror::Error;

use config::{ConfigFile, load_config};
use logging::init_logging;

#[derive(Debug, Error)]
enum CliError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("reference graph contains a cycle: {0}")]
    Cycle(String),
    #[error("{0} document(s) failed validation")]
    Invalid(usize),
}

#[derive(Parser, Debug)]
#[command(name = "docschema", version, about = "Document schema toolkit")]
struct Cli {
    /// Collection definitions file.
    #[arg(long, global = true, default_value = "docschema.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate definitions and print the reference graph report.
    Check(CheckArgs),
    /// Validate documents against a collection schema.
    Validate(ValidateArgs),
    /// Print the JSON Schema of the definitions file.
    JsonSchema,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Fail when references form a cycle.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Collection whose schema is applied.
    #[arg(long)]
    collection: String,
    /// JSON file holding one document or an array of documents.
    document: PathBuf,
    /// Show sensitive fields unredacted.
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::JsonSchema => {
            let schema = schema_for!(ConfigFile);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Command::Check(args) => {
            let config = load_config(&cli.config)?;
            init_logging(&config.logging)?;
            run_check(config, args)
        }
        Command::Validate(args) => {
            let config = load_config(&cli.config)?;
            init_logging(&config.logging)?;
            run_validate(config, args).await
        }
    }
}

fn run_check(config: ConfigFile, args: CheckArgs) -> Result<(), CliError> {
    let timer = Instant::now();
    let registry = ModelRegistry::from_definitions(&config.definitions)?;
    tracing::info!(event = "definitions_valid", collections = registry.models().len());

    let report = build_reference_report(&config.definitions);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(cycle) = report.cycle.as_ref().filter(|_| args.strict) {
        return Err(CliError::Cycle(cycle.join(" -> ")));
    }
    tracing::info!(
        event = "check_finished",
        has_cycle = report.has_cycle(),
        duration_ms = timer.elapsed().as_millis()
    );
    Ok(())
}

async fn run_validate(config: ConfigFile, args: ValidateArgs) -> Result<(), CliError> {
    let registry = ModelRegistry::from_definitions(&config.definitions)?;
    let model = registry
        .get_by_name(&args.collection)
        .ok_or_else(|| CliError::UnknownCollection(args.collection.clone()))?;

    let content = std::fs::read_to_string(&args.document).map_err(|err| {
        CliError::InvalidConfig(format!("{}: {err}", args.document.display()))
    })?;
    let documents = match serde_json::from_str::<Value>(&content)? {
        Value::Array(items) => items,
        other => vec![other],
    };

    let options = JsonOptions {
        verbose: args.verbose,
        ..JsonOptions::default()
    };
    let mut results = Vec::with_capacity(documents.len());
    let mut failed = 0;
    for (position, document) in documents.into_iter().enumerate() {
        let Some(data) = into_document(document) else {
            failed += 1;
            results.push(json!({ "index": position, "error": "document must be a JSON object" }));
            continue;
        };
        let mut instance = model.instance_from(&data);
        match instance.schema_mut().validated() {
            Ok(()) => {
                let rendered = instance.to_json(&options).await?;
                results.push(json!({ "index": position, "document": rendered }));
            }
            Err(err) => {
                failed += 1;
                tracing::warn!(event = "document_invalid", index = position, error = %err);
                results.push(json!({ "index": position, "error": err.to_string() }));
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    tracing::info!(
        event = "validate_finished",
        collection = %args.collection,
        documents = results.len(),
        failed
    );
    if failed > 0 {
        return Err(CliError::Invalid(failed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn validate_takes_collection_and_file() {
        let cli = Cli::try_parse_from([
            "docschema",
            "--config",
            "blog.toml",
            "validate",
            "--collection",
            "posts",
            "post.json",
            "--verbose",
        ])
        .expect("parse args");
        assert_eq!(cli.config, PathBuf::from("blog.toml"));
        match cli.command {
            Command::Validate(args) => {
                assert_eq!(args.collection, "posts");
                assert_eq!(args.document, PathBuf::from("post.json"));
                assert!(args.verbose);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
