use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use schema_mask_registry::{Logger, RegistryConfig, Resolver, TypeRef, TypeUniverse};

#[derive(Parser, Debug)]
#[command(name = "mask-inspect")]
#[command(about = "Inspect the schema mask registry built from type manifests")]
struct CliOptions {
    /// Registry configuration file (TOML); discovered from the environment if omitted
    #[arg(long = "config", short = 'c')]
    config: Option<PathBuf>,

    /// Additional type manifest (YAML/JSON/TOML), may be repeated
    #[arg(long = "manifest", short = 'm')]
    manifests: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every registered schema tag
    Tags,
    /// Resolve the default implementation of a contract
    Resolve { contract: String },
    /// Resolve the deserializer implementation of a contract
    Deserializer { contract: String },
    /// Show the mask records of a schema tag
    Mask { tag: String },
    /// Print index statistics and fingerprint
    Stats,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let opts = CliOptions::parse();

    let config = match &opts.config {
        Some(path) => {
            let mut config = RegistryConfig::load(path)?;
            config.apply_env_from(|key| std::env::var(key).ok())?;
            config
        }
        None => RegistryConfig::discover()?,
    };

    let logger = Logger::stderr(config.registry.log_level);
    let universe: TypeUniverse = config.universe().with_manifests(opts.manifests.clone());
    let resolver = Resolver::build(&universe, config.resolver_options(logger)?)?;

    let output = match opts.command {
        Command::Tags => json!(resolver.tags().collect::<Vec<_>>()),
        Command::Resolve { contract } => {
            let contract = TypeRef::parse(&contract)?;
            let resolved = resolver.resolve_default_implementation(&contract)?;
            resolution_output(&contract, resolved)
        }
        Command::Deserializer { contract } => {
            let contract = TypeRef::parse(&contract)?;
            let resolved = resolver.resolve_deserializer_implementation(&contract)?;
            resolution_output(&contract, resolved)
        }
        Command::Mask { tag } => {
            let records = resolver
                .mask_schema_interface_info(&tag)
                .ok_or_else(|| anyhow!("unknown schema tag: {tag}"))?;
            serde_json::to_value(records)?
        }
        Command::Stats => json!({
            "stats": resolver.stats(),
            "fingerprint": resolver.fingerprint(),
        }),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn resolution_output(contract: &TypeRef, resolved: Option<TypeRef>) -> Value {
    json!({
        "contract": contract.to_string(),
        "concrete": resolved.map(|concrete| concrete.to_string()),
    })
}
