//! zkay Compiler CLI
//!
//! Compiles a parsed zkay source unit (JSON) into a public contract, a JSON
//! description of every circuit and a manifest.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, Level};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};
use zkay_compiler::{Compilation, CompilerConfig, CompilerError, CryptoBackend, Manifest, SourceUnit};
use zkay_runtime::MANIFEST_FILENAME;

const CONTRACT_FILE: &str = "contract.sol";
const CIRCUITS_FILE: &str = "circuits.json";

#[derive(Parser)]
#[command(name = "zkayc")]
#[command(about = "Compile privacy-annotated contracts into public contracts and circuits", long_about = None)]
struct Cli {
    /// Log every compiler pass
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source unit and write the results to a directory
    Compile {
        /// Path to the parsed source unit (JSON)
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "zkay_out")]
        output: PathBuf,

        /// Overwrite an output directory compiled with different options
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Run name resolution and all checks without generating code
    Check {
        /// Path to the parsed source unit (JSON)
        input: PathBuf,
    },

    /// Show the circuit sizes of every function
    Info {
        /// Path to the parsed source unit (JSON)
        input: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// Compiler options (JSON), defaults are used for missing fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Encryption backend (dummy, dummy-hom, rsa-oaep, rsa-pkcs1.5, ecdh-aes, ecdh-chaskey, paillier, elgamal)
    #[arg(long)]
    crypto_backend: Option<String>,

    /// Hash the public circuit arguments above this count
    #[arg(long)]
    hash_threshold: Option<usize>,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    Registry::default()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_filter(Targets::new().with_default(level)))
        .try_init()
        .ok();
}

fn load_config(args: &ConfigArgs) -> Result<CompilerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let content =
                fs::read_to_string(path).context(format!("Failed to read config file: {:?}", path))?;
            serde_json::from_str(&content).context("Failed to parse config JSON")?
        }
        None => CompilerConfig::default(),
    };
    if let Some(backend) = &args.crypto_backend {
        config.crypto_backend = backend.parse::<CryptoBackend>()?;
    }
    if let Some(threshold) = args.hash_threshold {
        config.opt_hash_threshold = threshold;
    }
    config.validate()?;
    Ok(config)
}

fn load_unit(path: &Path) -> Result<SourceUnit> {
    let content = fs::read_to_string(path).context(format!("Failed to read source unit: {:?}", path))?;
    SourceUnit::from_json(&content).context("Failed to parse source unit JSON")
}

/// Turns a compiler error into a located diagnostic
fn diagnostic(err: CompilerError) -> anyhow::Error {
    anyhow::anyhow!(err.render(None))
}

/// Refuses to overwrite an output directory holding an incompatible compilation
fn check_previous_output(output: &Path, config: &CompilerConfig) -> Result<()> {
    let path = output.join(MANIFEST_FILENAME);
    if !path.exists() {
        return Ok(());
    }
    let previous = Manifest::load(&path).context(format!("Failed to load existing manifest: {:?}", path))?;
    previous
        .check_compatible(config)
        .context("Output directory holds a compilation with different options (use --force to overwrite)")
}

fn write_output(compilation: &Compilation, config: &CompilerConfig, output: &Path) -> Result<()> {
    fs::create_dir_all(output).context(format!("Failed to create output directory: {:?}", output))?;

    let contract_path = output.join(CONTRACT_FILE);
    fs::write(&contract_path, compilation.render())
        .context(format!("Failed to write contract to {:?}", contract_path))?;

    let circuits_path = output.join(CIRCUITS_FILE);
    let circuits = serde_json::to_string_pretty(&compilation.circuits)?;
    fs::write(&circuits_path, circuits).context(format!("Failed to write circuits to {:?}", circuits_path))?;

    let manifest = Manifest::new(config, CONTRACT_FILE, compilation.verifier_names());
    manifest.save(output).context("Failed to write manifest")?;
    debug!(dir = ?output, "output written");
    Ok(())
}

fn compile(input: &Path, output: &Path, force: bool, config: &CompilerConfig) -> Result<()> {
    let unit = load_unit(input)?;
    if !force {
        check_previous_output(output, config)?;
    }
    let compilation = zkay_compiler::compile(&unit, config).map_err(diagnostic)?;
    write_output(&compilation, config, output)?;

    println!("✅ Compiled {} contract(s)", compilation.contracts.len());
    println!("   Circuits: {}", compilation.circuits.len());
    for name in compilation.verifier_names() {
        println!("   Verifier: {}", name);
    }
    println!("   Output: {:?}", output);
    Ok(())
}

fn check(input: &Path) -> Result<()> {
    let unit = load_unit(input)?;
    let ast = zkay_compiler::check(&unit).map_err(diagnostic)?;

    println!("✅ No errors found");
    for f in ast.function_ids() {
        let func = ast.function(f);
        if func.facts.requires_verification_when_external || func.facts.requires_verification {
            let contract = &ast.contract(func.contract).name;
            println!("   {}.{} requires a proof", contract, func.name);
        }
    }
    Ok(())
}

fn show_info(input: &Path, config: &CompilerConfig) -> Result<()> {
    let unit = load_unit(input)?;
    let compilation = zkay_compiler::compile(&unit, config).map_err(diagnostic)?;

    println!("📋 Backend: {} ({})", config.crypto_backend, config.proving_scheme);
    if compilation.circuits.is_empty() {
        println!("   No function requires a proof");
    }
    for c in &compilation.circuits {
        println!();
        println!("   {}.{}", c.contract, c.function);
        if let Some(verifier) = &c.verifier {
            println!("   Verifier: {}", verifier);
        }
        println!("   Inputs:  {} (+{} from calls)", c.in_size, c.trans_in_size);
        println!("   Outputs: {} (+{} from calls)", c.out_size, c.trans_out_size);
        println!("   Secret:  {} (+{} from calls)", c.priv_in_size, c.trans_priv_size);
        if !c.global_keys.is_empty() {
            println!("   Keys:    {}", c.global_keys.join(", "));
        }
        if c.uses_hash {
            println!("   Public arguments are hashed");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compile { input, output, force, config } => {
            let config = load_config(&config)?;
            compile(&input, &output, force, &config)?;
        }
        Commands::Check { input } => check(&input)?,
        Commands::Info { input, config } => {
            let config = load_config(&config)?;
            show_info(&input, &config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(&ConfigArgs::default()).unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_load_config_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"crypto_backend": "paillier", "opt_hash_threshold": 10}}"#).unwrap();

        let args = ConfigArgs {
            config: Some(file.path().to_path_buf()),
            crypto_backend: None,
            hash_threshold: Some(3),
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.crypto_backend, CryptoBackend::Paillier);
        assert_eq!(config.opt_hash_threshold, 3);
        assert_eq!(config.zk_in_name, "zk__in");
    }

    #[test]
    fn test_load_config_unknown_backend() {
        let args = ConfigArgs { crypto_backend: Some("rot13".to_string()), ..ConfigArgs::default() };
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_load_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"invalid": json}}"#).unwrap();

        let args = ConfigArgs { config: Some(file.path().to_path_buf()), ..ConfigArgs::default() };
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_load_unit_missing_file() {
        assert!(load_unit(Path::new("/nonexistent/unit.json")).is_err());
    }
}
