//! # Batch Image Converter - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Risoluzione delle configurazioni nominate (file JSON o preset)
//! - Esecuzione sequenziale di un run per ogni configurazione
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, `RUST_LOG` se presente)
//! 3. Carica tutte le configurazioni richieste
//! 4. Per ogni configurazione crea un `BatchConverter` e lo esegue
//! 5. Un errore fatale in un run viene loggato e si passa al successivo
//!
//! ## Esempio di utilizzo:
//! ```bash
//! batch-convert --config thumbnail,ogp --concurrency 4 --verbose
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use batch_image_converter::{
    json_output::JsonMessage, BatchConverter, ConfigStore, OutputMode, RunConfig,
};

#[derive(Parser)]
#[command(name = "batch-convert")]
#[command(about = "Convert image folders to size-targeted JPEGs with bounded parallelism")]
struct Args {
    /// Comma-separated configuration names (config files or built-in presets)
    #[arg(short, long)]
    config: Option<String>,

    /// Directory containing <name>.json configuration files
    #[arg(long)]
    configs_dir: Option<PathBuf>,

    /// List available configurations and exit
    #[arg(long)]
    list_configs: bool,

    /// Print the resolved configurations as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Override the number of parallel workers
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Process one file at a time
    #[arg(long)]
    sequential: bool,

    /// Emit JSON lines on stdout instead of human-readable output
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; in JSON mode stdout is reserved for messages
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let store = ConfigStore::new(args.configs_dir.clone().unwrap_or_else(ConfigStore::default_dir));

    if args.list_configs {
        println!("Available configurations ({}):", store.configs_dir().display());
        for name in store.available() {
            println!("  - {}", name);
        }
        return Ok(());
    }

    let names = args
        .config
        .as_deref()
        .map(ConfigStore::parse_names)
        .unwrap_or_default();
    let mut configs = store
        .load_many(&names)
        .await
        .context("Failed to load configurations")?;

    if let Some(concurrency) = args.concurrency {
        for config in &mut configs {
            config.concurrency = concurrency;
        }
    }

    if args.print_config {
        for config in &configs {
            println!("{}", config.to_json()?);
        }
        return Ok(());
    }

    let mut failed_runs = 0;
    for config in configs {
        let name = config.name.clone();
        if let Err(e) = run_one(config, &args).await {
            failed_runs += 1;
            if args.json {
                JsonMessage::error(&name, format!("{:#}", e)).emit();
            } else {
                error!("Run '{}' failed: {:#}", name, e);
            }
        }
    }

    if failed_runs > 0 {
        info!("{} run(s) failed", failed_runs);
    }

    Ok(())
}

async fn run_one(config: RunConfig, args: &Args) -> Result<()> {
    let name = config.name.clone();
    let converter = BatchConverter::new(config, args.output_mode())
        .with_context(|| format!("Invalid configuration '{}'", name))?
        .sequential(args.sequential);

    converter
        .run()
        .await
        .with_context(|| format!("Conversion '{}' aborted", name))?;

    Ok(())
}
