use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use attest_core::paths::{data_dir, definitions_dir, settings_path, store_path};
use attest_core::qr::QrResult;
use attest_core::secrets::{store_smart_pass_key, SmartPassEnv};
use attest_core::settings::ImportSettings;
use attest_core::store::{AttestationStore, FileStore, PersistenceManager};
use attest_service::importer::{Importer, LogListener};
use attest_service::legacy::DirectoryDefinitions;
use attest_service::rpc::JsonRpcReader;
use attest_service::smartpass::SmartPassNotifier;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Attestation import service", long_about = None)]
struct Cli {
    /// Settings file (defaults to the data directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KeyEnv {
    Prod,
    Dev,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import a scanned QR result (JSON file, `-` for stdin)
    Import {
        path: PathBuf,
        /// Wallet address the attestation must be addressed to
        #[arg(long)]
        wallet: Option<String>,
    },
    /// Show one stored attestation record
    Show { key: String },
    /// List stored attestation records
    List {
        /// Include tombstoned records
        #[arg(long)]
        all: bool,
    },
    /// Store the SmartPass API key in the OS keyring
    SetSmartPassKey {
        #[arg(value_enum)]
        env: KeyEnv,
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let settings_file = match cli.settings {
        Some(path) => path,
        None => settings_path()?,
    };
    let settings = ImportSettings::load(&settings_file)?;
    match cli.command {
        Commands::Import { path, wallet } => import_command(settings, path, wallet).await,
        Commands::Show { key } => show_command(&settings, &key),
        Commands::List { all } => list_command(&settings, all),
        Commands::SetSmartPassKey { env, key } => {
            let env = match env {
                KeyEnv::Prod => SmartPassEnv::Production,
                KeyEnv::Dev => SmartPassEnv::Development,
            };
            store_smart_pass_key(env, &key)?;
            println!("SmartPass key stored");
            Ok(())
        }
    }
}

fn open_store(settings: &ImportSettings) -> Result<FileStore> {
    let path = match &settings.store_path {
        Some(path) => path.clone(),
        None => store_path()?,
    };
    Ok(FileStore::open(path)?)
}

async fn read_input(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == "-" {
        use tokio::io::AsyncReadExt;
        let mut input = String::new();
        tokio::io::stdin().read_to_string(&mut input).await?;
        Ok(input)
    } else {
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

async fn import_command(
    settings: ImportSettings,
    path: PathBuf,
    wallet_override: Option<String>,
) -> Result<()> {
    std::fs::create_dir_all(data_dir()?)?;
    let wallet_text = wallet_override.unwrap_or_else(|| settings.wallet_address.clone());
    let wallet: Address = wallet_text
        .trim()
        .parse()
        .map_err(|e| anyhow!("wallet address {wallet_text:?} is invalid: {e}"))?;

    let qr = QrResult::from_json(&read_input(&path).await?)?;
    let reader = Arc::new(JsonRpcReader::new(settings.rpc_urls.clone())?);
    let definitions_root = match &settings.definitions_dir {
        Some(dir) => dir.clone(),
        None => definitions_dir()?,
    };
    let definitions = Arc::new(DirectoryDefinitions::new(definitions_root));
    let store: Arc<dyn AttestationStore> = Arc::new(open_store(&settings)?);
    let persistence = Arc::new(PersistenceManager::new(store));
    let notifier = Arc::new(SmartPassNotifier::from_settings(settings.smart_pass.clone())?);

    let importer = Arc::new(
        Importer::new(wallet, reader, definitions, persistence, Arc::new(LogListener))
            .with_smart_pass(notifier),
    );

    let task = importer.spawn_import(qr);
    let abort = task.abort_handle();
    tokio::select! {
        joined = task => {
            let outcome = joined??;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        _ = signal::ctrl_c() => {
            warn!("import cancelled");
            abort.abort();
            Err(anyhow!("import cancelled"))
        }
    }
}

fn show_command(settings: &ImportSettings, key: &str) -> Result<()> {
    let store = open_store(settings)?;
    let record = store
        .get(key)?
        .ok_or_else(|| anyhow!("no attestation stored under {key}"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn list_command(settings: &ImportSettings, all: bool) -> Result<()> {
    let store = open_store(settings)?;
    let records = store.list()?;
    info!(path = %store.path().display(), count = records.len(), "listing attestations");
    for record in records.iter().filter(|r| all || r.is_live()) {
        let status = record.status.map(|s| s.label()).unwrap_or("-");
        println!(
            "{}\t{}\t{}\t{}",
            record.key, record.chains, status, record.name
        );
    }
    Ok(())
}
