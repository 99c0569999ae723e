/// Command line front end for a local digital notary.
///
/// Records (sealed keys, current citation, account) live under `--directory`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use notary_engine::config::NotaryConfig;
use notary_engine::logging::init_logging;
use notary_engine::vault::{FileVaultBackend, SealingKey, VaultBackend};
use notary_engine::{Certificate, ChainKind, Citation, Contract, DigitalNotary, Document, Protocol, Tag};

const SEALING_KEY_RECORD: &str = "sealing.key";
const ACCOUNT_RECORD: &str = "account";

#[derive(Parser)]
#[command(name = "notary", version = "0.1", about = "Digital notary CLI")]
struct Cli {
    /// Directory holding the notary's records
    #[arg(long, env = "NOTARY_DIR", default_value = ".notary")]
    directory: PathBuf,

    /// Prefix for this notary's record names
    #[arg(long, env = "NOTARY_NAME", default_value = "notary")]
    name: String,

    /// Protocol version to sign and cite under
    #[arg(long, env = "NOTARY_PROTOCOL", default_value_t = Protocol::CURRENT)]
    protocol: Protocol,

    #[arg(long, env = "NOTARY_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Write the log file as JSON lines
    #[arg(long, env = "NOTARY_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the first key pair and its self-signed certificate
    GenerateKey,

    /// Rotate the key pair; the old key endorses the new certificate
    RefreshKey,

    /// Erase all key material and the current citation
    ForgetKey,

    /// Print the citation to the current certificate
    Citation,

    /// Issue a signed, timestamped credential
    Credential {
        /// Verifier-supplied challenge to bind into the credential
        #[arg(short, long)]
        salt: Option<String>,
    },

    /// Sign a draft document (JSON) under the current certificate
    Notarize {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print a citation to a document (JSON)
    Cite {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Check a citation URI against a document
    VerifyCitation {
        #[arg(short, long)]
        citation: String,

        #[arg(short, long)]
        file: PathBuf,
    },

    /// Check a contract's signature against a certificate
    VerifySignature {
        #[arg(long)]
        contract: PathBuf,

        /// Certificate document, or the contract that wraps one
        #[arg(long)]
        certificate: PathBuf,
    },

    /// List the protocol versions this notary can verify
    Protocols,
}

fn main() {
    let cli = Cli::parse();

    // Keep the guard alive so the file layer flushes on exit.
    let _guard = match init_logging(&cli.log_dir.to_string_lossy(), cli.json_logs) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Logging disabled: {e}");
            None
        }
    };

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = NotaryConfig {
        directory: cli.directory,
        name: cli.name,
        protocol: cli.protocol,
        log_dir: cli.log_dir,
        json_logs: cli.json_logs,
    };

    let backend: Arc<dyn VaultBackend> = Arc::new(
        FileVaultBackend::open(&config.directory)
            .with_context(|| format!("Failed to open notary directory {}", config.directory.display()))?,
    );
    let sealing_key = load_or_create_sealing_key(backend.as_ref())?;
    let account = load_or_create_account(backend.as_ref())?;
    let notary = DigitalNotary::open(&config, backend, sealing_key, account).context("Failed to open notary")?;

    match cli.command {
        Commands::GenerateKey => print_json(&notary.generate_key()?),
        Commands::RefreshKey => print_json(&notary.refresh_key()?),
        Commands::ForgetKey => {
            notary.forget_key()?;
            print_json(&json!({ "forgotten": true }))
        }
        Commands::Citation => {
            let citation = notary.citation()?;
            print_json(&json!({
                "citation": citation,
                "uri": citation.to_uri(ChainKind::Certificate),
            }))
        }
        Commands::Credential { salt } => print_json(&notary.generate_credential(salt.as_deref())?),
        Commands::Notarize { file } => {
            let draft = read_document(&file)?;
            print_json(&notary.notarize_document(draft)?)
        }
        Commands::Cite { file } => {
            let document = read_document(&file)?;
            let citation = notary.cite_document(&document)?;
            print_json(&json!({
                "citation": citation,
                "uri": citation.to_uri(ChainKind::of(&document)),
            }))
        }
        Commands::VerifyCitation { citation, file } => {
            let (_, citation) = Citation::from_uri(&citation).context("Invalid citation URI")?;
            let document = read_document(&file)?;
            let matches = notary.citation_matches(&citation, &document)?;
            print_json(&json!({ "matches": matches }))
        }
        Commands::VerifySignature { contract, certificate } => {
            let contract = Contract::parse(&read_text(&contract)?).context("Invalid contract")?;
            let certificate = read_certificate(&certificate)?;
            let matches = notary.signature_matches(&contract, &certificate)?;
            print_json(&json!({ "matches": matches }))
        }
        Commands::Protocols => print_json(&json!({
            "active": config.protocol,
            "verifiable": notary.protocols(),
        })),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_document(path: &Path) -> Result<Document> {
    Document::parse(&read_text(path)?).with_context(|| format!("Invalid document in {}", path.display()))
}

/// Accepts a bare certificate document or the contract returned by
/// `generate-key` / `refresh-key`.
fn read_certificate(path: &Path) -> Result<Certificate> {
    let text = read_text(path)?;
    let document = match Contract::parse(&text) {
        Ok(contract) => contract.document,
        Err(_) => Document::parse(&text).with_context(|| format!("Invalid certificate in {}", path.display()))?,
    };
    Certificate::from_document(&document).with_context(|| format!("{} does not hold a certificate", path.display()))
}

/// `NOTARY_SEALING_KEY` (hex) wins; otherwise the key stored beside the
/// records, created on first use.
fn load_or_create_sealing_key(backend: &dyn VaultBackend) -> Result<SealingKey> {
    if let Ok(hex_key) = std::env::var("NOTARY_SEALING_KEY") {
        return SealingKey::from_hex(&hex_key).context("NOTARY_SEALING_KEY is not a valid sealing key");
    }
    match backend.load_record(SEALING_KEY_RECORD)? {
        Some(bytes) => {
            let text = String::from_utf8(bytes).context("Sealing key record is not text")?;
            SealingKey::from_hex(&text).context("Sealing key record is corrupt")
        }
        None => {
            let key = SealingKey::generate();
            backend.store_record(SEALING_KEY_RECORD, key.to_hex().as_bytes())?;
            tracing::info!("generated a new sealing key");
            Ok(key)
        }
    }
}

fn load_or_create_account(backend: &dyn VaultBackend) -> Result<Tag> {
    match backend.load_record(ACCOUNT_RECORD)? {
        Some(bytes) => {
            let text = String::from_utf8(bytes).context("Account record is not text")?;
            text.trim().parse::<Tag>().context("Account record is corrupt")
        }
        None => {
            let account = Tag::generate();
            backend.store_record(ACCOUNT_RECORD, account.as_str().as_bytes())?;
            tracing::info!(account = %account, "created a new account");
            Ok(account)
        }
    }
}

// cargo run -p notary-cli -- generate-key
// cargo run -p notary-cli -- notarize --file draft.json > contract.json
// cargo run -p notary-cli -- verify-signature --contract contract.json --certificate certificate.json
