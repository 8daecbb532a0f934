use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use cop_core::file_directory::DirectoryFileError;
use cop_core::sharing::ShareError;
use cop_core::store::StoreError;
use cop_crypto::keystore::KeyStoreError;
use cop_crypto::CoreError;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "cop")]
#[command(about = "ChainOfProduct - protect, verify, and share transaction documents")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an identity and publish its public keys
    Keygen {
        /// Party name
        name: String,
    },
    /// Protect a transaction document
    Protect {
        /// Cleartext transaction file
        input: PathBuf,
        /// Envelope output file
        output: PathBuf,
        #[arg(long)]
        seller: String,
        #[arg(long, default_value = "")]
        buyer: String,
        /// Named recipient; repeatable
        #[arg(long = "to")]
        recipients: Vec<String>,
        /// Group id; repeatable
        #[arg(long = "group")]
        groups: Vec<String>,
    },
    /// Verify an envelope's structure and signatures
    Check {
        envelope: PathBuf,
    },
    /// Recover the transaction content as a recipient
    Unprotect {
        envelope: PathBuf,
        output: PathBuf,
        /// Recipient party name
        #[arg(long = "as")]
        recipient: String,
    },
    /// Attach the buyer signature to an envelope
    BuyerSign {
        envelope: PathBuf,
        /// Buyer party name
        #[arg(long = "as")]
        buyer: String,
    },
    /// Disclose a stored transaction to a party or group
    Share {
        tx_id: String,
        /// Disclosing party name
        #[arg(long = "as")]
        sharer: String,
        /// Recipient party name
        #[arg(long, conflicts_with = "group")]
        to: Option<String>,
        /// Group id
        #[arg(long)]
        group: Option<String>,
    },
    /// Verify the disclosure trail of a stored transaction
    Audit {
        tx_id: String,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "cop_cli={},cop_core={},cop_crypto={}",
            args.log_level, args.log_level, args.log_level
        ))
        .init();

    if let Err(err) = run(args).await {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = if let Some(config_path) = &args.config {
        config::CliConfig::load_from_file(config_path)?
    } else {
        config::CliConfig::load_from_env()
    };
    debug!(keys_dir = %config.keys_dir.display(), "loaded configuration");

    match &args.command {
        Command::Keygen { name } => commands::keygen(&config, name).await,
        Command::Protect {
            input,
            output,
            seller,
            buyer,
            recipients,
            groups,
        } => {
            commands::protect_cmd(&config, input, output, seller, buyer, recipients, groups).await
        }
        Command::Check { envelope } => commands::check_cmd(&config, envelope).await,
        Command::Unprotect {
            envelope,
            output,
            recipient,
        } => commands::unprotect_cmd(&config, envelope, output, recipient).await,
        Command::BuyerSign { envelope, buyer } => {
            commands::buyer_sign_cmd(&config, envelope, buyer).await
        }
        Command::Share {
            tx_id,
            sharer,
            to,
            group,
        } => commands::share_cmd(&config, tx_id, sharer, to.as_deref(), group.as_deref()).await,
        Command::Audit { tx_id } => commands::audit_cmd(&config, tx_id).await,
    }
}

/// Map failures onto the command surface exit codes: 2 input error,
/// 3 authorization denied, 4 cryptographic failure, 1 other.
fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CoreError>() {
            return match e {
                CoreError::NotARecipient | CoreError::WrongBuyer => 3,
                CoreError::AuthFailure
                | CoreError::SignatureInvalid
                | CoreError::RandomnessFailure => 4,
                CoreError::Malformed(_)
                | CoreError::UnknownParty(_)
                | CoreError::UnknownGroup(_) => 2,
                CoreError::KeyStore(e) => keystore_code(e),
            };
        }
        if let Some(e) = cause.downcast_ref::<KeyStoreError>() {
            return keystore_code(e);
        }
        if let Some(ShareError::BuyerNotSet) = cause.downcast_ref::<ShareError>() {
            return 3;
        }
        if let Some(e) = cause.downcast_ref::<StoreError>() {
            return match e {
                StoreError::NotFound(_) | StoreError::AlreadyExists(_) => 2,
                _ => 1,
            };
        }
        if cause.downcast_ref::<DirectoryFileError>().is_some()
            || cause.downcast_ref::<config::ConfigError>().is_some()
            || cause.downcast_ref::<std::io::Error>().is_some()
        {
            return 2;
        }
    }
    1
}

fn keystore_code(err: &KeyStoreError) -> i32 {
    match err {
        KeyStoreError::NotFound(_) | KeyStoreError::AlreadyExists(_) => 2,
        KeyStoreError::Integrity | KeyStoreError::Malformed => 4,
        KeyStoreError::Io(_) => 1,
    }
}
