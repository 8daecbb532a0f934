//! Command implementations over the file-backed collaborators.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use cop_core::audit::audit_transaction;
use cop_core::file_directory::{FileDirectory, FileGroups};
use cop_core::file_store::FileStore;
use cop_core::sharing::DisclosureService;
use cop_core::store::TransactionStore;
use cop_crypto::check::check;
use cop_crypto::directory::PartyPublics;
use cop_crypto::envelope::Envelope;
use cop_crypto::keystore::FileKeyStore;
use cop_crypto::protect::{protect_with_store, ProtectRequest};
use cop_crypto::share::buyer_sign_with_store;
use cop_crypto::unprotect::unprotect_with_store;
use cop_crypto::CoreError;

use crate::config::CliConfig;

/// Create an identity and publish its public keys to the directory file.
pub async fn keygen(config: &CliConfig, name: &str) -> anyhow::Result<()> {
    let keystore = FileKeyStore::open(&config.keys_dir)?;
    let identity = keystore.generate(name)?;

    let mut directory = FileDirectory::load(&config.directory_path)?;
    directory.publish(
        name,
        PartyPublics {
            signing: identity.signing_public(),
            enc: identity.enc_public(),
        },
    )?;

    info!(party = name, "generated and published identity");
    println!("created identity for {name}");
    println!("  signing public: {}", hex::encode(identity.signing_public()));
    println!("  encryption public: {}", hex::encode(identity.enc_public()));
    Ok(())
}

/// Protect a transaction file and register the envelope with the store.
pub async fn protect_cmd(
    config: &CliConfig,
    input: &Path,
    output: &Path,
    seller: &str,
    buyer: &str,
    recipients: &[String],
    groups: &[String],
) -> anyhow::Result<()> {
    let content = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading transaction {}", input.display()))?;

    let keystore = FileKeyStore::open(&config.keys_dir)?;
    let directory = FileDirectory::load(&config.directory_path)?;
    let group_table = FileGroups::load(&config.groups_path)?;

    let envelope = protect_with_store(
        &ProtectRequest {
            content: &content,
            seller,
            buyer,
            recipients,
            groups,
        },
        &keystore,
        &directory,
        &group_table,
    )?;

    let bytes = envelope.to_canonical_vec()?;
    tokio::fs::write(output, &bytes)
        .await
        .with_context(|| format!("writing envelope {}", output.display()))?;

    let store = FileStore::open(&config.store_path).await?;
    store.put_envelope(envelope.clone()).await?;

    println!("protected transaction {}", envelope.tx_id);
    Ok(())
}

/// Print the check report. Malformed or invalid envelopes come back as
/// errors so the exit code reflects them.
pub async fn check_cmd(config: &CliConfig, envelope_path: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(envelope_path)
        .await
        .with_context(|| format!("reading envelope {}", envelope_path.display()))?;
    let envelope = Envelope::parse(&bytes)?;
    let directory = FileDirectory::load(&config.directory_path)?;

    let report = check(&envelope, &directory);
    println!("envelope well-formed: {}", report.envelope_well_formed);
    println!("seller signature:    {}", verdict(Some(report.seller_sig_valid)));
    println!("buyer signature:     {}", verdict(report.buyer_sig_valid));
    for addendum in &report.addenda {
        println!(
            "addendum {} ({}): {}",
            addendum.index,
            addendum.sharer,
            verdict(Some(addendum.record_sig_valid))
        );
    }

    if !report.envelope_well_formed {
        anyhow::bail!(CoreError::Malformed("envelope failed structural checks"));
    }
    if !report.all_valid() {
        anyhow::bail!(CoreError::SignatureInvalid);
    }
    Ok(())
}

fn verdict(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "valid",
        Some(false) => "INVALID",
        None => "absent",
    }
}

/// Recover the transaction content as the named recipient.
pub async fn unprotect_cmd(
    config: &CliConfig,
    envelope_path: &Path,
    output: &Path,
    recipient: &str,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(envelope_path)
        .await
        .with_context(|| format!("reading envelope {}", envelope_path.display()))?;
    let envelope = Envelope::parse(&bytes)?;

    let keystore = FileKeyStore::open(&config.keys_dir)?;
    let directory = FileDirectory::load(&config.directory_path)?;

    let content = unprotect_with_store(&envelope, recipient, &keystore, &directory)?;
    tokio::fs::write(output, &content)
        .await
        .with_context(|| format!("writing content {}", output.display()))?;

    println!("recovered {} bytes from {}", content.len(), envelope.tx_id);
    Ok(())
}

/// Attach the buyer signature to an envelope file in place.
pub async fn buyer_sign_cmd(
    config: &CliConfig,
    envelope_path: &Path,
    buyer: &str,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(envelope_path)
        .await
        .with_context(|| format!("reading envelope {}", envelope_path.display()))?;
    let mut envelope = Envelope::parse(&bytes)?;

    let keystore = FileKeyStore::open(&config.keys_dir)?;
    buyer_sign_with_store(&mut envelope, buyer, &keystore)?;

    tokio::fs::write(envelope_path, envelope.to_canonical_vec()?)
        .await
        .with_context(|| format!("writing envelope {}", envelope_path.display()))?;

    println!("buyer signature attached to {}", envelope.tx_id);
    Ok(())
}

/// Disclose a stored transaction to a party or a group.
pub async fn share_cmd(
    config: &CliConfig,
    tx_id: &str,
    sharer: &str,
    to: Option<&str>,
    group: Option<&str>,
) -> anyhow::Result<()> {
    let keystore = FileKeyStore::open(&config.keys_dir)?;
    let sharer_keys = keystore.load(sharer)?;
    let directory = FileDirectory::load(&config.directory_path)?;

    let store = FileStore::open(&config.store_path).await?;
    let service = DisclosureService::new(&store);

    let record = match (to, group) {
        (Some(to), None) => {
            service
                .share_direct(tx_id, sharer, &sharer_keys, to, &directory)
                .await?
        }
        (None, Some(group_id)) => {
            let group_table = FileGroups::load(&config.groups_path)?;
            service
                .share_group(tx_id, sharer, &sharer_keys, group_id, &directory, &group_table)
                .await?
        }
        _ => anyhow::bail!(CoreError::Malformed("share needs exactly one target")),
    };

    println!(
        "disclosed {} to {} at {}",
        tx_id, record.disclosed_to, record.timestamp
    );
    Ok(())
}

/// Verify the disclosure trail of a stored transaction.
pub async fn audit_cmd(config: &CliConfig, tx_id: &str) -> anyhow::Result<()> {
    let directory = FileDirectory::load(&config.directory_path)?;
    let store = FileStore::open(&config.store_path).await?;

    let report = audit_transaction(&store, &directory, tx_id).await?;
    println!(
        "{} disclosures, {} records",
        report.edges.len(),
        report.record_count
    );
    for edge in &report.edges {
        println!(
            "  {} -> {} ({:?}, {})",
            edge.sharer, edge.disclosed_to, edge.kind, edge.timestamp
        );
    }
    for failure in &report.failures {
        println!("  FAILURE: {failure:?}");
    }

    if !report.clean() {
        anyhow::bail!(CoreError::SignatureInvalid);
    }
    Ok(())
}
