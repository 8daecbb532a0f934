//! Verification pipeline: structure and signatures, never decryption.
//!
//! The seller signature covers the protect-time envelope only. Addenda are
//! outside that coverage and are each authenticated by their own share
//! record signature, so the report carries the two layers separately.

use crate::directory::PublicKeyDirectory;
use crate::envelope::Envelope;
use crate::error::CoreError;
use crate::identity::verify_signature;

/// One failed aspect of an envelope. Messages stay wire-safe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckFailure {
    Malformed(&'static str),
    SellerSignature,
    BuyerSignature,
    /// Addendum at this index has no verifying share record signature.
    Addendum(usize),
}

/// Per-addendum verification outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddendumCheck {
    pub index: usize,
    pub sharer: String,
    pub record_sig_valid: bool,
    pub has_wrap: bool,
}

/// Structured verification report.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub envelope_well_formed: bool,
    pub seller_sig_valid: bool,
    /// `None` when no buyer signature is present
    pub buyer_sig_valid: Option<bool>,
    pub addenda: Vec<AddendumCheck>,
    pub failures: Vec<CheckFailure>,
}

impl CheckReport {
    /// True when every verifiable aspect verified.
    pub fn all_valid(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Check an envelope against the directory. Pure; no side effects.
pub fn check(envelope: &Envelope, directory: &dyn PublicKeyDirectory) -> CheckReport {
    let mut report = CheckReport::default();

    match envelope.validate() {
        Ok(()) => report.envelope_well_formed = true,
        Err(CoreError::Malformed(detail)) => {
            report.failures.push(CheckFailure::Malformed(detail));
            return report;
        }
        Err(_) => {
            report.failures.push(CheckFailure::Malformed("envelope"));
            return report;
        }
    }

    let signing_input = match envelope.signing_input() {
        Ok(bytes) => bytes,
        Err(_) => {
            report.envelope_well_formed = false;
            report.failures.push(CheckFailure::Malformed("signing input"));
            return report;
        }
    };

    report.seller_sig_valid = verify_party_sig(
        directory,
        &envelope.seller,
        &signing_input,
        &envelope.seller_sig,
    );
    if !report.seller_sig_valid {
        report.failures.push(CheckFailure::SellerSignature);
    }

    if let Some(buyer_sig) = &envelope.buyer_sig {
        let valid = verify_party_sig(directory, &envelope.buyer, &signing_input, buyer_sig);
        report.buyer_sig_valid = Some(valid);
        if !valid {
            report.failures.push(CheckFailure::BuyerSignature);
        }
    }

    for (index, addendum) in envelope.addenda.iter().enumerate() {
        let record = &addendum.share_record;
        let record_sig_valid = verify_record_sig(directory, record);
        if !record_sig_valid {
            report.failures.push(CheckFailure::Addendum(index));
        }
        report.addenda.push(AddendumCheck {
            index,
            sharer: record.sharer.clone(),
            record_sig_valid,
            has_wrap: addendum.wrap.is_some(),
        });
    }

    report
}

fn verify_party_sig(
    directory: &dyn PublicKeyDirectory,
    name: &str,
    message: &[u8],
    sig_b64: &str,
) -> bool {
    let Some(publics) = directory.publics(name) else {
        return false;
    };
    let Ok(sig) = crate::canonical::b64_array::<64>(sig_b64) else {
        return false;
    };
    verify_signature(&publics.signing, message, &sig).is_ok()
}

/// Verify one share record signature against the sharer's directory key.
pub fn verify_record_sig(
    directory: &dyn PublicKeyDirectory,
    record: &crate::envelope::ShareRecord,
) -> bool {
    let Some(publics) = directory.publics(&record.sharer) else {
        return false;
    };
    let (Ok(digest), Ok(sig)) = (record.signing_digest(), record.sig_bytes()) else {
        return false;
    };
    verify_signature(&publics.signing, &digest, &sig).is_ok()
}
