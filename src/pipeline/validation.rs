//! Claim validation. The only source of `MalformedInput` besides a collector
//! set that reports one category twice.

use crate::error::PipelineError;
use crate::signals::Claim;

pub const MAX_SUBJECT_ID_LEN: usize = 128;
pub const MAX_EVENT_NAME_LEN: usize = 256;
pub const MAX_ONCHAIN_REF_LEN: usize = 256;
pub const MAX_DOCUMENTS: usize = 32;
pub const MIN_BLOB_ID_LEN: usize = 10;
pub const MAX_BLOB_ID_LEN: usize = 256;
const MAX_REPO_PART_LEN: usize = 100;

fn malformed(msg: impl Into<String>) -> PipelineError {
    PipelineError::MalformedInput(msg.into())
}

fn is_subject_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
}

fn is_repo_part(part: &str) -> bool {
    !part.is_empty()
        && part.len() <= MAX_REPO_PART_LEN
        && part != "."
        && part != ".."
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn is_blob_id(id: &str) -> bool {
    (MIN_BLOB_ID_LEN..=MAX_BLOB_ID_LEN).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}

pub fn validate_claim(claim: &Claim) -> Result<(), PipelineError> {
    let subject = claim.subject_id.as_str();
    if subject.is_empty() {
        return Err(malformed("subject_id is empty"));
    }
    if subject.len() > MAX_SUBJECT_ID_LEN {
        return Err(malformed(format!(
            "subject_id longer than {} characters",
            MAX_SUBJECT_ID_LEN
        )));
    }
    if !subject.chars().all(is_subject_char) {
        return Err(malformed("subject_id contains invalid characters"));
    }

    if let Some(repo_ref) = &claim.repo_ref {
        let valid = matches!(
            repo_ref.split('/').collect::<Vec<_>>().as_slice(),
            [owner, name] if is_repo_part(owner) && is_repo_part(name)
        );
        if !valid {
            return Err(malformed(format!(
                "repo_ref {:?} is not of the form owner/name",
                repo_ref
            )));
        }
    }

    if let Some(event_name) = &claim.event_name
        && event_name.chars().count() > MAX_EVENT_NAME_LEN
    {
        return Err(malformed(format!(
            "event_name longer than {} characters",
            MAX_EVENT_NAME_LEN
        )));
    }

    if claim.document_blob_ids.len() > MAX_DOCUMENTS {
        return Err(malformed(format!(
            "more than {} document blob ids",
            MAX_DOCUMENTS
        )));
    }
    if let Some(bad) = claim.document_blob_ids.iter().find(|id| !is_blob_id(id)) {
        return Err(malformed(format!("invalid document blob id {:?}", bad)));
    }

    if let Some(onchain_ref) = &claim.onchain_ref
        && onchain_ref.chars().count() > MAX_ONCHAIN_REF_LEN
    {
        return Err(malformed(format!(
            "onchain_ref longer than {} characters",
            MAX_ONCHAIN_REF_LEN
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_malformed(claim: &Claim) {
        assert!(matches!(
            validate_claim(claim),
            Err(PipelineError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_valid_claim() {
        let claim = Claim::new("startup:acme-42")
            .with_repo("acme/core.rs", "token")
            .with_event("ETHGlobal Lisbon")
            .with_documents(["Zx81_blob-0001"])
            .with_onchain("0xabc");
        assert!(validate_claim(&claim).is_ok());
        assert!(validate_claim(&Claim::new("s")).is_ok());
    }

    #[test]
    fn test_subject_id_rules() {
        assert_malformed(&Claim::new(""));
        assert_malformed(&Claim::new("has space"));
        assert_malformed(&Claim::new("a/b"));
        assert_malformed(&Claim::new("x".repeat(129)));
        assert!(validate_claim(&Claim::new("x".repeat(128))).is_ok());
    }

    #[test]
    fn test_repo_ref_rules() {
        for bad in ["acme", "acme/", "/core", "a/b/c", "acme/co re", "../core"] {
            assert_malformed(&Claim::new("s").with_repo(bad, "t"));
        }
    }

    #[test]
    fn test_event_and_onchain_length() {
        assert_malformed(&Claim::new("s").with_event("e".repeat(257)));
        assert!(validate_claim(&Claim::new("s").with_event("e".repeat(256))).is_ok());
        assert_malformed(&Claim::new("s").with_onchain("o".repeat(257)));
    }

    #[test]
    fn test_blob_id_rules() {
        assert_malformed(&Claim::new("s").with_documents(["short"]));
        assert_malformed(&Claim::new("s").with_documents(["has/slash/0001"]));
        let many: Vec<String> = (0..33).map(|i| format!("blob-id-{:04}", i)).collect();
        assert_malformed(&Claim::new("s").with_documents(many));
        let ok: Vec<String> = (0..32).map(|i| format!("blob-id-{:04}", i)).collect();
        assert!(validate_claim(&Claim::new("s").with_documents(ok)).is_ok());
    }
}
