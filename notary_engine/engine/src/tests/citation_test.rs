use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::document::{ChainKind, Citation, Document, PRIVATE, PUBLIC, Parameters};
use crate::error::NotaryError;
use crate::protocol::Protocol;
use crate::tests::{memory_notary, notary_with};
use crate::types::{Tag, Version};
use crate::vault::MemoryVaultBackend;

fn invoice() -> Document {
    Document::draft("invoice", PUBLIC, json!({ "consumer": "Derk Norton", "amount": 4.95 })).unwrap()
}

#[test]
fn test_cite_document_names_the_document() {
    let (notary, _, _) = memory_notary();
    let document = invoice();
    let citation = notary.cite_document(&document).unwrap();

    assert!(citation.names(&document));
    assert_eq!(citation.version, Version::FIRST);
    assert_eq!(citation.algorithm, "sha512");
    assert_eq!(citation.digest.len(), 64);
    assert!(notary.citation_matches(&citation, &document).unwrap());

    // Citing is deterministic for the same document.
    assert_eq!(notary.cite_document(&document).unwrap(), citation);
}

#[test]
fn test_citation_does_not_match_other_documents() {
    let (notary, _, _) = memory_notary();
    let document = invoice();
    let citation = notary.cite_document(&document).unwrap();

    let mut altered = document.clone();
    altered.content.insert("amount".into(), json!(5.95));
    assert!(!notary.citation_matches(&citation, &altered).unwrap());

    let mut tampered = citation.clone();
    tampered.digest[0] ^= 0xff;
    assert!(!notary.citation_matches(&tampered, &document).unwrap());
}

#[test]
fn test_older_protocol_citation_verifies_under_current_notary() {
    let (v1_notary, _) = notary_with(Protocol::V1, Arc::new(MemoryVaultBackend::new()), Tag::generate());
    let (v2_notary, _, _) = memory_notary();
    let document = invoice();

    let citation = v1_notary.cite_document(&document).unwrap();
    assert_eq!(citation.algorithm, "blake3");
    assert_eq!(citation.digest.len(), 32);
    assert!(v2_notary.citation_matches(&citation, &document).unwrap());

    let mut altered = document.clone();
    altered.content.insert("consumer".into(), json!("Someone Else"));
    assert!(!v2_notary.citation_matches(&citation, &altered).unwrap());
}

#[test]
fn test_unknown_digest_algorithm_is_protocol_mismatch() {
    let (notary, _, _) = memory_notary();
    let document = invoice();
    let mut citation = notary.cite_document(&document).unwrap();
    citation.algorithm = "md5".into();

    let err = notary.citation_matches(&citation, &document).unwrap_err();
    assert!(matches!(err.root(), NotaryError::ProtocolMismatch(_)));
}

#[test]
fn test_citation_uri_round_trip() {
    let (notary, _, _) = memory_notary();
    let document = invoice();
    let citation = notary.cite_document(&document).unwrap();

    let uri = citation.to_uri(ChainKind::of(&document));
    assert!(uri.starts_with(&format!("notary:/document/{}:v1?sha512=", document.tag())));

    let (kind, parsed) = Citation::from_uri(&uri).unwrap();
    assert_eq!(kind, ChainKind::Document);
    assert_eq!(parsed, citation);
}

#[test]
fn test_malformed_citation_uris_are_rejected() {
    let tag = Tag::generate();
    let digest = crate::types::b64::encode(&[1u8; 32]);
    let uris = [
        format!("http:/document/{tag}:v1?sha512={digest}"),
        format!("notary:/document/{tag}:v1"),
        format!("notary:/document/{tag}?sha512={digest}"),
        format!("notary:/document/{tag}:v0?sha512={digest}"),
        format!("notary:/document/{tag}:1?sha512={digest}"),
        format!("notary:/ledger/{tag}:v1?sha512={digest}"),
        format!("notary:/document/NOT-A-TAG:v1?sha512={digest}"),
        format!("notary:/document/{tag}:v1?sha512="),
        format!("notary:/document/{tag}:v1?sha512=!!!"),
        format!("notary:/document/{tag}:v1?sha-512={digest}"),
    ];
    for uri in &uris {
        let err = Citation::from_uri(uri).unwrap_err();
        assert!(matches!(err, NotaryError::Malformed { .. }), "{uri} gave {err}");
    }
}

#[test]
fn test_citation_json_round_trip_and_strictness() {
    let citation = Citation::new(Tag::generate(), Version::new(3).unwrap(), "sha512", vec![9u8; 64]);
    let text = serde_json::to_string(&citation).unwrap();
    assert_eq!(Citation::parse(&text).unwrap(), citation);

    let mut value: Value = serde_json::from_str(&text).unwrap();
    value["extra"] = json!(true);
    assert!(matches!(
        Citation::parse(&value.to_string()),
        Err(NotaryError::Malformed { .. })
    ));
    assert!(Citation::parse("{\"tag\": 1}").is_err());
}

#[test]
fn test_parameters_enforce_version_chaining() {
    let tag = Tag::generate();
    let other = Tag::generate();
    let v1 = Citation::new(tag.clone(), Version::FIRST, "sha512", vec![0u8; 64]);
    let v2 = Version::new(2).unwrap();

    assert!(Parameters::new("memo", tag.clone(), Version::FIRST, PRIVATE, None).is_ok());
    assert!(Parameters::new("memo", tag.clone(), v2, PRIVATE, Some(v1.clone())).is_ok());

    let failures = [
        Parameters::new("memo", tag.clone(), Version::FIRST, PRIVATE, Some(v1.clone())),
        Parameters::new("memo", tag.clone(), v2, PRIVATE, None),
        Parameters::new("memo", other.clone(), v2, PRIVATE, Some(v1.clone())),
        Parameters::new("memo", tag.clone(), Version::new(3).unwrap(), PRIVATE, Some(v1.clone())),
        Parameters::new("  ", tag.clone(), Version::FIRST, PRIVATE, None),
    ];
    for failure in failures {
        assert!(matches!(failure, Err(NotaryError::Precondition(_))));
    }
}

#[test]
fn test_document_successor_chains_to_citation() {
    let (notary, _, _) = memory_notary();
    let first = invoice();
    let citation = notary.cite_document(&first).unwrap();

    let mut content = Map::new();
    content.insert("consumer".into(), json!("Derk Norton"));
    content.insert("amount".into(), json!(3.95));
    let second = first.successor(&citation, content.clone()).unwrap();
    assert_eq!(second.tag(), first.tag());
    assert_eq!(second.version(), Version::new(2).unwrap());
    assert_eq!(second.parameters.previous.as_ref(), Some(&citation));

    // A citation to some other document cannot be chained.
    let unrelated = notary.cite_document(&invoice()).unwrap();
    assert!(matches!(
        first.successor(&unrelated, content),
        Err(NotaryError::Precondition(_))
    ));
}

#[test]
fn test_document_parse_rejects_bad_input() {
    let document = invoice();
    let text = serde_json::to_string(&document).unwrap();
    assert_eq!(Document::parse(&text).unwrap(), document);

    match Document::parse("{not json") {
        Err(NotaryError::Malformed { source_text, .. }) => assert_eq!(source_text, "{not json"),
        other => panic!("expected malformed, got {other:?}"),
    }

    let mut value: Value = serde_json::from_str(&text).unwrap();
    value["parameters"]["version"] = json!(2);
    assert!(matches!(
        Document::parse(&value.to_string()),
        Err(NotaryError::Malformed { .. })
    ));
    assert!(matches!(
        Document::draft("memo", PRIVATE, json!(["not", "an", "object"])),
        Err(NotaryError::Precondition(_))
    ));
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn citation_matches_only_its_document(note in ".{0,64}", amount in 0u32..1_000_000) {
            let (notary, _, _) = memory_notary();
            let document = Document::draft("memo", PRIVATE, json!({ "note": note, "amount": amount })).unwrap();
            let citation = notary.cite_document(&document).unwrap();
            prop_assert!(notary.citation_matches(&citation, &document).unwrap());

            let mut altered = document.clone();
            altered.content.insert("amount".into(), json!(amount as u64 + 1));
            prop_assert!(!notary.citation_matches(&citation, &altered).unwrap());
        }

        #[test]
        fn citation_uri_preserves_every_field(
            version in 1u32..10_000,
            digest in prop::collection::vec(any::<u8>(), 1..80),
        ) {
            let citation = Citation::new(Tag::generate(), Version::new(version).unwrap(), "blake3", digest);
            for kind in [ChainKind::Certificate, ChainKind::Credential, ChainKind::Document] {
                let (parsed_kind, parsed) = Citation::from_uri(&citation.to_uri(kind)).unwrap();
                prop_assert_eq!(parsed_kind, kind);
                prop_assert_eq!(&parsed, &citation);
            }
        }
    }
}
