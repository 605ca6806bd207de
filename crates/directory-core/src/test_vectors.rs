//! Test vectors for cross-language validation
//!
//! Other implementations of the directory protocol must reproduce these
//! canonical encodings byte for byte.

use crate::canonical::{canonical_bytes, canonical_string};
use crate::crypto::{derive_address, IdentityKeys};
use crate::types::*;
use k256::ecdsa::SigningKey;
use k256::pkcs8::{EncodePrivateKey, LineEnding};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Test vector output format (JSON serializable)
#[derive(Serialize)]
pub struct TestVector {
    pub name: String,
    pub description: String,
    pub inputs: serde_json::Value,
    pub canonical: String,
    pub digest_hex: String,
}

/// Generate all test vectors
pub fn generate_test_vectors() -> Vec<TestVector> {
    vec![record_data_vector(), graph_vector(), address_vector()]
}

fn fixed_identity() -> IdentityKeys {
    let signing_key = SigningKey::from_slice(&[0x11; 32]).unwrap();
    let pem = signing_key.to_pkcs8_pem(LineEnding::LF).unwrap();
    IdentityKeys::from_pem(&pem).unwrap()
}

fn fixed_data() -> RecordData {
    RecordData {
        version_id: "00000000-0000-4000-8000-000000000001".into(),
        address: "abc".into(),
        neighbors: ["x", "y"].into_iter().map(Address::from).collect(),
    }
}

fn record_data_vector() -> TestVector {
    let data = fixed_data();
    let bytes = canonical_bytes(&data).unwrap();

    TestVector {
        name: "record_data_canonical".into(),
        description: "canonical_bytes({uuid, address, neighbors}); keys sorted, neighbors as listed".into(),
        inputs: serde_json::json!({
            "uuid": data.version_id.to_string(),
            "address": "abc",
            "neighbors": ["x", "y"],
        }),
        canonical: canonical_string(&data).unwrap(),
        digest_hex: hex::encode(Sha256::digest(&bytes)),
    }
}

fn graph_vector() -> TestVector {
    let record = DirectoryRecord {
        data: fixed_data(),
        public_key: "PK".into(),
        signature: "00".into(),
    };
    let mut graph = BTreeMap::new();
    graph.insert(Address::from("abc"), record);

    let bytes = canonical_bytes(&graph).unwrap();

    TestVector {
        name: "graph_canonical".into(),
        description: "canonical_bytes(graph) as signed in a GraphSnapshot".into(),
        inputs: serde_json::json!({ "addresses": ["abc"] }),
        canonical: canonical_string(&graph).unwrap(),
        digest_hex: hex::encode(Sha256::digest(&bytes)),
    }
}

fn address_vector() -> TestVector {
    let identity = fixed_identity();

    TestVector {
        name: "address_derivation".into(),
        description: "Address = hex(SHA-256(SPKI-DER(public_key)))".into(),
        inputs: serde_json::json!({
            "secret_key_hex": hex::encode([0x11; 32]),
            "spki_der_hex": hex::encode(identity.public_key_der()),
        }),
        canonical: identity.public_key_pem().to_string(),
        digest_hex: identity.address().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_vectors() {
        let vectors = generate_test_vectors();
        assert_eq!(vectors.len(), 3);

        // Print JSON for manual inspection / export
        let json = serde_json::to_string_pretty(&vectors).unwrap();
        println!("Test Vectors:\n{}", json);
    }

    #[test]
    fn test_record_data_canonical_form() {
        let v = record_data_vector();
        assert_eq!(
            v.canonical,
            r#"{"address":"abc","neighbors":["x","y"],"uuid":"00000000-0000-4000-8000-000000000001"}"#
        );
    }

    #[test]
    fn test_graph_canonical_form() {
        let v = graph_vector();
        assert_eq!(
            v.canonical,
            concat!(
                r#"{"abc":{"data":{"address":"abc","neighbors":["x","y"],"#,
                r#""uuid":"00000000-0000-4000-8000-000000000001"},"#,
                r#""publicKey":"PK","signature":"00"}}"#
            )
        );
    }

    #[test]
    fn test_address_matches_spki_digest() {
        let identity = fixed_identity();
        let v1 = address_vector();
        let v2 = address_vector();

        assert_eq!(v1.digest_hex, v2.digest_hex);
        assert_eq!(derive_address(identity.public_key_der()).0, v1.digest_hex);
        assert!(v1.canonical.starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn test_signatures_deterministic() {
        // RFC 6979 nonces: same key and message give the same signature
        let identity = fixed_identity();
        let bytes = canonical_bytes(&fixed_data()).unwrap();

        assert_eq!(identity.sign(&bytes), identity.sign(&bytes));
    }
}
