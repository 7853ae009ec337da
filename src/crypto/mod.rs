//! Canonicalization, key-id derivation and signature dispatch for the
//! Uptane metadata wire format (spec section 3, 6).

use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::{Rsa, Padding};
use openssl::sign::Verifier as OsslVerifier;
use openssl::hash::hash2;
use ring::rand::SystemRandom;
use ring::signature::Ed25519KeyPair;
use ring::signature::{self, RSAKeyPair, RSASigningState, RSA_PSS_SHA256};
use serde_json::{self as json, Value};
use std::collections::BTreeMap;
use std::os::raw::c_int;
use std::sync::Arc;
use untrusted::Input;

use datatype::{Error, Key};

const RSA_PKCS1_PSS_PADDING: c_int = 6;


/// Re-serialize arbitrary JSON bytes with object keys sorted and no
/// insignificant whitespace, the subset of OLPC canonical JSON that the
/// Uptane wire format relies on (spec section 6).
pub fn canonicalize_json(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let value: Value = json::from_slice(bytes)?;
    let canonical = canonicalize_value(&value);
    Ok(json::to_vec(&canonical)?)
}

fn canonicalize_value(value: &Value) -> Value {
    match *value {
        Value::Object(ref map) => {
            let sorted: BTreeMap<String, Value> = map.iter()
                .map(|(k, v)| (k.clone(), canonicalize_value(v)))
                .collect();
            let mut out = json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(ref items) => Value::Array(items.iter().map(canonicalize_value).collect()),
        other => other.clone(),
    }
}

/// Derive a key's id: the hex-encoded sha256 of its canonicalized
/// `(keytype, keyval)` representation. Never trust a key id read off the
/// wire; always re-derive it.
pub fn derive_key_id(key: &Key) -> Result<String, Error> {
    let bytes = json::to_vec(key)?;
    let canonical = canonicalize_json(&bytes)?;
    Ok(sha256_hex(&canonical))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = hash2(MessageDigest::sha256(), bytes).expect("sha256");
    hex::encode(&*digest)
}


use datatype::SignatureType;

pub fn sign_msg(sigtype: SignatureType, msg: &[u8], der_key: &[u8]) -> Result<Vec<u8>, Error> {
    match sigtype {
        SignatureType::Ed25519 => {
            let keypair = Ed25519KeyPair::from_pkcs8(Input::from(der_key))
                .map_err(|_| Error::KeySign("invalid ed25519 pkcs8 key".into()))?;
            Ok(keypair.sign(msg).as_ref().into())
        }

        SignatureType::RsaSsaPssSha256 => {
            let pair = RSAKeyPair::from_der(Input::from(der_key))
                .map_err(|_| Error::KeySign("invalid rsa der key".into()))?;
            let mut state = RSASigningState::new(Arc::new(pair))
                .map_err(|_| Error::KeySign("rsa signing state".into()))?;
            let mut sig = vec![0; state.key_pair().public_modulus_len()];
            state.sign(&RSA_PSS_SHA256, &SystemRandom::new(), msg, &mut sig)
                .map_err(|_| Error::KeySign("rsa-pss sign failed".into()))?;
            Ok(sig)
        }
    }
}

pub fn verify_msg(sigtype: SignatureType, msg: &[u8], der_key: &[u8], sig: &[u8]) -> bool {
    match sigtype {
        SignatureType::Ed25519 => {
            signature::verify(&signature::ED25519, Input::from(der_key), Input::from(msg), Input::from(sig)).is_ok()
        }

        SignatureType::RsaSsaPssSha256 => {
            let verify = || -> Result<bool, Error> {
                let pub_key = PKey::from_rsa(Rsa::public_key_from_der(der_key)?)?;
                let mut verifier = OsslVerifier::new(MessageDigest::sha256(), &pub_key)?;
                verifier.pkey_ctx_mut().set_rsa_padding(Padding::from_raw(RSA_PKCS1_PSS_PADDING))?;
                verifier.update(msg)?;
                Ok(verifier.finish(sig)?)
            };
            verify().unwrap_or_else(|err| { trace!("rsa-pss verification failed: {}", err); false })
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_object_keys_in_sorted_order() {
        let input = br#"{"b": 1, "a": 2, "c": {"z": 1, "y": 2}}"#;
        let canonical = canonicalize_json(input).unwrap();
        let text = String::from_utf8(canonical).unwrap();
        assert_eq!(text, r#"{"a":2,"b":1,"c":{"y":2,"z":1}}"#);
    }

    #[test]
    fn canonicalization_is_stable_across_field_order() {
        let a = canonicalize_json(br#"{"a":1,"b":2}"#).unwrap();
        let b = canonicalize_json(br#"{"b":2,"a":1}"#).unwrap();
        assert_eq!(a, b);
    }
}
