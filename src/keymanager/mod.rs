//! Owns TLS credentials and the Uptane signing key (spec section 4.9).
//! Sources are tagged `File`/`Pkcs11`; rotation replaces credentials
//! atomically and is not broadcast — each subsequent HTTP request or sign
//! call simply picks up the new values under the lock.

pub mod bootstrap;

use std::fs;
use std::str::FromStr;
use std::sync::Mutex;

use serde_json::{self as json, Value};

use crypto;
use pem;
use datatype::{Error, Key, PrivateKey, Signature, SignatureType, Signed};
use http::tls::{self, TlsData};

/// Where a credential's bytes come from. `Pkcs11` is a typed stub: the
/// pack has no HSM library in its dependency stack, so it is wired to
/// fail fast rather than silently falling back to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    File,
    Pkcs11,
}

impl FromStr for KeySource {
    type Err = Error;

    fn from_str(s: &str) -> Result<KeySource, Error> {
        match s.to_lowercase().as_str() {
            "file"   => Ok(KeySource::File),
            "pkcs11" => Ok(KeySource::Pkcs11),
            other    => Err(Error::Config(format!("unknown key source: {}", other))),
        }
    }
}

struct Credentials {
    ca_pem:   Vec<u8>,
    cert_pem: Vec<u8>,
    pkey_pem: Vec<u8>,
    uptane_private: PrivateKey,
    uptane_public:  Key,
    uptane_sigtype: SignatureType,
}

pub struct KeyManager {
    source: KeySource,
    inner:  Mutex<Credentials>,
}

/// Read the Primary's own Uptane keypair off disk: a JSON-encoded public
/// `Key` and a PEM private key, matched by `key_id`.
pub fn load_uptane_keypair(public_path: &str, private_path: &str) -> Result<(Key, PrivateKey), Error> {
    let public: Key = json::from_slice(&fs::read(public_path)?)?;
    let pem_bytes = fs::read(private_path)?;
    let der = pem::parse(&pem_bytes).map_err(Error::from)?.contents;
    let keyid = public.key_id()?;
    Ok((public, PrivateKey { keyid: keyid, der_key: der }))
}

impl KeyManager {
    /// Load every credential from disk and install the initial TLS
    /// connector (spec section 4.9). `Pkcs11` is not implemented.
    pub fn from_files(source: KeySource,
                      ca_path: &str, cert_path: &str, pkey_path: &str,
                      uptane_private: PrivateKey, uptane_public: Key, uptane_sigtype: SignatureType)
                      -> Result<KeyManager, Error> {
        if source != KeySource::File {
            return Err(Error::Config("pkcs11 key source is not implemented".into()));
        }

        let creds = Credentials {
            ca_pem:   fs::read(ca_path)?,
            cert_pem: fs::read(cert_path)?,
            pkey_pem: fs::read(pkey_path)?,
            uptane_private: uptane_private,
            uptane_public:  uptane_public,
            uptane_sigtype: uptane_sigtype,
        };

        tls::init_tls_client(Some(TlsData {
            ca_pem:   Some(&creds.ca_pem),
            cert_pem: Some(&creds.cert_pem),
            pkey_pem: Some(&creds.pkey_pem),
        }));

        Ok(KeyManager { source: source, inner: Mutex::new(creds) })
    }

    /// Replace every TLS credential and re-install the connector
    /// (spec section 4.9 "rotation replaces credentials atomically").
    pub fn rotate_tls(&self, ca_pem: Vec<u8>, cert_pem: Vec<u8>, pkey_pem: Vec<u8>) {
        let mut creds = self.inner.lock().expect("keymanager lock");
        creds.ca_pem = ca_pem;
        creds.cert_pem = cert_pem;
        creds.pkey_pem = pkey_pem;
        tls::init_tls_client(Some(TlsData {
            ca_pem:   Some(&creds.ca_pem),
            cert_pem: Some(&creds.cert_pem),
            pkey_pem: Some(&creds.pkey_pem),
        }));
    }

    pub fn rotate_uptane_key(&self, private: PrivateKey, public: Key, sigtype: SignatureType) {
        let mut creds = self.inner.lock().expect("keymanager lock");
        creds.uptane_private = private;
        creds.uptane_public = public;
        creds.uptane_sigtype = sigtype;
    }

    pub fn uptane_public_key(&self) -> Key {
        self.inner.lock().expect("keymanager lock").uptane_public.clone()
    }

    /// Sign a message with the current Uptane private key.
    pub fn sign(&self, msg: &[u8]) -> Result<Signature, Error> {
        let creds = self.inner.lock().expect("keymanager lock");
        let sig = crypto::sign_msg(creds.uptane_sigtype, msg, &creds.uptane_private.der_key)?;
        Ok(Signature { keyid: creds.uptane_private.keyid.clone(), method: creds.uptane_sigtype, sig: ::base64::encode(&sig) })
    }

    /// Canonicalize and sign an arbitrary JSON body with the current
    /// Uptane key, producing a wire-ready envelope (spec section 6). Used
    /// by the orchestrator to sign the outgoing Manifest.
    pub fn sign_json(&self, body: Value) -> Result<Signed, Error> {
        let creds = self.inner.lock().expect("keymanager lock");
        let canonical = crypto::canonicalize_json(&json::to_vec(&body)?)?;
        let sig = crypto::sign_msg(creds.uptane_sigtype, &canonical, &creds.uptane_private.der_key)?;
        Ok(Signed {
            signed: body,
            signatures: vec![Signature {
                keyid:  creds.uptane_private.keyid.clone(),
                method: creds.uptane_sigtype,
                sig:    ::base64::encode(&sig),
            }],
        })
    }

    pub fn source(&self) -> &KeySource { &self.source }
}
