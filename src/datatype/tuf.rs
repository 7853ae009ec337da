use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{Deserialize, Deserializer, Error as SerdeError};
use serde::ser::{Serialize, Serializer};
use serde_json as json;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use datatype::Error;


/// An opaque string uniquely identifying one ECU within the device.
#[derive(Serialize, Deserialize, Hash, Eq, PartialEq, Ord, PartialOrd, Debug, Clone)]
pub struct EcuSerial(pub String);

impl Display for EcuSerial {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'a> From<&'a str> for EcuSerial {
    fn from(s: &'a str) -> EcuSerial { EcuSerial(s.into()) }
}

/// An opaque string describing an ECU's hardware class.
#[derive(Serialize, Deserialize, Hash, Eq, PartialEq, Debug, Clone)]
pub struct HardwareIdentifier(pub String);

impl Display for HardwareIdentifier {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'a> From<&'a str> for HardwareIdentifier {
    fn from(s: &'a str) -> HardwareIdentifier { HardwareIdentifier(s.into()) }
}


/// Which of the two independent Uptane repositories a piece of metadata
/// came from. Director is per-device; Image is shared across the fleet.
#[derive(Serialize, Deserialize, Hash, Eq, PartialEq, Debug, Clone, Copy)]
pub enum RepositoryId {
    Director,
    Image,
}

impl Display for RepositoryId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            RepositoryId::Director => write!(f, "director"),
            RepositoryId::Image    => write!(f, "image"),
        }
    }
}


/// A TUF/Uptane signing role. `Delegated` carries the delegation's name and
/// is only meaningful on the Image repository (spec section 4.2).
#[derive(Hash, Eq, PartialEq, Debug, Clone)]
pub enum Role {
    Root,
    Timestamp,
    Snapshot,
    Targets,
    Delegated(String),
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root"      => Ok(Role::Root),
            "timestamp" => Ok(Role::Timestamp),
            "snapshot"  => Ok(Role::Snapshot),
            "targets"   => Ok(Role::Targets),
            other       => Ok(Role::Delegated(other.into())),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Role::Root           => write!(f, "root"),
            Role::Timestamp      => write!(f, "timestamp"),
            Role::Snapshot       => write!(f, "snapshot"),
            Role::Targets        => write!(f, "targets"),
            Role::Delegated(ref name) => write!(f, "{}", name),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Role, D::Error> {
        if let json::Value::String(ref s) = Deserialize::deserialize(de)? {
            s.parse().map_err(|err: Error| SerdeError::custom(format!("unknown role: {}", err)))
        } else {
            Err(SerdeError::custom("role field was not a string"))
        }
    }
}


/// A monotonically increasing non-negative role version (spec section 3).
pub type Version = u64;


/// The threshold of keys required to sign a role, and the set of keys that
/// may contribute toward it.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct RoleKeys {
    pub threshold: u64,
    pub keyids:    HashSet<String>,
}


/// A keytype recognized by the verifier.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
pub enum KeyType {
    #[serde(rename = "rsa2048")]
    Rsa2048,
    #[serde(rename = "rsa3072")]
    Rsa3072,
    #[serde(rename = "rsa4096")]
    Rsa4096,
    #[serde(rename = "ed25519")]
    Ed25519,
}

impl KeyType {
    pub fn is_rsa(&self) -> bool {
        match *self {
            KeyType::Ed25519 => false,
            _ => true,
        }
    }
}


#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct KeyValue {
    pub public: String,
}

/// A public key as declared inside a Root's key registry. The `KeyId` is
/// the hex-encoded sha256 of the canonicalized `(keytype, keyval)` pair and
/// is derived, never trusted from the wire (spec section 3, invariant
/// implicit in `add_key`).
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Key {
    pub keytype: KeyType,
    pub keyval:  KeyValue,
}

impl Key {
    pub fn key_id(&self) -> Result<String, Error> {
        ::crypto::derive_key_id(self)
    }
}

pub struct PrivateKey {
    pub keyid:   String,
    pub der_key: Vec<u8>,
}


/// An Ed25519 or RSA-PSS signature over canonicalized bytes.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Signature {
    pub keyid:  String,
    pub method: SignatureType,
    pub sig:    String,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum SignatureType {
    Ed25519,
    RsaSsaPssSha256,
}

impl Serialize for SignatureType {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(match *self {
            SignatureType::Ed25519         => "ed25519",
            SignatureType::RsaSsaPssSha256 => "rsassa-pss-sha256",
        })
    }
}

impl<'de> Deserialize<'de> for SignatureType {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        if let json::Value::String(ref s) = Deserialize::deserialize(de)? {
            s.parse().map_err(|err: Error| SerdeError::custom(format!("{}", err)))
        } else {
            Err(SerdeError::custom("signature method was not a string"))
        }
    }
}

impl FromStr for SignatureType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ed25519"           => Ok(SignatureType::Ed25519),
            "rsassa-pss-sha256" => Ok(SignatureType::RsaSsaPssSha256),
            _ => Err(Error::Parse(format!("unknown signature method: {}", s))),
        }
    }
}


/// The signature envelope every role file (and the manifest) is wrapped in.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Signed {
    pub signed:     json::Value,
    pub signatures: Vec<Signature>,
}

impl Signed {
    pub fn sign(signed: json::Value, privkey: &PrivateKey, sigtype: SignatureType) -> Result<Signed, Error> {
        let canonical = ::crypto::canonicalize_json(&json::to_vec(&signed)?)?;
        let sig = ::crypto::sign_msg(sigtype, &canonical, &privkey.der_key)?;
        Ok(Signed {
            signed: signed,
            signatures: vec![Signature {
                keyid:  privkey.keyid.clone(),
                method: sigtype,
                sig:    ::base64::encode(&sig),
            }],
        })
    }
}


/// The common body shared by every role's `signed` field.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct RoleData {
    #[serde(rename = "_type")]
    pub role_type: String,
    pub version:   Version,
    pub expires:   DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys:  Option<HashMap<String, Key>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<HashMap<String, RoleKeys>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<HashMap<String, Target>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegations: Option<Delegations>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, MetaFile>>,
}

impl RoleData {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Delegations {
    pub keys:  HashMap<String, Key>,
    pub roles: Vec<DelegatedRole>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct DelegatedRole {
    pub name:      String,
    pub keyids:    HashSet<String>,
    pub threshold: u64,
}

/// An entry of Timestamp's or Snapshot's `meta` map: the version and hash
/// of another role file or (for Snapshot) of `targets.json`.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct MetaFile {
    pub version: Version,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashes: Option<HashMap<String, String>>,
}


/// A hash algorithm and lowercase hex digest.
#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Debug, Clone)]
pub struct HashDigest {
    pub algorithm: String,
    pub digest:    String,
}

/// A named, sized, hashed artifact assigned to one or more ECUs.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Target {
    pub length: u64,
    pub hashes: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<TargetCustom>,
}

impl Target {
    /// Two targets match iff filenames agree (the caller is expected to
    /// compare map keys) and every hash algorithm present in both targets
    /// agrees on the digest (spec section 3, invariant 6).
    pub fn hashes_match(&self, other: &Target) -> bool {
        let mut compared = false;
        for (alg, digest) in &self.hashes {
            if let Some(other_digest) = other.hashes.get(alg) {
                compared = true;
                if digest != other_digest {
                    return false;
                }
            }
        }
        compared
    }

    pub fn sha256(&self) -> Option<&String> {
        self.hashes.get("sha256")
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
pub struct TargetCustom {
    #[serde(default, rename = "ecuIdentifiers")]
    pub ecu_identifiers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}


/// Parse an RFC3339 timestamp the way the director/image repositories emit
/// it. Invalid input never compares equal or ordered to anything else
/// (spec section 8, TimeStamp testable property).
pub fn parse_expires(raw: &str) -> Result<DateTime<Utc>, Error> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ")
        .or_else(|_| raw.parse::<DateTime<Utc>>().map(|dt| dt.naive_utc()))
        .map_err(|_| Error::Parse(format!("invalid timestamp: {}", raw)))?;
    Ok(DateTime::from_utc(naive, Utc))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn targets_match_on_shared_hash_algorithms() {
        let mut ha = HashMap::new();
        ha.insert("sha256".into(), "aa".into());
        ha.insert("sha512".into(), "bb".into());
        let mut hb = HashMap::new();
        hb.insert("sha256".into(), "aa".into());

        let a = Target { length: 10, hashes: ha, custom: None };
        let b = Target { length: 10, hashes: hb, custom: None };
        assert!(a.hashes_match(&b));
    }

    #[test]
    fn targets_mismatch_on_divergent_hash() {
        let mut ha = HashMap::new();
        ha.insert("sha256".into(), "aa".into());
        let mut hb = HashMap::new();
        hb.insert("sha256".into(), "bb".into());

        let a = Target { length: 10, hashes: ha, custom: None };
        let b = Target { length: 10, hashes: hb, custom: None };
        assert!(!a.hashes_match(&b));
    }

    #[test]
    fn role_round_trips_through_string() {
        assert_eq!(Role::Root, "root".parse().unwrap());
        assert_eq!(Role::Delegated("shortlist".into()), "shortlist".parse().unwrap());
        assert_eq!("timestamp", Role::Timestamp.to_string());
    }
}
