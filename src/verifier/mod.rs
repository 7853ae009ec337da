//! The metadata verifier of spec section 4.2: purely functional checks of
//! signatures, versions and expiry against the current Root's key
//! registry, plus the Root rotation algorithm.

use chrono::Utc;
use serde_json as json;
use std::collections::HashSet;

use crypto;
use datatype::{Error, RepositoryId, Role, RoleData, RoleKeys, Signed, UptaneError, UptaneReason, Version};

/// Root rotation will not walk more than this many versions ahead in one
/// call, bounding the cost of a compromised or misconfigured server that
/// serves an unbounded chain of `n.root.json` files.
pub const MAX_ROOT_ROTATIONS: u64 = 64;

pub const MAX_ROOT_SIZE: u64      = 1 << 20;
pub const MAX_TIMESTAMP_SIZE: u64 = 16 * 1024;
pub const MAX_SNAPSHOT_SIZE: u64  = 1 << 20;
pub const MAX_TARGETS_SIZE: u64   = 8 << 20;

/// Delegated Targets may not nest deeper than this (spec section 4.2).
pub const MAX_DELEGATION_DEPTH: u32 = 5;

pub fn size_cap_for(role: &Role) -> u64 {
    match *role {
        Role::Root        => MAX_ROOT_SIZE,
        Role::Timestamp    => MAX_TIMESTAMP_SIZE,
        Role::Snapshot     => MAX_SNAPSHOT_SIZE,
        Role::Targets | Role::Delegated(_) => MAX_TARGETS_SIZE,
    }
}

/// Parse a `Signed` envelope and check the byte length against `cap`,
/// failing closed (spec section 4.2 `SizeExceeded`).
fn parse_signed(repo: RepositoryId, role: &Role, raw: &[u8], cap: u64) -> Result<Signed, Error> {
    if raw.len() as u64 > cap {
        return Err(UptaneError::new(repo, role.clone(), UptaneReason::SizeExceeded(raw.len() as u64, cap)));
    }
    json::from_slice(raw).map_err(|err| {
        UptaneError::new(repo, role.clone(), UptaneReason::InvalidMetadata(err.to_string()))
    })
}

fn parse_role_data(repo: RepositoryId, role: &Role, signed: &Signed) -> Result<RoleData, Error> {
    json::from_value(signed.signed.clone()).map_err(|err| {
        UptaneError::new(repo, role.clone(), UptaneReason::InvalidMetadata(err.to_string()))
    })
}

/// Verify that enough distinct, registered keys in `signed.signatures`
/// meet `keys.threshold` (spec section 4.2 step 2, `UnmetThreshold`).
fn verify_threshold(repo: RepositoryId, role: &Role, signed: &Signed, keyring: &RoleData, keys: &RoleKeys) -> Result<(), Error> {
    let canonical = crypto::canonicalize_json(&json::to_vec(&signed.signed)?)?;
    let registry = keyring.keys.as_ref().ok_or_else(|| {
        UptaneError::new(repo, role.clone(), UptaneReason::SecurityError("root has no key registry".into()))
    })?;

    let mut verified: HashSet<String> = HashSet::new();
    for sig in &signed.signatures {
        if !keys.keyids.contains(&sig.keyid) { continue; }
        let key = match registry.get(&sig.keyid) { Some(k) => k, None => continue };
        let der = match ::base64::decode(&key.keyval.public) { Ok(d) => d, Err(_) => continue };
        let raw_sig = match ::base64::decode(&sig.sig) { Ok(d) => d, Err(_) => continue };
        if crypto::verify_msg(sig.method, &canonical, &der, &raw_sig) {
            verified.insert(sig.keyid.clone());
        }
    }

    if (verified.len() as u64) < keys.threshold {
        return Err(UptaneError::new(repo, role.clone(), UptaneReason::UnmetThreshold(
            format!("{} of {} required signatures verified", verified.len(), keys.threshold))));
    }
    Ok(())
}

/// Verify a non-Root role (Timestamp, Snapshot, Targets or a delegation)
/// against the current Root's (or delegating Targets') key registry, and
/// against the previously stored version (spec section 4.2 steps 2-4).
pub fn verify_role(repo: RepositoryId, role: &Role, raw: &[u8], root: &RoleData, stored_version: Option<Version>) -> Result<RoleData, Error> {
    let cap = size_cap_for(role);
    let signed = parse_signed(repo, role, raw, cap)?;
    let data = parse_role_data(repo, role, &signed)?;

    let role_keys = root.roles.as_ref()
        .and_then(|roles| roles.get(&role.to_string()))
        .ok_or_else(|| UptaneError::new(repo, role.clone(), UptaneReason::SecurityError("role not delegated by root".into())))?;
    verify_threshold(repo, role, &signed, root, role_keys)?;

    if let Some(prev) = stored_version {
        if data.version <= prev {
            return Err(UptaneError::new(repo, role.clone(), UptaneReason::VersionMismatch { expected: prev + 1, found: data.version }));
        }
    }

    if data.is_expired(Utc::now()) {
        return Err(UptaneError::new(repo, role.clone(), UptaneReason::ExpiredMetadata));
    }

    Ok(data)
}

/// Verify an initial, self-signed Root: the threshold is met by keys
/// declared inside the same blob (spec section 4.2 `initRoot`).
pub fn init_root(repo: RepositoryId, raw: &[u8]) -> Result<RoleData, Error> {
    let signed = parse_signed(repo, &Role::Root, raw, MAX_ROOT_SIZE)?;
    let data = parse_role_data(repo, &Role::Root, &signed)?;
    let role_keys = data.roles.as_ref()
        .and_then(|roles| roles.get("root"))
        .ok_or_else(|| UptaneError::new(repo, Role::Root, UptaneReason::InvalidMetadata("root declares no root role".into())))?;
    verify_threshold(repo, &Role::Root, &signed, &data, role_keys)?;
    if data.is_expired(Utc::now()) {
        return Err(UptaneError::new(repo, Role::Root, UptaneReason::ExpiredMetadata));
    }
    Ok(data)
}

/// Verify a candidate Root `n` against both the currently trusted Root's
/// key set and the candidate's own declared key set, and require its
/// version to equal `n` exactly (spec section 4.2 Root rotation step 2).
pub fn verify_root_rotation(repo: RepositoryId, raw: &[u8], current: &RoleData, expected_version: Version) -> Result<RoleData, Error> {
    let signed = parse_signed(repo, &Role::Root, raw, MAX_ROOT_SIZE)?;
    let candidate = parse_role_data(repo, &Role::Root, &signed)?;

    let current_keys = current.roles.as_ref().and_then(|r| r.get("root")).ok_or_else(|| {
        UptaneError::new(repo, Role::Root, UptaneReason::SecurityError("current root has no root role".into()))
    })?;
    verify_threshold(repo, &Role::Root, &signed, current, current_keys)
        .map_err(|_| UptaneError::new(repo, Role::Root, UptaneReason::RootRotation("candidate not signed by current root keys".into())))?;

    let candidate_keys = candidate.roles.as_ref().and_then(|r| r.get("root")).ok_or_else(|| {
        UptaneError::new(repo, Role::Root, UptaneReason::SecurityError("candidate root has no root role".into()))
    })?;
    verify_threshold(repo, &Role::Root, &signed, &candidate, candidate_keys)
        .map_err(|_| UptaneError::new(repo, Role::Root, UptaneReason::RootRotation("candidate not signed by its own root keys".into())))?;

    if candidate.version != expected_version {
        return Err(UptaneError::new(repo, Role::Root, UptaneReason::RootRotation(
            format!("expected root version {} exactly, found {}", expected_version, candidate.version))));
    }

    Ok(candidate)
}

/// Snapshot must list the exact version of Targets being verified;
/// Timestamp must list the exact hash of Snapshot (spec section 4.2 step 5).
pub fn cross_check_version(repo: RepositoryId, role: &Role, meta: &RoleData, entry_name: &str, expected_version: Version) -> Result<(), Error> {
    let entries = meta.meta.as_ref().ok_or_else(|| {
        UptaneError::new(repo, role.clone(), UptaneReason::SecurityError("role carries no meta map".into()))
    })?;
    let entry = entries.get(entry_name).ok_or_else(|| {
        UptaneError::new(repo, role.clone(), UptaneReason::InvalidMetadata(format!("no entry for {}", entry_name)))
    })?;
    if entry.version != expected_version {
        return Err(UptaneError::new(repo, role.clone(), UptaneReason::VersionMismatch {
            expected: expected_version, found: entry.version,
        }));
    }
    Ok(())
}

pub fn cross_check_hash(repo: RepositoryId, role: &Role, meta: &RoleData, entry_name: &str, raw: &[u8]) -> Result<(), Error> {
    let entries = meta.meta.as_ref().ok_or_else(|| {
        UptaneError::new(repo, role.clone(), UptaneReason::SecurityError("role carries no meta map".into()))
    })?;
    let entry = entries.get(entry_name).ok_or_else(|| {
        UptaneError::new(repo, role.clone(), UptaneReason::InvalidMetadata(format!("no entry for {}", entry_name)))
    })?;
    if let Some(ref hashes) = entry.hashes {
        if let Some(expected) = hashes.get("sha256") {
            let found = crypto::sha256_hex(raw);
            if &found != expected {
                return Err(UptaneError::new(repo, role.clone(), UptaneReason::SecurityError(
                    format!("{} hash mismatch: expected {}, found {}", entry_name, expected, found))));
            }
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use datatype::{Key, KeyType, KeyValue, PrivateKey, Signature, SignatureType};
    use serde_json::json;
    use std::collections::HashMap;
    use std::collections::HashSet;

    fn keypair() -> (PrivateKey, Key) {
        // ed25519 test vector (RFC 8032 section 7.1 style, arbitrary for our purposes)
        let pub_b64 = "qQi1Q6V7mqZzt12UPYtcFd2oiMYtW+U8VXlXrpW8lMs=";
        let priv_pkcs8 = ::base64::decode(
            "MC4CAQAwBQYDK2VwBCIEIOCtvlOoVbiAS6tS2LZYYhDhyhDVbgFTd8a6JpboVKDk").unwrap();
        let key = Key { keytype: KeyType::Ed25519, keyval: KeyValue { public: pub_b64.into() } };
        (PrivateKey { keyid: "test".into(), der_key: priv_pkcs8 }, key)
    }

    #[test]
    fn init_root_rejects_unmet_threshold() {
        let (_priv, key) = keypair();
        let key_id = key.key_id().unwrap();
        let mut keys = HashMap::new();
        keys.insert(key_id.clone(), key);
        let mut roles = HashMap::new();
        roles.insert("root".to_string(), RoleKeys { threshold: 1, keyids: HashSet::new() });

        let body = RoleData {
            role_type: "root".into(), version: 1, expires: Utc::now() + ::chrono::Duration::days(1),
            keys: Some(keys), roles: Some(roles), targets: None, delegations: None, meta: None,
        };
        let signed = Signed { signed: json::to_value(&body).unwrap(), signatures: vec![] };
        let raw = json::to_vec(&signed).unwrap();

        let err = init_root(RepositoryId::Image, &raw);
        assert!(err.is_err());
    }
}
