extern crate uptane;

use std::collections::HashMap;

use uptane::datatype::{EcuSerial, HardwareIdentifier, Target, TargetCustom};
use uptane::pacman::PackageManagerOps;
use uptane::pacman::fake::FakePackageManager;
use uptane::reconciler;
use uptane::trust_store::{InstalledMode, TrustStore};

fn target(hash: &str, ecus: &[(&str, &str)]) -> Target {
    let mut hashes = HashMap::new();
    hashes.insert("sha256".into(), hash.into());
    let mut ecu_identifiers = HashMap::new();
    for &(serial, hwid) in ecus {
        ecu_identifiers.insert(serial.into(), hwid.into());
    }
    Target { length: 4, hashes: hashes, custom: Some(TargetCustom { ecu_identifiers: ecu_identifiers, uri: None }) }
}

/// Happy-path end to end: a registered Primary is assigned a new target,
/// the fake package manager installs it, and the trust store reflects the
/// new current version (spec section 8 scenario 1, minus the network and
/// signature-verification legs already covered by `fetcher`/`verifier`'s
/// own tests).
#[test]
fn assignment_through_install_updates_the_trust_store() {
    let store = TrustStore::open_in_memory().unwrap();
    let serial = EcuSerial("primary".into());
    store.register_ecu(&serial, &HardwareIdentifier("primary-hw".into()), true).unwrap();

    let mut director = HashMap::new();
    director.insert("firmware-v2.bin".to_string(), target("deadbeef", &[("primary", "primary-hw")]));
    let mut image = HashMap::new();
    image.insert("firmware-v2.bin".to_string(), target("deadbeef", &[]));

    let assignments = reconciler::reconcile(&director, &image, &store).unwrap();
    assert_eq!(assignments.len(), 1);
    let assignment = &assignments[0];
    assert_eq!(assignment.filename, "firmware-v2.bin");

    let pacman = FakePackageManager::new(true);
    let outcome = pacman.install(&assignment.target, b"fake-image-bytes");
    assert!(outcome.code.is_success());
    store.set_installed_version(&assignment.ecu_serial, &assignment.filename, InstalledMode::Current).unwrap();

    assert_eq!(store.get_current_version(&serial).unwrap(), Some("firmware-v2.bin".into()));
    assert_eq!(pacman.get_current().unwrap().unwrap().sha256(), Some(&"deadbeef".to_string()));

    // Reconciling again with the same assignment now yields nothing: the
    // trust store already reflects it as current.
    let assignments = reconciler::reconcile(&director, &image, &store).unwrap();
    assert!(assignments.is_empty());
}

/// A target with no entry on the Image repository is a signature-parity
/// violation and must never reach install (spec section 4.4).
#[test]
fn director_only_target_is_rejected_before_install() {
    let store = TrustStore::open_in_memory().unwrap();
    store.register_ecu(&EcuSerial("primary".into()), &HardwareIdentifier("primary-hw".into()), true).unwrap();

    let mut director = HashMap::new();
    director.insert("firmware-v2.bin".to_string(), target("deadbeef", &[("primary", "primary-hw")]));
    let image = HashMap::new();

    assert!(reconciler::reconcile(&director, &image, &store).is_err());
}
