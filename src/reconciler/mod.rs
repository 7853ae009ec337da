//! The target reconciler of spec section 4.4: cross-checks Director
//! targets against the Image repository's targets and the registered ECU
//! set, then drops assignments that are already installed.

use std::collections::HashMap;

use datatype::{EcuSerial, Error, HardwareIdentifier, Target};
use trust_store::TrustStore;

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub filename: String,
    pub target: Target,
    pub ecu_serial: EcuSerial,
}

/// Reconcile Director targets (keyed by filename) against Image targets
/// and the trust store's ECU registry, returning the ordered set of
/// outstanding per-ECU assignments (spec section 4.4).
pub fn reconcile(
    director_targets: &HashMap<String, Target>,
    image_targets: &HashMap<String, Target>,
    store: &TrustStore,
) -> Result<Vec<Assignment>, Error> {
    let mut assignments = Vec::new();

    for (filename, director_target) in director_targets {
        let image_target = image_targets.get(filename).ok_or_else(|| {
            Error::TargetMismatch(format!("{} not present on image repository", filename))
        })?;
        if !director_target.hashes_match(image_target) {
            return Err(Error::TargetMismatch(format!("{} hash mismatch between director and image", filename)));
        }

        let ecu_identifiers = director_target.custom.as_ref()
            .map(|c| c.ecu_identifiers.clone())
            .unwrap_or_default();

        for (serial_str, hwid_str) in ecu_identifiers {
            let serial = EcuSerial(serial_str);
            let hwid = HardwareIdentifier(hwid_str);

            match store.get_ecu_hwid(&serial)? {
                Some(ref registered) if *registered == hwid => (),
                Some(ref registered) => {
                    return Err(Error::Secondary(format!(
                        "ecu {} registered with hardware id {} but target assigns {}",
                        serial, registered, hwid)));
                }
                None => return Err(Error::Secondary(format!("ecu {} is not registered", serial))),
            }

            if store.get_current_version(&serial)?.as_ref() == Some(filename) {
                continue;
            }

            assignments.push(Assignment {
                filename: filename.clone(),
                target: director_target.clone(),
                ecu_serial: serial,
            });
        }
    }

    Ok(assignments)
}


#[cfg(test)]
mod tests {
    use super::*;
    use datatype::TargetCustom;
    use std::collections::HashMap;
    use trust_store::TrustStore;

    fn target(hash: &str, ecus: &[(&str, &str)]) -> Target {
        let mut hashes = HashMap::new();
        hashes.insert("sha256".into(), hash.into());
        let mut ecu_identifiers = HashMap::new();
        for &(serial, hwid) in ecus {
            ecu_identifiers.insert(serial.into(), hwid.into());
        }
        Target { length: 10, hashes: hashes, custom: Some(TargetCustom { ecu_identifiers: ecu_identifiers, uri: None }) }
    }

    #[test]
    fn assigns_registered_ecus_and_skips_already_installed() {
        let store = TrustStore::open_in_memory().unwrap();
        store.register_ecu(&EcuSerial("ecu1".into()), &HardwareIdentifier("hw1".into()), true).unwrap();
        store.register_ecu(&EcuSerial("ecu2".into()), &HardwareIdentifier("hw2".into()), false).unwrap();
        store.set_installed_version(&EcuSerial("ecu2".into()), "firmware.bin", ::trust_store::InstalledMode::Current).unwrap();

        let mut director = HashMap::new();
        director.insert("firmware.bin".to_string(), target("aa", &[("ecu1", "hw1"), ("ecu2", "hw2")]));
        let mut image = HashMap::new();
        image.insert("firmware.bin".to_string(), target("aa", &[]));

        let assignments = reconcile(&director, &image, &store).unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].ecu_serial, EcuSerial("ecu1".into()));
    }

    #[test]
    fn rejects_hardware_id_mismatch() {
        let store = TrustStore::open_in_memory().unwrap();
        store.register_ecu(&EcuSerial("ecu1".into()), &HardwareIdentifier("hw1".into()), true).unwrap();

        let mut director = HashMap::new();
        director.insert("firmware.bin".to_string(), target("aa", &[("ecu1", "wrong-hw")]));
        let mut image = HashMap::new();
        image.insert("firmware.bin".to_string(), target("aa", &[]));

        assert!(reconcile(&director, &image, &store).is_err());
    }

    #[test]
    fn rejects_missing_image_target() {
        let store = TrustStore::open_in_memory().unwrap();
        let mut director = HashMap::new();
        director.insert("firmware.bin".to_string(), target("aa", &[]));
        let image = HashMap::new();
        assert!(reconcile(&director, &image, &store).is_err());
    }
}
