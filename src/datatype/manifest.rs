use serde_json as json;
use std::collections::HashMap;

use datatype::{EcuSerial, InstallResult, PrivateKey, SignatureType, Signed, Target};
use datatype::Error;


/// What a single ECU reports about itself: the Target it currently runs
/// and the outcome of its last install, if any (spec section 3 Manifest).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EcuManifest {
    pub ecu_serial:    EcuSerial,
    pub installed:     Option<Target>,
    pub last_result:   Option<InstallResult>,
    #[serde(default)]
    pub attacks_detected: String,
    /// A Secondary's own signed manifest, folded in verbatim when it
    /// reports one itself instead of the Primary synthesizing a Target
    /// from the trust store (spec section 4.5 Reporting, "per-ECU").
    #[serde(default)]
    pub signed_manifest: Option<Signed>,
}

impl EcuManifest {
    pub fn new(ecu_serial: EcuSerial, installed: Option<Target>, last_result: Option<InstallResult>) -> Self {
        EcuManifest {
            ecu_serial: ecu_serial,
            installed: installed,
            last_result: last_result,
            attacks_detected: String::new(),
            signed_manifest: None,
        }
    }

    pub fn with_signed_manifest(mut self, signed: Signed) -> Self {
        self.signed_manifest = Some(signed);
        self
    }
}


/// The signed, per-device document reported to the Director (spec section
/// 4.5 Reporting). One `EcuManifest` per known ECU, keyed by serial.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub primary_ecu_serial: EcuSerial,
    pub ecu_manifests:      HashMap<EcuSerial, EcuManifest>,
}

impl Manifest {
    pub fn new(primary_ecu_serial: EcuSerial) -> Self {
        Manifest { primary_ecu_serial: primary_ecu_serial, ecu_manifests: HashMap::new() }
    }

    pub fn insert(&mut self, manifest: EcuManifest) {
        self.ecu_manifests.insert(manifest.ecu_serial.clone(), manifest);
    }

    /// The unsigned manifest body, ready for canonicalization and signing
    /// (spec section 6).
    pub fn body(&self) -> json::Value {
        let ecus: Vec<&EcuManifest> = self.ecu_manifests.values().collect();
        json!({
            "primary_ecu_serial": self.primary_ecu_serial.0,
            "ecu_version_manifests": ecus,
        })
    }

    /// Sign the canonicalized manifest body with the Primary's Uptane key,
    /// producing the envelope posted to the Director (spec section 6).
    pub fn sign(&self, privkey: &PrivateKey, sigtype: SignatureType) -> Result<Signed, Error> {
        Signed::sign(self.body(), privkey, sigtype)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use datatype::InstallCode;

    #[test]
    fn manifest_collects_one_entry_per_ecu() {
        let mut manifest = Manifest::new(EcuSerial("primary".into()));
        let target = Target { length: 4, hashes: HashMap::new(), custom: None };
        let result = InstallResult::new("primary".into(), InstallCode::OK, "ok".into());
        manifest.insert(EcuManifest::new(EcuSerial("primary".into()), Some(target), Some(result)));
        assert_eq!(manifest.ecu_manifests.len(), 1);
    }
}
