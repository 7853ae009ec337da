//! An in-memory package manager for tests and for devices with no real
//! install target (grounded on the teacher's `pacman::PackageManager::Test`
//! variant in `pacman/interface.rs`).

use std::sync::Mutex;

use datatype::{Error, InstallCode, InstallOutcome, Target};
use pacman::PackageManagerOps;

pub struct FakePackageManager {
    succeeds: bool,
    current:  Mutex<Option<Target>>,
}

impl FakePackageManager {
    pub fn new(succeeds: bool) -> FakePackageManager {
        FakePackageManager { succeeds: succeeds, current: Mutex::new(None) }
    }
}

impl PackageManagerOps for FakePackageManager {
    fn name(&self) -> &'static str { "fake" }

    fn get_current(&self) -> Result<Option<Target>, Error> {
        Ok(self.current.lock().expect("fake pacman lock").clone())
    }

    fn get_installed_packages(&self) -> Result<Vec<String>, Error> {
        Ok(self.current.lock().expect("fake pacman lock").iter()
            .flat_map(|t| t.sha256().cloned())
            .collect())
    }

    fn install(&self, target: &Target, _image: &[u8]) -> InstallOutcome {
        if self.succeeds {
            *self.current.lock().expect("fake pacman lock") = Some(target.clone());
            InstallOutcome::ok("installed".into())
        } else {
            InstallOutcome::new(InstallCode::INSTALL_FAILED, "fake pacman configured to fail".into())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn target(hash: &str) -> Target {
        let mut hashes = HashMap::new();
        hashes.insert("sha256".into(), hash.into());
        Target { length: 4, hashes: hashes, custom: None }
    }

    #[test]
    fn installing_updates_current_on_success() {
        let pacman = FakePackageManager::new(true);
        assert!(pacman.get_current().unwrap().is_none());

        let outcome = pacman.install(&target("aa"), b"1234");
        assert!(outcome.code.is_success());
        assert_eq!(pacman.get_current().unwrap(), Some(target("aa")));
    }

    #[test]
    fn installing_leaves_current_untouched_on_failure() {
        let pacman = FakePackageManager::new(false);
        let outcome = pacman.install(&target("aa"), b"1234");
        assert!(!outcome.code.is_success());
        assert!(pacman.get_current().unwrap().is_none());
    }
}
