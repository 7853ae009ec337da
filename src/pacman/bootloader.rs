//! Reboot-sentinel detection used by the orchestrator's `NeedCompletion`
//! handling (spec section 4.5, section 9 scenario 4). The bootloader's own
//! rollback mechanics and reboot command are out of scope; this only
//! tracks whether a reboot is still outstanding.

use std::fs;
use std::path::PathBuf;

use datatype::{BootloaderConfig, Error};

pub struct Bootloader {
    sentinel: PathBuf,
}

impl Bootloader {
    pub fn new(config: &BootloaderConfig) -> Bootloader {
        Bootloader { sentinel: PathBuf::from(&config.reboot_sentinel_dir).join(&config.reboot_sentinel_name) }
    }

    /// A sentinel is present whenever an install returned `NeedCompletion`
    /// and the device has not yet rebooted into the new image.
    pub fn reboot_pending(&self) -> bool {
        self.sentinel.exists()
    }

    pub fn mark_reboot_pending(&self) -> Result<(), Error> {
        if let Some(parent) = self.sentinel.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.sentinel, b"")?;
        Ok(())
    }

    pub fn clear_reboot_pending(&self) -> Result<(), Error> {
        match fs::remove_file(&self.sentinel) {
            Ok(()) => Ok(()),
            Err(ref err) if err.kind() == ::std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use datatype::BootloaderConfig;

    fn config(dir: &str) -> BootloaderConfig {
        BootloaderConfig {
            rollback_mode: "none".into(),
            reboot_sentinel_dir: dir.into(),
            reboot_sentinel_name: "need-reboot".into(),
            reboot_command: "/sbin/reboot".into(),
        }
    }

    #[test]
    fn sentinel_lifecycle() {
        let dir = ::std::env::temp_dir().join(format!("sota-bootloader-test-{}", ::std::process::id()));
        let bootloader = Bootloader::new(&config(dir.to_str().unwrap()));

        assert!(!bootloader.reboot_pending());
        bootloader.mark_reboot_pending().unwrap();
        assert!(bootloader.reboot_pending());
        bootloader.clear_reboot_pending().unwrap();
        assert!(!bootloader.reboot_pending());

        let _ = fs::remove_dir_all(&dir);
    }
}
