//! The persistent trust store of spec section 4.1: one SQLite database
//! holding verified role metadata, registered ECUs, installed versions,
//! accepted keys, provisioning credentials and content-addressed target
//! blobs. Every mutation is a single-statement transaction so a crash at
//! any point leaves the database consistent.

use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use datatype::{EcuSerial, Error, HardwareIdentifier, RepositoryId, Role};

const SCHEMA: &'static str = "
CREATE TABLE IF NOT EXISTS meta (
    repo       TEXT NOT NULL,
    role       TEXT NOT NULL,
    version    INTEGER NOT NULL,
    raw_bytes  BLOB NOT NULL,
    PRIMARY KEY (repo, role, version)
);
CREATE TABLE IF NOT EXISTS ecu (
    serial     TEXT PRIMARY KEY,
    hwid       TEXT NOT NULL,
    is_primary INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS installed_version (
    serial     TEXT NOT NULL,
    target     TEXT NOT NULL,
    mode       TEXT NOT NULL,
    PRIMARY KEY (serial, target)
);
CREATE TABLE IF NOT EXISTS keys (
    role       TEXT NOT NULL,
    key_id     TEXT NOT NULL,
    key_type   TEXT NOT NULL,
    key_bytes  TEXT NOT NULL,
    PRIMARY KEY (role, key_id)
);
CREATE TABLE IF NOT EXISTS provisioning (
    id         INTEGER PRIMARY KEY CHECK (id = 0),
    tls_ca     BLOB,
    tls_cert   BLOB,
    tls_pkey   BLOB,
    uptane_pub BLOB,
    uptane_priv BLOB
);
CREATE TABLE IF NOT EXISTS target_file (
    hash       TEXT PRIMARY KEY,
    length     INTEGER NOT NULL,
    bytes      BLOB NOT NULL
);
";

/// Whether an `installed_version` row is the currently running image or
/// one waiting on a pending operation (spec section 3 `InstalledVersion`).
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum InstalledMode {
    Current,
    Pending,
}

impl InstalledMode {
    fn as_str(&self) -> &'static str {
        match *self {
            InstalledMode::Current => "current",
            InstalledMode::Pending => "pending",
        }
    }

    fn from_str(s: &str) -> InstalledMode {
        match s {
            "pending" => InstalledMode::Pending,
            _ => InstalledMode::Current,
        }
    }
}

/// A connection to the trust store. Reads may run concurrently; writes
/// are serialized behind a mutex and each is its own transaction.
pub struct TrustStore {
    conn: Mutex<Connection>,
}

impl TrustStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<TrustStore, Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(TrustStore { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<TrustStore, Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(TrustStore { conn: Mutex::new(conn) })
    }

    /// Append a verified role file. Callers prune older Root versions
    /// separately via `clear_non_root_meta` on rotation.
    pub fn put_meta(&self, repo: RepositoryId, role: &Role, version: u64, raw_bytes: &[u8]) -> Result<(), Error> {
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO meta (repo, role, version, raw_bytes) VALUES (?1, ?2, ?3, ?4)",
            &[&repo.to_string(), &role.to_string(), &(version as i64) as &::rusqlite::types::ToSql, &raw_bytes],
        )?;
        Ok(())
    }

    pub fn get_latest_meta(&self, repo: RepositoryId, role: &Role) -> Result<Option<(u64, Vec<u8>)>, Error> {
        let conn = self.conn.lock()?;
        conn.query_row(
            "SELECT version, raw_bytes FROM meta WHERE repo = ?1 AND role = ?2 ORDER BY version DESC LIMIT 1",
            &[&repo.to_string(), &role.to_string()],
            |row| {
                let version: i64 = row.get(0);
                (version as u64, row.get(1))
            },
        ).optional().map_err(Error::from)
    }

    /// Root rotation (spec section 4.2) discards every other role's
    /// cached metadata; only Root history is retained.
    pub fn clear_non_root_meta(&self, repo: RepositoryId) -> Result<(), Error> {
        let conn = self.conn.lock()?;
        conn.execute(
            "DELETE FROM meta WHERE repo = ?1 AND role != 'root'",
            &[&repo.to_string()],
        )?;
        Ok(())
    }

    /// Register an ECU. Idempotent: registering the same serial twice is
    /// a no-op (spec section 4.1 "read-only after registration").
    pub fn register_ecu(&self, serial: &EcuSerial, hwid: &HardwareIdentifier, is_primary: bool) -> Result<(), Error> {
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO ecu (serial, hwid, is_primary) VALUES (?1, ?2, ?3)",
            &[&serial.0, &hwid.0, &(is_primary as i64) as &::rusqlite::types::ToSql],
        )?;
        Ok(())
    }

    pub fn get_ecu_hwid(&self, serial: &EcuSerial) -> Result<Option<HardwareIdentifier>, Error> {
        let conn = self.conn.lock()?;
        conn.query_row(
            "SELECT hwid FROM ecu WHERE serial = ?1",
            &[&serial.0],
            |row| HardwareIdentifier(row.get(0)),
        ).optional().map_err(Error::from)
    }

    pub fn is_registered(&self, serial: &EcuSerial) -> Result<bool, Error> {
        Ok(self.get_ecu_hwid(serial)?.is_some())
    }

    /// Record an install result. At most one `Current` row may exist per
    /// serial: a new `Current` insert demotes the previous one.
    pub fn set_installed_version(&self, serial: &EcuSerial, target: &str, mode: InstalledMode) -> Result<(), Error> {
        let conn = self.conn.lock()?;
        if mode == InstalledMode::Current {
            conn.execute(
                "DELETE FROM installed_version WHERE serial = ?1 AND mode = 'current'",
                &[&serial.0],
            )?;
        }
        conn.execute(
            "INSERT OR REPLACE INTO installed_version (serial, target, mode) VALUES (?1, ?2, ?3)",
            &[&serial.0, &target, &mode.as_str()],
        )?;
        Ok(())
    }

    /// Whether any ECU has an install left at `Pending` (spec section 9
    /// scenario 4: a `NeedCompletion` install waiting on its reboot).
    pub fn has_pending_install(&self) -> Result<bool, Error> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM installed_version WHERE mode = 'pending'", &[], |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Promote every `Pending` install to `Current` (spec section 4.5/9:
    /// "the next cycle, after sentinel removal, ... a completion
    /// manifest"). Demotes any prior `Current` row for the same serial.
    pub fn promote_pending_installs(&self) -> Result<(), Error> {
        let conn = self.conn.lock()?;
        conn.execute(
            "DELETE FROM installed_version WHERE mode = 'current' AND serial IN \
             (SELECT serial FROM installed_version WHERE mode = 'pending')",
            &[],
        )?;
        conn.execute("UPDATE installed_version SET mode = 'current' WHERE mode = 'pending'", &[])?;
        Ok(())
    }

    pub fn get_current_version(&self, serial: &EcuSerial) -> Result<Option<String>, Error> {
        let conn = self.conn.lock()?;
        conn.query_row(
            "SELECT target FROM installed_version WHERE serial = ?1 AND mode = 'current'",
            &[&serial.0],
            |row| row.get(0),
        ).optional().map_err(Error::from)
    }

    pub fn add_target_blob(&self, hash: &str, bytes: &[u8]) -> Result<(), Error> {
        let conn = self.conn.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO target_file (hash, length, bytes) VALUES (?1, ?2, ?3)",
            &[&hash, &(bytes.len() as i64) as &::rusqlite::types::ToSql, &bytes],
        )?;
        Ok(())
    }

    pub fn has_target_blob(&self, hash: &str) -> Result<bool, Error> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM target_file WHERE hash = ?1", &[&hash], |row| row.get(0))?;
        Ok(count > 0)
    }

    pub fn get_target_blob(&self, hash: &str) -> Result<Option<Vec<u8>>, Error> {
        let conn = self.conn.lock()?;
        conn.query_row(
            "SELECT bytes FROM target_file WHERE hash = ?1", &[&hash], |row| row.get(0),
        ).optional().map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_the_same_ecu_twice_is_idempotent() {
        let store = TrustStore::open_in_memory().unwrap();
        let serial = EcuSerial("ecu1".into());
        let hwid = HardwareIdentifier("hw1".into());
        store.register_ecu(&serial, &hwid, true).unwrap();
        store.register_ecu(&serial, &hwid, true).unwrap();
        assert_eq!(store.get_ecu_hwid(&serial).unwrap(), Some(hwid));
    }

    #[test]
    fn setting_a_new_current_version_replaces_the_old_one() {
        let store = TrustStore::open_in_memory().unwrap();
        let serial = EcuSerial("ecu1".into());
        store.set_installed_version(&serial, "firmware-v1.bin", InstalledMode::Current).unwrap();
        store.set_installed_version(&serial, "firmware-v2.bin", InstalledMode::Current).unwrap();
        assert_eq!(store.get_current_version(&serial).unwrap(), Some("firmware-v2.bin".into()));
    }

    #[test]
    fn pending_installs_are_promoted_to_current_on_finalization() {
        let store = TrustStore::open_in_memory().unwrap();
        let serial = EcuSerial("ecu1".into());
        store.set_installed_version(&serial, "firmware-v1.bin", InstalledMode::Current).unwrap();
        store.set_installed_version(&serial, "firmware-v2.bin", InstalledMode::Pending).unwrap();
        assert!(store.has_pending_install().unwrap());

        store.promote_pending_installs().unwrap();
        assert!(!store.has_pending_install().unwrap());
        assert_eq!(store.get_current_version(&serial).unwrap(), Some("firmware-v2.bin".into()));
    }

    #[test]
    fn meta_round_trips_and_root_rotation_clears_other_roles() {
        let store = TrustStore::open_in_memory().unwrap();
        store.put_meta(RepositoryId::Image, &Role::Root, 1, b"root-v1").unwrap();
        store.put_meta(RepositoryId::Image, &Role::Targets, 1, b"targets-v1").unwrap();
        assert!(store.get_latest_meta(RepositoryId::Image, &Role::Targets).unwrap().is_some());

        store.clear_non_root_meta(RepositoryId::Image).unwrap();
        assert!(store.get_latest_meta(RepositoryId::Image, &Role::Targets).unwrap().is_none());
        assert!(store.get_latest_meta(RepositoryId::Image, &Role::Root).unwrap().is_some());
    }
}
