//! The IP-Uptane binary wire schema (spec section 4.6): a discriminated
//! union of request/response messages, framed as a big-endian `u32`
//! length prefix followed by a `bincode`-encoded body. Grounded on the
//! client's own tagged `atomic::Message` enum, ported from JSON-over-UDP
//! to length-prefixed binary-over-TCP per the spec's schema.

use bincode::{self, Infinite};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use datatype::Error;

const MAX_FRAME: u32 = 64 * 1024 * 1024;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Request {
    PublicKeyReq,
    ManifestReq,
    PutMetaReq { director_root: Vec<u8>, director_targets: Vec<u8>,
                 image_root: Vec<u8>, image_targets: Vec<u8>, image_snapshot: Vec<u8>, image_timestamp: Vec<u8> },
    RootVersionReq { repo: u8 },
    PutRootReq { repo: u8, raw: Vec<u8> },
    SendFirmwareReq { data: Vec<u8> },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Response {
    PublicKeyResp { keytype: String, keyval: String },
    ManifestResp { signed_json: Vec<u8> },
    PutMetaResp { success: bool },
    RootVersionResp { version: u64 },
    PutRootResp { success: bool },
    SendFirmwareResp { success: bool },
    Error { message: String },
}

/// Write one framed message: 4-byte big-endian length then the body.
pub fn write_framed<W: Write, T: ::serde::Serialize>(writer: &mut W, msg: &T) -> Result<(), Error> {
    let body = bincode::serialize(msg, Infinite).map_err(|err| Error::Client(err.to_string()))?;
    if body.len() as u64 > MAX_FRAME as u64 {
        return Err(Error::Client("outgoing secondary message too large".into()));
    }
    writer.write_u32::<BigEndian>(body.len() as u32)?;
    writer.write_all(&body)?;
    Ok(())
}

/// Read one framed message, rejecting anything above `MAX_FRAME` bytes so
/// a misbehaving peer cannot force an unbounded allocation.
pub fn read_framed<R: Read, T: ::serde::de::DeserializeOwned>(reader: &mut R) -> Result<T, Error> {
    let len = reader.read_u32::<BigEndian>()?;
    if len > MAX_FRAME {
        return Err(Error::Client(format!("incoming secondary message too large: {} bytes", len)));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    bincode::deserialize(&buf).map_err(|err| Error::Client(err.to_string()))
}
