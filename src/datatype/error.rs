use base64::Base64Error;
use chrono::ParseError as ChronoParseError;
use hex::FromHexError;
use hyper::error::Error as HyperError;
use openssl::error::ErrorStack as OpensslErrors;
use pem::Error as PemError;
use rusqlite::Error as SqliteError;
use serde_json::Error as SerdeJsonError;
use std::fmt::{self, Display, Formatter};
use std::io::Error as IoError;
use std::str::Utf8Error;
use std::string::FromUtf8Error;
use std::sync::PoisonError;
use std::sync::mpsc::{RecvError, SendError};
use toml::de::Error as TomlError;
use url::ParseError as UrlParseError;

use datatype::{Event, RepositoryId, Role};
use http::ResponseData;


/// System-wide errors, grouped by the taxonomy of spec section 7.
#[derive(Debug)]
pub enum Error {
    Base64(Base64Error),
    Bootloader(String),
    Client(String),
    Config(String),
    DateTime(ChronoParseError),
    FromUtf8(FromUtf8Error),
    Hex(FromHexError),
    Http(ResponseData),
    HttpAuth(ResponseData),
    Hyper(HyperError),
    Io(IoError),
    Json(SerdeJsonError),
    KeyNotFound(String),
    KeySign(String),
    Openssl(OpensslErrors),
    PacMan(String),
    Parse(String),
    Pem(PemError),
    Pkcs11(String),
    Pkcs12(String),
    Poison(String),
    Provisioning(String),
    Recv(RecvError),
    Secondary(String),
    Sqlite(SqliteError),
    Storage(String),
    TargetMismatch(String),
    Toml(TomlError),
    Uptane(UptaneError),
    UrlParse(UrlParseError),
    Utf8(Utf8Error),
}

/// Failures arising from the metadata verifier of spec section 4.2, each
/// carrying the repository and role it was verifying.
#[derive(Debug)]
pub struct UptaneError {
    pub repo:   RepositoryId,
    pub role:   Role,
    pub reason: UptaneReason,
}

#[derive(Debug)]
pub enum UptaneReason {
    InvalidMetadata(String),
    UnmetThreshold(String),
    ExpiredMetadata,
    RootRotation(String),
    SecurityError(String),
    SizeExceeded(u64, u64),
    VersionMismatch { expected: u64, found: u64 },
}

impl UptaneError {
    pub fn new(repo: RepositoryId, role: Role, reason: UptaneReason) -> Error {
        Error::Uptane(UptaneError { repo: repo, role: role, reason: reason })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let inner: String = match *self {
            Error::Base64(ref err)      => format!("Base64 parse error: {}", err),
            Error::Bootloader(ref err)  => format!("Bootloader error: {}", err),
            Error::Client(ref err)      => format!("Http client error: {}", err),
            Error::Config(ref err)      => format!("Bad config: {}", err),
            Error::DateTime(ref err)    => format!("DateTime parse error: {}", err),
            Error::FromUtf8(ref err)    => format!("From utf8 error: {}", err),
            Error::Hex(ref err)         => format!("Not valid hex data: {}", err),
            Error::Http(ref err)        => format!("HTTP client error: {}", err),
            Error::HttpAuth(ref err)    => format!("HTTP authorization error: {}", err),
            Error::Hyper(ref err)       => format!("Hyper error: {}", err),
            Error::Io(ref err)          => format!("IO error: {}", err),
            Error::Json(ref err)        => format!("JSON parse error: {}", err),
            Error::KeyNotFound(ref err) => format!("Key not found: {}", err),
            Error::KeySign(ref err)     => format!("Key signing error: {}", err),
            Error::Openssl(ref err)     => format!("OpenSSL error: {}", err),
            Error::PacMan(ref err)      => format!("Package manager error: {}", err),
            Error::Parse(ref err)       => format!("Parse error: {}", err),
            Error::Pem(ref err)         => format!("PEM parse error: {}", err),
            Error::Pkcs11(ref err)      => format!("PKCS#11 error: {}", err),
            Error::Pkcs12(ref err)      => format!("PKCS#12 error: {}", err),
            Error::Poison(ref err)      => format!("Poison error: {}", err),
            Error::Provisioning(ref err) => format!("Provisioning error: {}", err),
            Error::Recv(ref err)        => format!("Recv error: {}", err),
            Error::Secondary(ref err)   => format!("Secondary error: {}", err),
            Error::Sqlite(ref err)      => format!("Sqlite error: {}", err),
            Error::Storage(ref err)     => format!("Storage error: {}", err),
            Error::TargetMismatch(ref err) => format!("Target mismatch: {}", err),
            Error::Toml(ref err)        => format!("TOML error: {:?}", err),
            Error::Uptane(ref err)      => format!("Uptane error ({} {:?}): {:?}", err.repo, err.role, err.reason),
            Error::UrlParse(ref err)    => format!("Url parse error: {}", err),
            Error::Utf8(ref err)        => format!("Utf8 error: {}", err),
        };
        write!(f, "{}", inner)
    }
}

impl<E> From<PoisonError<E>> for Error {
    fn from(err: PoisonError<E>) -> Error {
        Error::Poison(err.to_string())
    }
}

macro_rules! derive_from {
    ([ $( $from: ident => $to: ident ),* ]) => {
        $(impl From<$from> for Error {
            fn from(err: $from) -> Error {
                Error::$to(err)
            }
        })*
    };
}

derive_from!([
    Base64Error      => Base64,
    ChronoParseError => DateTime,
    FromHexError     => Hex,
    FromUtf8Error    => FromUtf8,
    HyperError       => Hyper,
    IoError          => Io,
    OpensslErrors    => Openssl,
    PemError         => Pem,
    RecvError        => Recv,
    ResponseData     => Http,
    SerdeJsonError   => Json,
    SqliteError      => Sqlite,
    TomlError        => Toml,
    UrlParseError    => UrlParse,
    Utf8Error        => Utf8
]);

impl From<SendError<Event>> for Error {
    fn from(err: SendError<Event>) -> Error {
        Error::Client(format!("couldn't send event: {}", err))
    }
}
