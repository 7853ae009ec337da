pub mod campaign;
pub mod config;
pub mod error;
pub mod event;
pub mod install;
pub mod manifest;
pub mod tuf;
pub mod util;

pub use self::campaign::{Campaign, Campaigns};
pub use self::config::{BootloaderConfig, Config, LoggerConfig, P11Config, PacmanConfig,
                        ProvisionConfig, ProvisionMode, RunningMode, StorageConfig,
                        TelemetryConfig, TlsConfig, UptaneConfig};
pub use self::error::{Error, UptaneError, UptaneReason};
pub use self::event::{Event, PhaseResult, UpdateCheck};
pub use self::install::{InstallCode, InstallOutcome, InstallReport, InstallResult};
pub use self::manifest::{EcuManifest, Manifest};
pub use self::tuf::{Delegations, DelegatedRole, EcuSerial, HardwareIdentifier, HashDigest, Key,
                     KeyType, KeyValue, MetaFile, PrivateKey, RepositoryId, Role, RoleData,
                     RoleKeys, Signature, SignatureType, Signed, Target, TargetCustom, Version,
                     parse_expires};
pub use self::util::Util;
