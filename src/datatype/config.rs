use std::fs::File;
use std::io::prelude::*;
use toml::Value;

use datatype::Error;


/// A container for all parsed configuration sections (spec section 6).
#[derive(Default, PartialEq, Debug, Clone)]
pub struct Config {
    pub tls:       TlsConfig,
    pub provision: ProvisionConfig,
    pub uptane:    UptaneConfig,
    pub storage:   StorageConfig,
    pub pacman:    PacmanConfig,
    pub bootloader: BootloaderConfig,
    pub telemetry: TelemetryConfig,
    pub logger:    LoggerConfig,
    pub p11:       P11Config,
}

impl Config {
    /// Read a toml config file, using defaults for missing sections.
    pub fn load(path: &str) -> Result<Config, Error> {
        info!("Loading config file: {}", path);
        let mut file = File::open(path)
            .map_err(|err| Error::Config(format!("couldn't open config: {}", err)))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|err| Error::Config(format!("couldn't read config: {}", err)))?;
        Config::parse(&toml)
    }

    /// Parse a toml config using default values for missing sections or fields.
    pub fn parse(toml: &str) -> Result<Config, Error> {
        let table: Value = toml.parse().map_err(|err| Error::Config(format!("{}", err)))?;

        Ok(Config {
            tls:        parse_section(&table, "tls")?,
            provision:  parse_section(&table, "provision")?,
            uptane:     parse_section(&table, "uptane")?,
            storage:    parse_section(&table, "storage")?,
            pacman:     parse_section(&table, "pacman")?,
            bootloader: parse_section(&table, "bootloader")?,
            telemetry:  parse_section(&table, "telemetry")?,
            logger:     parse_section(&table, "logger")?,
            p11:        parse_section(&table, "p11")?,
        })
    }
}

fn parse_section<T: ::serde::de::DeserializeOwned + Default>(table: &Value, section: &str) -> Result<T, Error> {
    match table.get(section) {
        Some(sect) => sect.clone().try_into().map_err(|err| Error::Config(format!("[{}]: {}", section, err))),
        None => Ok(T::default()),
    }
}


/// The `[tls]` section: device TLS credentials used to reach both the
/// Director and Image repositories (spec section 4.9, 6).
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct TlsConfig {
    pub server:       String,
    pub ca_file:      String,
    pub cert_file:    String,
    pub pkey_file:    String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        TlsConfig {
            server:    "https://director.example.com".into(),
            ca_file:   "/usr/local/etc/uptane/ca.pem".into(),
            cert_file: "/usr/local/etc/uptane/client.pem".into(),
            pkey_file: "/usr/local/etc/uptane/client.key".into(),
        }
    }
}


/// The `[provision]` section (spec section 6).
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct ProvisionConfig {
    pub server:                     String,
    pub p12_password:               String,
    pub provision_path:             String,
    pub mode:                       ProvisionMode,
    pub device_id:                  String,
    pub primary_ecu_serial:         String,
    pub primary_ecu_hardware_id:    String,
    pub ecu_registration_endpoint:  String,
    pub expiry_days:                u32,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        ProvisionConfig {
            server:                    "https://provisioner.example.com".into(),
            p12_password:              String::new(),
            provision_path:            "/usr/local/etc/uptane/autoprov_credentials.p12".into(),
            mode:                      ProvisionMode::SharedCred,
            device_id:                 String::new(),
            primary_ecu_serial:        "primary".into(),
            primary_ecu_hardware_id:   "primary-hw".into(),
            ecu_registration_endpoint: "/director/ecus".into(),
            expiry_days:               365,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
pub enum ProvisionMode {
    #[serde(rename = "shared_cred")]
    SharedCred,
    #[serde(rename = "device_cred")]
    DeviceCred,
}


/// The `[uptane]` section: repository endpoints, local metadata cache.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct UptaneConfig {
    pub director_server: String,
    pub repo_server:     String,
    pub polling_sec:     u64,
    pub running_mode:    RunningMode,
    pub metadata_path:   String,
    pub private_key_path: String,
    pub public_key_path:  String,
}

impl Default for UptaneConfig {
    fn default() -> Self {
        UptaneConfig {
            director_server:  "https://director.example.com".into(),
            repo_server:      "https://image.example.com".into(),
            polling_sec:      10,
            running_mode:     RunningMode::Full,
            metadata_path:    "/var/sota/metadata".into(),
            private_key_path: "/var/sota/ecuprimary.pem".into(),
            public_key_path:  "/var/sota/ecuprimary.pub".into(),
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
pub enum RunningMode {
    #[serde(rename = "full")]
    Full,
    #[serde(rename = "once")]
    Once,
    #[serde(rename = "check")]
    Check,
    #[serde(rename = "download")]
    Download,
    #[serde(rename = "install")]
    Install,
}


/// The `[storage]` section: trust store location plus blob directory.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub sqlite_path: String,
    pub blob_dir:    Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            sqlite_path: "/var/sota/trust.db".into(),
            blob_dir:    None,
        }
    }
}


/// The `[pacman]` section (spec section 4.8).
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct PacmanConfig {
    pub kind:         String,
    pub packages_dir: String,
    pub sysroot:      String,
    pub os_release:   String,
}

impl Default for PacmanConfig {
    fn default() -> Self {
        PacmanConfig {
            kind:         "fake".into(),
            packages_dir: "/var/sota/packages".into(),
            sysroot:      "/".into(),
            os_release:   "/etc/os-release".into(),
        }
    }
}


/// The `[bootloader]` section: reboot sentinel detection (spec section 9).
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct BootloaderConfig {
    pub rollback_mode:       String,
    pub reboot_sentinel_dir: String,
    pub reboot_sentinel_name: String,
    pub reboot_command:      String,
}

impl Default for BootloaderConfig {
    fn default() -> Self {
        BootloaderConfig {
            rollback_mode:        "none".into(),
            reboot_sentinel_dir:  "/var/sota/reboot".into(),
            reboot_sentinel_name: "need_reboot".into(),
            reboot_command:       "/sbin/reboot".into(),
        }
    }
}


/// The `[telemetry]` section: informational report toggles only, no
/// metrics backend is implemented.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    pub report_network: bool,
    pub report_config:  bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig { report_network: false, report_config: false }
    }
}


/// The `[logger]` section. `loglevel` is `0..=5` (trace..fatal), mirroring
/// the client's `main.rs::start_logging`.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(default)]
pub struct LoggerConfig {
    pub loglevel: u8,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig { loglevel: 2 }
    }
}


/// The `[p11]` section: PKCS#11 module/slot identifiers, consulted only
/// when a key source is tagged `Pkcs11`.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(default)]
pub struct P11Config {
    pub module:       String,
    pub pass:         String,
    pub uptane_key_id: String,
    pub tls_cert_id:  String,
    pub tls_key_id:   String,
    pub tls_ca_id:    String,
}

impl Default for P11Config {
    fn default() -> Self {
        P11Config {
            module:        String::new(),
            pass:          String::new(),
            uptane_key_id: String::new(),
            tls_cert_id:   String::new(),
            tls_key_id:    String::new(),
            tls_ca_id:     String::new(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn uptane_section_overrides_defaults() {
        let toml = r#"
            [uptane]
            director_server = "https://director.internal"
            polling_sec = 30
            running_mode = "once"
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.uptane.director_server, "https://director.internal");
        assert_eq!(config.uptane.polling_sec, 30);
        assert_eq!(config.uptane.running_mode, RunningMode::Once);
        assert_eq!(config.uptane.repo_server, UptaneConfig::default().repo_server);
    }

    #[test]
    fn bootloader_section_overrides_defaults() {
        let toml = r#"
            [bootloader]
            reboot_sentinel_name = "awaiting_reboot"
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.bootloader.reboot_sentinel_name, "awaiting_reboot");
        assert_eq!(config.bootloader.reboot_sentinel_dir, BootloaderConfig::default().reboot_sentinel_dir);
    }
}
