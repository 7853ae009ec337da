use serde::{Serialize, Serializer};
use std::str::FromStr;

use datatype::Error;


/// Every outcome a package manager or secondary transport may report for
/// a single target install (spec section 4.8).
#[allow(non_camel_case_types)]
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallCode {
    OK = 0,
    ALREADY_PROCESSED,
    NEED_COMPLETION,
    VERIFICATION_FAILED,
    DEPENDENCY_FAILURE,
    VALIDATION_FAILED,
    INSTALL_FAILED,
    UPGRADE_FAILED,
    REMOVAL_FAILED,
    FLASH_FAILED,
    DISK_FULL,
    NOT_FOUND,
    OLD_VERSION,
    INTERNAL_ERROR,
    GENERAL_ERROR,
}

impl InstallCode {
    /// `OK`, `ALREADY_PROCESSED` and `NEED_COMPLETION` are all considered
    /// a successful handoff: the target is (or will shortly be, pending a
    /// reboot) the running image (spec section 4.5).
    pub fn is_success(&self) -> bool {
        match *self {
            InstallCode::OK | InstallCode::ALREADY_PROCESSED | InstallCode::NEED_COMPLETION => true,
            _ => false,
        }
    }

    pub fn needs_completion(&self) -> bool {
        *self == InstallCode::NEED_COMPLETION
    }
}

impl Default for InstallCode {
    fn default() -> Self {
        InstallCode::OK
    }
}

impl FromStr for InstallCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<InstallCode, Error> {
        match &*s.to_uppercase() {
            "0"  | "OK"                  => Ok(InstallCode::OK),
            "1"  | "ALREADY_PROCESSED"   => Ok(InstallCode::ALREADY_PROCESSED),
            "2"  | "NEED_COMPLETION"     => Ok(InstallCode::NEED_COMPLETION),
            "3"  | "VERIFICATION_FAILED" => Ok(InstallCode::VERIFICATION_FAILED),
            "4"  | "DEPENDENCY_FAILURE"  => Ok(InstallCode::DEPENDENCY_FAILURE),
            "5"  | "VALIDATION_FAILED"   => Ok(InstallCode::VALIDATION_FAILED),
            "6"  | "INSTALL_FAILED"      => Ok(InstallCode::INSTALL_FAILED),
            "7"  | "UPGRADE_FAILED"      => Ok(InstallCode::UPGRADE_FAILED),
            "8"  | "REMOVAL_FAILED"      => Ok(InstallCode::REMOVAL_FAILED),
            "9"  | "FLASH_FAILED"        => Ok(InstallCode::FLASH_FAILED),
            "10" | "DISK_FULL"           => Ok(InstallCode::DISK_FULL),
            "11" | "NOT_FOUND"           => Ok(InstallCode::NOT_FOUND),
            "12" | "OLD_VERSION"         => Ok(InstallCode::OLD_VERSION),
            "13" | "INTERNAL_ERROR"      => Ok(InstallCode::INTERNAL_ERROR),
            "14" | "GENERAL_ERROR"       => Ok(InstallCode::GENERAL_ERROR),
            _ => Err(Error::Parse(format!("unknown InstallCode: {}", s))),
        }
    }
}

impl Serialize for InstallCode {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(*self as u64)
    }
}


/// What a package manager or secondary returned for one target, before it
/// is attached to an ECU serial (spec section 4.8 `InstallResult`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallOutcome {
    pub code: InstallCode,
    pub text: String,
}

impl InstallOutcome {
    pub fn new(code: InstallCode, text: String) -> InstallOutcome {
        InstallOutcome { code: code, text: text }
    }

    pub fn ok(text: String) -> InstallOutcome {
        InstallOutcome { code: InstallCode::OK, text: text }
    }

    pub fn into_result(self, ecu_serial: String) -> InstallResult {
        InstallResult::new(ecu_serial, self.code, self.text)
    }
}


/// An encodable per-ECU installation result, sent to the Director inside
/// the Manifest (spec section 4.5 Reporting).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InstallResult {
    pub ecu_serial:  String,
    pub result_code: InstallCode,
    pub result_text: String,
}

impl InstallResult {
    pub fn new(ecu_serial: String, code: InstallCode, text: String) -> InstallResult {
        InstallResult { ecu_serial: ecu_serial, result_code: code, result_text: text }
    }

    pub fn is_success(&self) -> bool {
        self.result_code.is_success()
    }
}


/// The aggregate report for every ECU touched in one Install phase.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct InstallReport {
    pub results: Vec<InstallResult>,
}

impl InstallReport {
    pub fn new(results: Vec<InstallResult>) -> Self {
        InstallReport { results: results }
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(InstallResult::is_success)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn need_completion_counts_as_success_but_is_flagged() {
        let result = InstallResult::new("ecu1".into(), InstallCode::NEED_COMPLETION, "reboot required".into());
        assert!(result.is_success());
        assert!(result.result_code.needs_completion());
    }

    #[test]
    fn install_code_round_trips_through_string() {
        assert_eq!(InstallCode::VERIFICATION_FAILED, "VERIFICATION_FAILED".parse().unwrap());
        assert_eq!(InstallCode::OK, "0".parse().unwrap());
    }
}
