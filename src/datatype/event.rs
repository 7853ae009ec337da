use datatype::{EcuSerial, Error, Target};


/// The outcome of a `CheckUpdates` pass (spec section 4.5).
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum UpdateCheck {
    UpdatesAvailable(Vec<Target>),
    NoUpdatesAvailable,
    Error(String),
}

/// The outcome of a full phase (download-all, install-all), carrying how
/// many of the attempted items succeeded.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct PhaseResult {
    pub attempted: usize,
    pub succeeded: usize,
}

/// Every event the bus of spec section 4.7 may publish, one variant per
/// phase completion plus progress notifications. Subscribers see these in
/// publish order and only from the moment they subscribe.
#[derive(PartialEq, Debug, Clone)]
pub enum Event {
    UpdateCheckComplete(UpdateCheck),

    DownloadProgressReport(Target, u32),
    DownloadTargetComplete(Target, bool),
    AllDownloadsComplete(PhaseResult),

    InstallStarted(EcuSerial),
    InstallTargetComplete(EcuSerial, bool),
    AllInstallsComplete(PhaseResult),

    PutManifestComplete(bool),
}

impl<'a> From<&'a Error> for UpdateCheck {
    fn from(err: &'a Error) -> UpdateCheck {
        UpdateCheck::Error(err.to_string())
    }
}
