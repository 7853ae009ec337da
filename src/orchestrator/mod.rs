//! The Check → Download → Install → Report state machine of spec section
//! 4.5, grounded on the client's own `interpreter::EventInterpreter` for
//! event-driven phase sequencing and `uptane::Uptane` for the per-cycle
//! Director/Image workflow.

use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;
use url::Url;

use crypto;
use datatype::{Config, EcuManifest, EcuSerial, Error, Event, HardwareIdentifier, InstallCode,
               InstallOutcome, InstallResult, Manifest, PhaseResult, RepositoryId, Role,
               RunningMode, Target, UpdateCheck};
use events::Bus;
use fetcher::{FetchOutcome, Fetcher};
use http::{Client, Response};
use keymanager::KeyManager;
use pacman::{Bootloader, PackageManagerOps};
use reconciler::{self, Assignment};
use secondary::{MetaBundle, SecondaryInterface};
use trust_store::{InstalledMode, TrustStore};


/// Drives one device through Check → Download → Install → Report (spec
/// section 4.5). Holds no state of its own beyond the current cycle's
/// per-ECU install results; everything durable lives in the trust store.
pub struct Orchestrator<'a, C: 'a + Client> {
    config:       &'a Config,
    client:       &'a C,
    store:        &'a TrustStore,
    keys:         &'a KeyManager,
    bus:          &'a Bus,
    pacman:       &'a PackageManagerOps,
    bootloader:   Bootloader,
    secondaries:  HashMap<EcuSerial, Box<SecondaryInterface>>,
    last_results: Mutex<HashMap<EcuSerial, InstallResult>>,
}

impl<'a, C: Client> Orchestrator<'a, C> {
    pub fn new(config: &'a Config, client: &'a C, store: &'a TrustStore, keys: &'a KeyManager,
               bus: &'a Bus, pacman: &'a PackageManagerOps,
               secondaries: HashMap<EcuSerial, Box<SecondaryInterface>>) -> Self {
        Orchestrator {
            config: config,
            client: client,
            store: store,
            keys: keys,
            bus: bus,
            pacman: pacman,
            bootloader: Bootloader::new(&config.bootloader),
            secondaries: secondaries,
            last_results: Mutex::new(HashMap::new()),
        }
    }

    /// One-shot ECU registration (`POST /director/ecus`, spec section 6):
    /// tells the Director about the Primary and every configured
    /// Secondary, then mirrors the same set into the trust store's `ecu`
    /// table so `reconciler::reconcile` recognizes them. Idempotent: a
    /// no-op once the Primary is already registered.
    pub fn register_ecus(&self) -> Result<(), Error> {
        let primary_serial = EcuSerial(self.config.provision.primary_ecu_serial.clone());
        if self.store.is_registered(&primary_serial)? {
            return Ok(());
        }
        let primary_hwid = HardwareIdentifier(self.config.provision.primary_ecu_hardware_id.clone());

        let mut ecus = vec![json!({
            "ecu_serial": primary_serial.0,
            "hardware_identifier": primary_hwid.0,
            "clientKey": self.keys.uptane_public_key(),
        })];
        let mut registrations = vec![(primary_serial.clone(), primary_hwid.clone(), true)];

        for (serial, secondary) in &self.secondaries {
            let hwid = secondary.get_hardware_id()?;
            let key = secondary.get_public_key()?;
            ecus.push(json!({
                "ecu_serial": serial.0,
                "hardware_identifier": hwid.0,
                "clientKey": key,
            }));
            registrations.push((serial.clone(), hwid, false));
        }

        let body = json!({ "primary_ecu_serial": primary_serial.0, "ecus": ecus });
        let base: Url = self.config.uptane.director_server.parse().map_err(Error::from)?;
        let url = base.join(&self.config.provision.ecu_registration_endpoint).map_err(Error::from)?;
        match self.client.post(url, Some(::serde_json::to_vec(&body)?)).recv() {
            Some(Response::Success(_))   => (),
            Some(Response::Failed(data)) => return Err(Error::Client(format!("ecu registration returned {}", data.code))),
            Some(Response::Error(err))   => return Err(err),
            None => return Err(Error::Client("no response registering ecus".into())),
        }

        for (serial, hwid, is_primary) in registrations {
            self.store.register_ecu(&serial, &hwid, is_primary)?;
        }
        Ok(())
    }

    /// Run one cycle, stopping at the phase named by the configured
    /// running mode (spec section 4.5 "Running modes"). A reboot sentinel
    /// left over from a `NeedCompletion` install short-circuits straight
    /// past Check (spec section 9 scenario 4). Once the sentinel clears,
    /// the first cycle to see no new updates still finalizes: the pending
    /// install is promoted to current and a completion manifest reported.
    pub fn run_cycle(&self) -> Result<(), Error> {
        if self.bootloader.reboot_pending() {
            info!("reboot sentinel present, skipping check until cleared");
            return Ok(());
        }

        let finalizing = self.store.has_pending_install()?;

        let assignments = match self.check()? {
            None => {
                if finalizing {
                    self.store.promote_pending_installs()?;
                    return self.report();
                }
                return Ok(());
            }
            Some(assignments) => assignments,
        };
        if finalizing {
            self.store.promote_pending_installs()?;
        }

        if self.config.uptane.running_mode == RunningMode::Check {
            return Ok(());
        }
        if assignments.is_empty() {
            return self.report();
        }

        let targets: Vec<Target> = assignments.iter().map(|a| a.target.clone()).collect();
        let downloaded = self.download(&targets)?;
        if self.config.uptane.running_mode == RunningMode::Download {
            return Ok(());
        }

        self.install(&assignments, &downloaded)?;
        if self.config.uptane.running_mode == RunningMode::Install {
            return Ok(());
        }

        self.report()
    }

    /// `CheckUpdates` (spec section 4.5): fetch both repositories, then
    /// reconcile. Returns `None` when nothing is outstanding, `Some([])`
    /// when the check ran but produced no outstanding assignments. Any
    /// propagated error is published as `UpdateCheck::Error` before it
    /// surfaces to the caller (spec section 4.5/7: every terminal failure
    /// gets an emitted event).
    fn check(&self) -> Result<Option<Vec<Assignment>>, Error> {
        self.check_uncaught().map_err(|err| {
            self.bus.publish(Event::UpdateCheckComplete(UpdateCheck::from(&err)));
            err
        })
    }

    fn check_uncaught(&self) -> Result<Option<Vec<Assignment>>, Error> {
        let director_base: Url = self.config.uptane.director_server.parse().map_err(Error::from)?;
        let image_base: Url = self.config.uptane.repo_server.parse().map_err(Error::from)?;

        let director = Fetcher::new(self.client, self.store, director_base, RepositoryId::Director);
        let image = Fetcher::new(self.client, self.store, image_base, RepositoryId::Image);

        let embedded_director = self.embedded_root("director")?;
        let embedded_image = self.embedded_root("image")?;

        let director_outcome = director.update_meta(&embedded_director)?;
        let image_outcome = image.update_meta(&embedded_image)?;

        let (director_targets, image_targets) = match (director_outcome, image_outcome) {
            (FetchOutcome::Unchanged, FetchOutcome::Unchanged) => {
                self.bus.publish(Event::UpdateCheckComplete(UpdateCheck::NoUpdatesAvailable));
                return Ok(None);
            }
            (FetchOutcome::Updated { targets: dt, .. }, FetchOutcome::Updated { targets: it, .. }) => {
                (dt.targets.unwrap_or_default(), it.targets.unwrap_or_default())
            }
            _ => {
                self.bus.publish(Event::UpdateCheckComplete(UpdateCheck::NoUpdatesAvailable));
                return Ok(Some(Vec::new()));
            }
        };

        let assignments = reconciler::reconcile(&director_targets, &image_targets, self.store)?;
        if assignments.is_empty() {
            self.bus.publish(Event::UpdateCheckComplete(UpdateCheck::NoUpdatesAvailable));
        } else {
            let targets = assignments.iter().map(|a| a.target.clone()).collect();
            self.bus.publish(Event::UpdateCheckComplete(UpdateCheck::UpdatesAvailable(targets)));
        }
        Ok(Some(assignments))
    }

    /// The bootstrap Root used when the trust store has none yet: a
    /// `root.json` shipped alongside the cached metadata at provisioning
    /// time (spec section 4.2 "bootstraps trust on a fresh device").
    fn embedded_root(&self, repo: &str) -> Result<Vec<u8>, Error> {
        let path = format!("{}/{}-root.json", self.config.uptane.metadata_path, repo);
        Ok(fs::read(&path)?)
    }

    /// `Download(targets)` (spec section 4.5): fetch each target's binary,
    /// verify its hash incrementally, store it content-addressed. One
    /// failing target does not abort the others.
    fn download(&self, targets: &[Target]) -> Result<HashMap<String, Vec<u8>>, Error> {
        let mut succeeded = HashMap::new();
        let mut attempted = 0;
        let mut ok = 0;

        for target in targets {
            attempted += 1;
            let hash = match target.sha256() {
                Some(h) => h.clone(),
                None => { self.bus.publish(Event::DownloadTargetComplete(target.clone(), false)); continue; }
            };

            let result = self.download_one(target, &hash);
            let success = result.is_ok();
            if let Ok(bytes) = result {
                succeeded.insert(hash, bytes);
                ok += 1;
            }
            self.bus.publish(Event::DownloadTargetComplete(target.clone(), success));
        }

        self.bus.publish(Event::AllDownloadsComplete(PhaseResult { attempted: attempted, succeeded: ok }));
        Ok(succeeded)
    }

    fn download_one(&self, target: &Target, hash: &str) -> Result<Vec<u8>, Error> {
        if let Some(bytes) = self.store.get_target_blob(hash)? {
            return Ok(bytes);
        }

        let base: Url = self.config.uptane.repo_server.parse().map_err(Error::from)?;
        let url = base.join(&format!("targets/{}", hash)).map_err(Error::from)?;
        let bytes = match self.client.get(url, None).recv() {
            Some(Response::Success(data)) => data.body,
            Some(Response::Failed(data))  => return Err(Error::Client(format!("download returned {}", data.code))),
            Some(Response::Error(err))    => return Err(err),
            None => return Err(Error::Client("no response downloading target".into())),
        };

        if bytes.len() as u64 != target.length {
            return Err(Error::TargetMismatch(format!("{} has length {}, expected {}", hash, bytes.len(), target.length)));
        }
        if crypto::sha256_hex(&bytes) != *hash {
            return Err(Error::TargetMismatch(format!("{} failed sha256 verification", hash)));
        }

        self.store.add_target_blob(hash, &bytes)?;
        self.bus.publish(Event::DownloadProgressReport(target.clone(), 100));
        Ok(bytes)
    }

    /// `Install(targets)` (spec section 4.5): dispatch the Primary's own
    /// targets to the package manager, everyone else's to their Secondary.
    /// A `NeedCompletion` outcome marks the reboot sentinel so the next
    /// startup skips straight to Reporting once it clears.
    fn install(&self, assignments: &[Assignment], downloaded: &HashMap<String, Vec<u8>>) -> Result<(), Error> {
        let mut attempted = 0;
        let mut ok = 0;

        let needs_secondary = assignments.iter().any(|a| self.secondaries.contains_key(&a.ecu_serial));
        let meta = if needs_secondary { Some(self.meta_bundle()?) } else { None };

        for assignment in assignments {
            attempted += 1;
            self.bus.publish(Event::InstallStarted(assignment.ecu_serial.clone()));

            let image = assignment.target.sha256().and_then(|hash| downloaded.get(hash));
            let outcome = match image {
                None => InstallOutcome::new(InstallCode::NOT_FOUND, "target was not downloaded".into()),
                Some(bytes) => self.install_one(assignment, bytes, meta.as_ref()),
            };

            let success = outcome.code.is_success();
            if outcome.code.needs_completion() {
                self.bootloader.mark_reboot_pending()?;
            }
            if success {
                let mode = if outcome.code.needs_completion() { InstalledMode::Pending } else { InstalledMode::Current };
                self.store.set_installed_version(&assignment.ecu_serial, &assignment.filename, mode)?;
                ok += 1;
            }

            let result = outcome.into_result(assignment.ecu_serial.0.clone());
            self.last_results.lock()?.insert(assignment.ecu_serial.clone(), result);
            self.bus.publish(Event::InstallTargetComplete(assignment.ecu_serial.clone(), success));
        }

        self.bus.publish(Event::AllInstallsComplete(PhaseResult { attempted: attempted, succeeded: ok }));
        Ok(())
    }

    /// The six role files a Secondary needs to verify a Targets assignment
    /// on its own (spec section 4.6 `put_metadata`), read back from what
    /// `check()` just cached in the trust store.
    fn meta_bundle(&self) -> Result<MetaBundle, Error> {
        let role = |repo, r: &Role| -> Result<Vec<u8>, Error> {
            self.store.get_latest_meta(repo, r)?
                .map(|(_, raw)| raw)
                .ok_or_else(|| Error::Secondary(format!("no cached {} {} to propagate", repo, r)))
        };
        Ok(MetaBundle {
            image_root:       role(RepositoryId::Image, &Role::Root)?,
            image_targets:    role(RepositoryId::Image, &Role::Targets)?,
            image_snapshot:   role(RepositoryId::Image, &Role::Snapshot)?,
            image_timestamp:  role(RepositoryId::Image, &Role::Timestamp)?,
            director_root:    role(RepositoryId::Director, &Role::Root)?,
            director_targets: role(RepositoryId::Director, &Role::Targets)?,
        })
    }

    fn install_one(&self, assignment: &Assignment, image: &[u8], meta: Option<&MetaBundle>) -> InstallOutcome {
        if let Some(secondary) = self.secondaries.get(&assignment.ecu_serial) {
            if let Some(bundle) = meta {
                if let Err(err) = secondary.put_metadata(bundle) {
                    return InstallOutcome::new(InstallCode::INSTALL_FAILED, format!("put_metadata failed: {}", err));
                }
            }
            match secondary.send_firmware(image) {
                Ok(true)  => InstallOutcome::ok("installed on secondary".into()),
                Ok(false) => InstallOutcome::new(InstallCode::INSTALL_FAILED, "secondary reported failure".into()),
                Err(err)  => InstallOutcome::new(InstallCode::INSTALL_FAILED, err.to_string()),
            }
        } else {
            self.pacman.install(&assignment.target, image)
        }
    }

    /// Reporting (spec section 4.5): build and sign the Manifest, `PUT` it
    /// to the Director.
    fn report(&self) -> Result<(), Error> {
        let primary_serial = EcuSerial(self.config.provision.primary_ecu_serial.clone());
        let mut manifest = Manifest::new(primary_serial.clone());
        let results = self.last_results.lock()?;

        let installed = self.pacman.get_current()?;
        manifest.insert(EcuManifest::new(primary_serial.clone(), installed, results.get(&primary_serial).cloned()));

        for (serial, secondary) in &self.secondaries {
            let target = self.store.get_current_version(serial)?.map(|filename| Target {
                length: 0,
                hashes: HashMap::new(),
                custom: Some(::datatype::TargetCustom { ecu_identifiers: HashMap::new(), uri: Some(filename) }),
            });
            let mut ecu_manifest = EcuManifest::new(serial.clone(), target, results.get(serial).cloned());
            match secondary.get_manifest() {
                Ok(signed) => ecu_manifest = ecu_manifest.with_signed_manifest(signed),
                Err(err) => debug!("{} did not report its own manifest: {}", serial, err),
            }
            manifest.insert(ecu_manifest);
        }
        drop(results);

        let signed = self.keys.sign_json(manifest.body())?;
        let base: Url = self.config.uptane.director_server.parse().map_err(Error::from)?;
        let url = base.join("director/manifest").map_err(Error::from)?;
        let body = ::serde_json::to_vec(&signed)?;

        let success = match self.client.put(url, Some(body)).recv() {
            Some(Response::Success(_)) => true,
            Some(Response::Failed(_))  => false,
            Some(Response::Error(err)) => return Err(err),
            None => false,
        };
        self.bus.publish(Event::PutManifestComplete(success));
        Ok(())
    }
}
