//! The repository fetch loop of spec section 4.3: root rotation followed
//! by Timestamp/Snapshot/Targets, short-circuiting when Timestamp is
//! unchanged.

use url::Url;

use datatype::{Campaigns, Error, RepositoryId, Role, RoleData};
use http::Client;
use trust_store::TrustStore;
use verifier;

/// What `update_meta` produced for one repository.
pub enum FetchOutcome {
    Unchanged,
    Updated {
        root:      RoleData,
        timestamp: RoleData,
        snapshot:  RoleData,
        targets:   RoleData,
    },
}

pub struct Fetcher<'a, C: 'a + Client> {
    client: &'a C,
    store:  &'a TrustStore,
    base:   Url,
    repo:   RepositoryId,
}

impl<'a, C: Client> Fetcher<'a, C> {
    pub fn new(client: &'a C, store: &'a TrustStore, base: Url, repo: RepositoryId) -> Self {
        Fetcher { client: client, store: store, base: base, repo: repo }
    }

    fn fetch(&self, path: String) -> Result<Vec<u8>, Error> {
        let url = self.base.join(&path).map_err(Error::from)?;
        match self.client.get(url, None).recv() {
            Some(::http::Response::Success(data)) => Ok(data.body),
            Some(::http::Response::Failed(data))   => Err(Error::Client(format!("{} returned {}", path, data.code))),
            Some(::http::Response::Error(err))     => Err(err),
            None => Err(Error::Client(format!("no response fetching {}", path))),
        }
    }

    fn fetch_optional(&self, path: String) -> Result<Option<Vec<u8>>, Error> {
        let url = self.base.join(&path).map_err(Error::from)?;
        match self.client.get(url, None).recv() {
            Some(::http::Response::Success(data)) => Ok(Some(data.body)),
            Some(::http::Response::Failed(data))
                if data.code == ::hyper::status::StatusCode::NotFound => Ok(None),
            Some(::http::Response::Failed(data)) => Err(Error::Client(format!("{} returned {}", path, data.code))),
            Some(::http::Response::Error(err))   => Err(err),
            None => Err(Error::Client(format!("no response fetching {}", path))),
        }
    }

    /// Root rotation (spec section 4.2/4.3). `embedded_root` bootstraps
    /// trust on a fresh device with no stored Root.
    pub fn update_root(&self, embedded_root: &[u8]) -> Result<RoleData, Error> {
        let stored = self.store.get_latest_meta(self.repo, &Role::Root)?;
        let mut current = match stored {
            Some((_, raw)) => verifier::init_root(self.repo, &raw)?,
            None => {
                let root = verifier::init_root(self.repo, embedded_root)?;
                self.store.put_meta(self.repo, &Role::Root, root.version, embedded_root)?;
                root
            }
        };

        for n in (current.version + 1)..(current.version + 1 + verifier::MAX_ROOT_ROTATIONS) {
            let raw = match self.fetch_optional(format!("{}.root.json", n))? {
                Some(raw) => raw,
                None => break,
            };
            let candidate = verifier::verify_root_rotation(self.repo, &raw, &current, n)?;
            self.store.clear_non_root_meta(self.repo)?;
            self.store.put_meta(self.repo, &Role::Root, n, &raw)?;
            current = candidate;
        }

        if current.is_expired(::chrono::Utc::now()) {
            return Err(::datatype::UptaneError::new(self.repo, Role::Root, ::datatype::UptaneReason::ExpiredMetadata));
        }

        Ok(current)
    }

    /// `update_root` followed by Timestamp/Snapshot/Targets, short
    /// circuiting when Timestamp's version is unchanged (spec section 4.3).
    pub fn update_meta(&self, embedded_root: &[u8]) -> Result<FetchOutcome, Error> {
        let root = self.update_root(embedded_root)?;

        let ts_stored = self.store.get_latest_meta(self.repo, &Role::Timestamp)?;
        let ts_raw = self.fetch(String::from("timestamp.json"))?;
        let ts_version_before = ts_stored.as_ref().map(|&(v, _)| v);
        let timestamp = verifier::verify_role(self.repo, &Role::Timestamp, &ts_raw, &root, ts_version_before)?;

        if let Some(before) = ts_version_before {
            if before == timestamp.version {
                return Ok(FetchOutcome::Unchanged);
            }
        }
        self.store.put_meta(self.repo, &Role::Timestamp, timestamp.version, &ts_raw)?;

        let snap_stored = self.store.get_latest_meta(self.repo, &Role::Snapshot)?.map(|(v, _)| v);
        let snap_raw = self.fetch(String::from("snapshot.json"))?;
        let snapshot = verifier::verify_role(self.repo, &Role::Snapshot, &snap_raw, &root, snap_stored)?;
        verifier::cross_check_hash(self.repo, &Role::Timestamp, &timestamp, "snapshot.json", &snap_raw)?;
        self.store.put_meta(self.repo, &Role::Snapshot, snapshot.version, &snap_raw)?;

        let tgt_stored = self.store.get_latest_meta(self.repo, &Role::Targets)?.map(|(v, _)| v);
        let tgt_raw = self.fetch(String::from("targets.json"))?;
        let targets = verifier::verify_role(self.repo, &Role::Targets, &tgt_raw, &root, tgt_stored)?;
        verifier::cross_check_version(self.repo, &Role::Snapshot, &snapshot, "targets.json", targets.version)?;
        self.store.put_meta(self.repo, &Role::Targets, targets.version, &tgt_raw)?;

        Ok(FetchOutcome::Updated { root: root, timestamp: timestamp, snapshot: snapshot, targets: targets })
    }

    /// `GET /campaigner/campaigns` (spec section 8 scenario 6). Not part
    /// of the Uptane trust chain; parsed but not verified.
    pub fn get_campaigns(&self) -> Result<Campaigns, Error> {
        let url = self.base.join("campaigner/campaigns").map_err(Error::from)?;
        match self.client.get(url, None).recv() {
            Some(::http::Response::Success(data)) => ::serde_json::from_slice(&data.body).map_err(Error::from),
            Some(::http::Response::Failed(data))   => Err(Error::Client(format!("campaigns returned {}", data.code))),
            Some(::http::Response::Error(err))     => Err(err),
            None => Err(Error::Client("no response fetching campaigns".into())),
        }
    }
}
