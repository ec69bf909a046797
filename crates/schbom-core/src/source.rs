//! Access to the repositories holding design files and the JSON generated
//! for them.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::error::{Error, Result};
use crate::path::{file_name, fold_case, resolve_relative};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The file exists but its JSON has not been generated yet. Retrying
    /// later may succeed.
    #[error("Generated JSON for '{0}' is not ready yet")]
    NotYetGenerated(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Repository error: {0}")]
    Other(String),
}

/// A repository of design files.
pub trait Repository: Send + Sync {
    /// Identifies the repository in logs and in the file listing cache.
    fn name(&self) -> &str;

    fn default_ref(&self) -> &str;

    /// JSON generated for the design file at `path` as of `git_ref`.
    fn generated_json(&self, path: &str, git_ref: &str) -> std::result::Result<Value, FetchError>;

    fn raw_file(&self, path: &str, git_ref: &str) -> std::result::Result<Vec<u8>, FetchError>;

    /// Every file path in the repository, `/`-separated from its root.
    fn list_files(&self) -> std::result::Result<Vec<String>, FetchError>;
}

impl<T: Repository + ?Sized> Repository for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn default_ref(&self) -> &str {
        (**self).default_ref()
    }

    fn generated_json(&self, path: &str, git_ref: &str) -> std::result::Result<Value, FetchError> {
        (**self).generated_json(path, git_ref)
    }

    fn raw_file(&self, path: &str, git_ref: &str) -> std::result::Result<Vec<u8>, FetchError> {
        (**self).raw_file(path, git_ref)
    }

    fn list_files(&self) -> std::result::Result<Vec<String>, FetchError> {
        (**self).list_files()
    }
}

/// How long to wait for generated JSON before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Retry without sleeping in between.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }
}

/// Fetch generated JSON, retrying while the server is still generating it.
pub fn fetch_generated_json(
    repo: &dyn Repository,
    path: &str,
    git_ref: &str,
    policy: &RetryPolicy,
) -> Result<Value> {
    for attempt in 1..=policy.max_attempts {
        match repo.generated_json(path, git_ref) {
            Ok(json) => return Ok(json),
            Err(FetchError::NotYetGenerated(_)) => {
                log::debug!(
                    "JSON for {path} in {} not generated yet (attempt {attempt}/{})",
                    repo.name(),
                    policy.max_attempts
                );
                if attempt < policy.max_attempts && !policy.delay.is_zero() {
                    std::thread::sleep(policy.delay);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::GenerationTimeout {
        path: path.to_string(),
        attempts: policy.max_attempts,
    })
}

/// File listings fetched during one invocation, keyed by repository name.
/// Listings are sorted so lookups over them are deterministic.
#[derive(Debug, Default)]
pub struct FileListingCache {
    listings: HashMap<String, Vec<String>>,
}

impl FileListingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&mut self, repo: &dyn Repository) -> Result<&[String]> {
        let files = match self.listings.entry(repo.name().to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut files = repo.list_files()?;
                files.sort();
                log::debug!("Listed {} files in {}", files.len(), repo.name());
                entry.insert(files)
            }
        };
        Ok(files)
    }
}

/// Where a device sheet was found.
pub struct DeviceSheetLocation<'r> {
    pub repository: &'r dyn Repository,
    pub path: String,
    /// Found in the project's own repository rather than a reuse repository.
    pub in_project: bool,
}

impl std::fmt::Debug for DeviceSheetLocation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSheetLocation")
            .field("repository", &self.repository.name())
            .field("path", &self.path)
            .field("in_project", &self.in_project)
            .finish()
    }
}

/// Locate a device sheet referenced by a project file.
///
/// The path is first resolved against the project file and looked up in the
/// project repository. Failing that, every reuse repository is searched for
/// a file with the same name, in the order given. The first match wins.
pub fn find_device_sheet<'r>(
    device_sheet: &str,
    project_repo: &'r dyn Repository,
    project_file: &str,
    reuse_repos: &[&'r dyn Repository],
    cache: &mut FileListingCache,
) -> Result<DeviceSheetLocation<'r>> {
    let in_project = fold_case(&resolve_relative(device_sheet, project_file));
    if let Some(path) = cache
        .files(project_repo)?
        .iter()
        .find(|f| fold_case(f) == in_project)
    {
        log::info!("Found device sheet {device_sheet} in project repository; using that.");
        return Ok(DeviceSheetLocation {
            repository: project_repo,
            path: path.clone(),
            in_project: true,
        });
    }

    let wanted = fold_case(file_name(device_sheet));
    let mut matches: Vec<(&'r dyn Repository, String)> = Vec::new();
    for &repo in reuse_repos {
        for path in cache.files(repo)? {
            if fold_case(file_name(path)) == wanted {
                matches.push((repo, path.clone()));
            }
        }
    }

    if matches.len() > 1 {
        log::info!(
            "Found {} matches for device sheet {device_sheet}; using the first one.",
            matches.len()
        );
        for (repo, path) in &matches {
            log::debug!("  {}: {path}", repo.name());
        }
    }

    let Some((repository, path)) = matches.into_iter().next() else {
        return Err(Error::DeviceSheetNotFound(device_sheet.to_string()));
    };
    Ok(DeviceSheetLocation {
        repository,
        path,
        in_project: false,
    })
}

/// A repository held entirely in memory.
///
/// Generated JSON can be held back for a number of requests to simulate a
/// server that is still generating it.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    name: String,
    default_ref: String,
    files: BTreeMap<String, Vec<u8>>,
    generated: BTreeMap<String, Value>,
    pending: Mutex<HashMap<String, u32>>,
}

impl InMemoryRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_ref: "main".to_string(),
            ..Default::default()
        }
    }

    pub fn with_default_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.default_ref = git_ref.into();
        self
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    /// Add generated JSON for `path`, creating an empty file there if needed.
    pub fn with_generated_json(mut self, path: impl Into<String>, json: Value) -> Self {
        let path = path.into();
        self.files.entry(path.clone()).or_default();
        self.generated.insert(path, json);
        self
    }

    /// Report `path` as not yet generated for the next `requests` requests.
    pub fn with_pending_generation(self, path: impl Into<String>, requests: u32) -> Self {
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(path.into(), requests);
        }
        self
    }
}

impl Repository for InMemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_ref(&self) -> &str {
        &self.default_ref
    }

    fn generated_json(&self, path: &str, _git_ref: &str) -> std::result::Result<Value, FetchError> {
        if !self.files.contains_key(path) {
            return Err(FetchError::NotFound(path.to_string()));
        }

        let mut pending = self
            .pending
            .lock()
            .map_err(|e| FetchError::Other(e.to_string()))?;
        if let Some(remaining) = pending.get_mut(path).filter(|n| **n > 0) {
            *remaining -= 1;
            return Err(FetchError::NotYetGenerated(path.to_string()));
        }

        self.generated
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotYetGenerated(path.to_string()))
    }

    fn raw_file(&self, path: &str, _git_ref: &str) -> std::result::Result<Vec<u8>, FetchError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(path.to_string()))
    }

    fn list_files(&self) -> std::result::Result<Vec<String>, FetchError> {
        Ok(self.files.keys().cloned().collect())
    }
}
