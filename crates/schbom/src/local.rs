use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use path_slash::PathExt;
use schbom_core::{FetchError, Repository};
use serde_json::Value;
use walkdir::WalkDir;

/// Suffix of the JSON generated for a design file, stored next to it.
const GENERATED_SUFFIX: &str = ".json";

/// The only ref a working tree can serve.
const WORKING_TREE_REF: &str = "HEAD";

/// A checked-out repository on disk.
///
/// Only the working tree is served, as [`WORKING_TREE_REF`]. Any other ref
/// is an error.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    name: String,
    root: PathBuf,
}

impl LocalRepository {
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", root.display()),
            ));
        }
        let name = root.to_slash_lossy().into_owned();
        Ok(Self { name, root })
    }

    fn check_ref(&self, git_ref: &str) -> Result<(), FetchError> {
        if git_ref == WORKING_TREE_REF {
            return Ok(());
        }
        Err(FetchError::Other(format!(
            "{} is a working tree and cannot be read at ref '{git_ref}'; \
             check out that ref and pass --ref {WORKING_TREE_REF} or omit --ref",
            self.name
        )))
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches(['/', '\\']))
    }
}

fn read(path: &Path, display: &str) -> Result<Vec<u8>, FetchError> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => FetchError::NotFound(display.to_string()),
        _ => FetchError::Other(format!("{display}: {e}")),
    })
}

impl Repository for LocalRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_ref(&self) -> &str {
        WORKING_TREE_REF
    }

    fn generated_json(&self, path: &str, git_ref: &str) -> Result<Value, FetchError> {
        self.check_ref(git_ref)?;
        let design_file = self.resolve(path);
        if !design_file.is_file() {
            return Err(FetchError::NotFound(path.to_string()));
        }

        let mut generated = design_file.into_os_string();
        generated.push(GENERATED_SUFFIX);
        let generated = PathBuf::from(generated);
        if !generated.is_file() {
            return Err(FetchError::NotYetGenerated(path.to_string()));
        }

        let bytes = read(&generated, path)?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Other(format!("{path}: {e}")))
    }

    fn raw_file(&self, path: &str, git_ref: &str) -> Result<Vec<u8>, FetchError> {
        self.check_ref(git_ref)?;
        read(&self.resolve(path), path)
    }

    fn list_files(&self) -> Result<Vec<String>, FetchError> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git");
        for entry in walker {
            let entry = entry.map_err(|e| FetchError::Other(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_slash_lossy();
            // Generated sidecars are not design files.
            if relative.ends_with(GENERATED_SUFFIX) {
                continue;
            }
            files.push(relative.into_owned());
        }
        Ok(files)
    }
}
