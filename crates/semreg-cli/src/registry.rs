//! On-disk registry layout used by the CLI.
//!
//! ```text
//! <data-dir>/
//!   directory.json             advertisement records + index entries
//!   directory-changelog.json   every record / index mutation
//!   requests.json              requests defined with `semreg define-request`
//! ```

use anyhow::{Context, Result};
use semreg_directory::{DirectoryConfig, FileDirectory};
use semreg_match::{Coordinator, EngineConfig, PassEvent, RequestOutcome};
use semreg_profile::{FunctionalProfile, ProfileDocument};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const REQUESTS_FILE: &str = "requests.json";

pub struct Registry {
    data_dir: PathBuf,
    coordinator: Coordinator,
}

impl Registry {
    pub fn open(config: EngineConfig, data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;
        let directory = FileDirectory::open(DirectoryConfig::in_dir(data_dir))
            .with_context(|| format!("opening directory in {}", data_dir.display()))?;

        let mut coordinator = Coordinator::new(config, Arc::new(directory));
        coordinator.on_event(Box::new(|event| {
            if let PassEvent::CandidateSkipped {
                candidate, reason, ..
            } = event
            {
                eprintln!("  skipped {candidate}: {reason}");
            }
        }));

        let registry = Self {
            data_dir: data_dir.to_path_buf(),
            coordinator,
        };
        let requests = registry.load_requests()?;
        tracing::debug!(
            data_dir = %data_dir.display(),
            requests = requests.len(),
            "registry opened"
        );
        registry.coordinator.restore_requests(requests);
        Ok(registry)
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Define one request and persist the request list straight away, so
    /// `requests.json` covers every request the index has entries for.
    pub async fn define_request(&self, request: FunctionalProfile) -> Result<RequestOutcome> {
        let outcome = self.coordinator.on_request_defined(request).await?;
        self.save_requests()?;
        Ok(outcome)
    }

    fn requests_path(&self) -> PathBuf {
        self.data_dir.join(REQUESTS_FILE)
    }

    fn load_requests(&self) -> Result<Vec<FunctionalProfile>> {
        let path = self.requests_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&path)?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save_requests(&self) -> Result<()> {
        let requests = self.coordinator.defined_requests();
        let json = serde_json::to_string_pretty(&requests)?;
        std::fs::write(self.requests_path(), json)?;
        Ok(())
    }
}

/// Read profile documents from files, or from every `.json` file under a
/// directory.
pub fn read_profiles(paths: &[PathBuf]) -> Result<Vec<FunctionalProfile>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                let is_json = entry.path().extension().and_then(|e| e.to_str()) == Some("json");
                if entry.file_type().is_file() && is_json {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }

    files
        .iter()
        .map(|file| {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let doc = ProfileDocument::from_json(&text)
                .with_context(|| format!("parsing {}", file.display()))?;
            FunctionalProfile::try_from(doc).with_context(|| format!("validating {}", file.display()))
        })
        .collect()
}
