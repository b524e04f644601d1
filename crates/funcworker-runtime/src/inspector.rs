//! Parameter-name discovery.
//!
//! Handler signatures carry shapes only. A [`SchemaInspector`] supplies the
//! names: which parameter is `req`, which is `outBlob`, and which results are
//! named. Names are matched against host binding names at load time.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use funcworker_protocol::RpcFunctionMetadata;
use serde::Deserialize;
use tracing::debug;

use crate::error::LoadError;
use crate::handler::entry_point;

/// Manifest file name used when the host does not give a script file.
pub const MANIFEST_FILE: &str = "function.toml";

/// Marks an anonymous result in a manifest.
pub const ANONYMOUS_RESULT: &str = "_";

/// Ordered parameter names and ordered, optionally named, results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSite {
    pub params: Vec<String>,
    pub results: Vec<Option<String>>,
}

impl CallSite {
    pub fn new(params: &[&str], results: &[Option<&str>]) -> Self {
        Self {
            params: params.iter().map(|p| p.to_string()).collect(),
            results: results.iter().map(|r| r.map(str::to_string)).collect(),
        }
    }
}

/// Provides the [`CallSite`] for a function about to be loaded.
pub trait SchemaInspector: Send + Sync {
    fn inspect(&self, metadata: &RpcFunctionMetadata) -> Result<CallSite, LoadError>;
}

/// Call sites registered in code.
#[derive(Debug, Default)]
pub struct StaticInspector {
    sites: HashMap<(String, String), CallSite>,
}

impl StaticInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        entry_point: impl Into<String>,
        site: CallSite,
    ) -> &mut Self {
        self.sites.insert((name.into(), entry_point.into()), site);
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(
        mut self,
        name: impl Into<String>,
        entry_point: impl Into<String>,
        site: CallSite,
    ) -> Self {
        self.register(name, entry_point, site);
        self
    }
}

impl SchemaInspector for StaticInspector {
    fn inspect(&self, metadata: &RpcFunctionMetadata) -> Result<CallSite, LoadError> {
        let entry_point = entry_point(metadata);
        self.sites
            .get(&(metadata.name.clone(), entry_point.to_string()))
            .cloned()
            .ok_or_else(|| LoadError::unknown_entry_point(entry_point, &metadata.name))
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    #[serde(default)]
    params: Vec<String>,
    #[serde(default)]
    results: Vec<String>,
}

/// Reads call sites from a TOML manifest next to the function.
///
/// ```toml
/// [Run]
/// params = ["ctx", "req", "inBlob", "outBlob"]
/// results = ["_"]
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestInspector;

impl ManifestInspector {
    /// Path of the manifest for `metadata`.
    pub fn manifest_path(metadata: &RpcFunctionMetadata) -> PathBuf {
        let file = if metadata.script_file.is_empty() {
            MANIFEST_FILE
        } else {
            &metadata.script_file
        };
        Path::new(&metadata.directory).join(file)
    }

    fn parse(path: &Path, text: &str, entry_point: &str) -> Result<CallSite, LoadError> {
        let entries: BTreeMap<String, ManifestEntry> =
            toml::from_str(text).map_err(|source| LoadError::ManifestParse {
                path: path.to_path_buf(),
                source,
            })?;

        let entry = entries
            .get(entry_point)
            .ok_or_else(|| LoadError::unknown_entry_point(entry_point, path.display().to_string()))?;

        Ok(CallSite {
            params: entry.params.clone(),
            results: entry
                .results
                .iter()
                .map(|name| (name != ANONYMOUS_RESULT).then(|| name.clone()))
                .collect(),
        })
    }
}

impl SchemaInspector for ManifestInspector {
    fn inspect(&self, metadata: &RpcFunctionMetadata) -> Result<CallSite, LoadError> {
        let path = Self::manifest_path(metadata);
        debug!(path = %path.display(), "reading function manifest");
        let text = std::fs::read_to_string(&path).map_err(|source| LoadError::ManifestRead {
            path: path.clone(),
            source,
        })?;
        Self::parse(&path, &text, entry_point(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(dir: &Path, script_file: &str, entry_point: &str) -> RpcFunctionMetadata {
        RpcFunctionMetadata {
            name: "HttpTriggerBlobBindings".to_string(),
            directory: dir.display().to_string(),
            script_file: script_file.to_string(),
            entry_point: entry_point.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn reads_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            "[Run]\nparams = [\"ctx\", \"req\", \"inBlob\", \"outBlob\"]\nresults = [\"_\", \"err\"]\n",
        )
        .unwrap();

        let site = ManifestInspector.inspect(&metadata(dir.path(), "", "Run")).unwrap();
        assert_eq!(site.params, vec!["ctx", "req", "inBlob", "outBlob"]);
        assert_eq!(site.results, vec![None, Some("err".to_string())]);
    }

    #[test]
    fn custom_script_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("queue.toml"), "[Main]\nparams = [\"msg\"]\n").unwrap();

        let site = ManifestInspector
            .inspect(&metadata(dir.path(), "queue.toml", "Main"))
            .unwrap();
        assert_eq!(site, CallSite::new(&["msg"], &[]));
    }

    #[test]
    fn missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = ManifestInspector
            .inspect(&metadata(dir.path(), "", "Run"))
            .unwrap_err();
        assert!(matches!(err, LoadError::ManifestRead { .. }));
    }

    #[test]
    fn unparsable_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "[Run\nparams = ").unwrap();
        let err = ManifestInspector
            .inspect(&metadata(dir.path(), "", "Run"))
            .unwrap_err();
        assert!(matches!(err, LoadError::ManifestParse { .. }));
    }

    #[test]
    fn unknown_entry_point() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "[Run]\nparams = []\n").unwrap();
        let err = ManifestInspector
            .inspect(&metadata(dir.path(), "", "Other"))
            .unwrap_err();
        assert!(matches!(err, LoadError::UnknownEntryPoint { ref entry_point, .. } if entry_point == "Other"));
    }

    #[test]
    fn static_inspector() {
        let inspector = StaticInspector::new().with(
            "HttpTriggerBlobBindings",
            "Run",
            CallSite::new(&["req"], &[Some("outBlob")]),
        );
        let dir = Path::new("/unused");
        let site = inspector.inspect(&metadata(dir, "", "")).unwrap();
        assert_eq!(site.results, vec![Some("outBlob".to_string())]);
        assert!(inspector.inspect(&metadata(dir, "", "Main")).is_err());
    }
}
