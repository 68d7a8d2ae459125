//! Build a registry from a JSON mount table.
//!
//! ```json
//! { "mounts": [
//!     { "type": "memory", "prefix": "/mem", "files": { "/mem/a.txt": "hi" } },
//!     { "type": "host", "prefix": "/sd", "root": "./sdcard", "name": "sd" } ],
//!   "search": "sd" }
//! ```
//!
//! Mounts are registered in order, so an earlier prefix shadows a later one.
//! Without `search` the last memory mount answers directory searches.

use anyhow::Context;
use ap_vfs::{msg2err, BackendId, Error, Registry};
use ap_vfs_host::HostFs;
use ap_vfs_memory::MemoryFs;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One backend of the mount table.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Mount {
    /// Read-only blobs.  `files` maps names to text, `load` maps names to host files.
    Memory {
        prefix: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        files: BTreeMap<String, String>,
        #[serde(default)]
        load: BTreeMap<String, PathBuf>,
    },
    /// A host directory.
    Host {
        prefix: String,
        root: PathBuf,
        #[serde(default)]
        readonly: bool,
        #[serde(default)]
        name: Option<String>,
    },
}

impl Mount {
    pub fn prefix(&self) -> &str {
        match self {
            Mount::Memory { prefix, .. } | Mount::Host { prefix, .. } => prefix,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountTable {
    #[serde(default)]
    pub mounts: Vec<Mount>,
    /// The name of the backend for directory searches.
    #[serde(default)]
    pub search: Option<String>,
    /// Relative host paths are resolved against this directory.
    #[serde(skip)]
    base: PathBuf,
}

/// Blobs live as long as the process, like data in flash.
fn leak(data: Vec<u8>) -> &'static [u8] {
    Box::leak(data.into_boxed_slice())
}

impl MountTable {
    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| msg2err!(e))
    }

    /// Read a table from disk.  Relative paths in it are relative to the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        log::debug!("loading mount table {}", path.display());
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let mut table = Self::from_json(&text).with_context(|| format!("parsing {}", path.display()))?;
        table.base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(table)
    }

    fn host_path(&self, path: &Path) -> PathBuf {
        self.base.join(path)
    }

    fn memory(
        &self,
        prefix: &str,
        name: Option<&str>,
        files: &BTreeMap<String, String>,
        load: &BTreeMap<String, PathBuf>,
    ) -> Result<MemoryFs, Error> {
        let fs = MemoryFs::with_name(prefix, name.unwrap_or(ap_vfs_memory::NAME));
        for (path, text) in files {
            fs.add(path, leak(text.as_bytes().to_vec()))?;
        }
        for (path, file) in load {
            let file = self.host_path(file);
            let data = std::fs::read(&file).with_context(|| format!("loading {} for {path}", file.display()))?;
            fs.add(path, leak(data))?;
        }
        Ok(fs)
    }

    /// Create the backends and register them in order.
    pub fn compose(&self) -> Result<Registry, Error> {
        let mut registry = Registry::new();
        let mut last_memory: Option<BackendId> = None;
        for mount in &self.mounts {
            match mount {
                Mount::Memory { prefix, name, files, load } => {
                    let fs = self.memory(prefix, name.as_deref(), files, load)?;
                    last_memory = Some(registry.add(Arc::new(fs)));
                }
                Mount::Host { prefix, root, readonly, name } => {
                    let mut fs = HostFs::new(prefix, self.host_path(root)).readonly(*readonly);
                    if let Some(name) = name {
                        fs = fs.with_name(name);
                    }
                    registry.add(Arc::new(fs));
                }
            }
        }
        let search = match &self.search {
            Some(name) => {
                let id = registry.resolve_by_name(name).ok_or_else(|| msg2err!(format!("no mount named {name}")))?;
                Some(id)
            }
            None => last_memory,
        };
        if let Some(id) = search {
            registry.set_default_backend(id);
        }
        Ok(registry)
    }

    /// Compose and install as the process-wide registry of `ap_vfs_posix`.
    pub fn install(&self) -> Result<(), Error> {
        let registry = self.compose()?;
        log::info!("installing {} mounts", self.mounts.len());
        ap_vfs_posix::install(registry);
        Ok(())
    }
}
