use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const PROJECT_DIR: &str = ".dayplan";
const STORE_FILE: &str = "planner.yml";

/// String key/value persistence for settings, block states and hour notes.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Project,
    Global,
    Explicit,
}

impl StoreScope {
    pub fn label(&self) -> &'static str {
        match self {
            StoreScope::Project => "project",
            StoreScope::Global => "global",
            StoreScope::Explicit => "explicit",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub scope: StoreScope,
}

/// YAML-backed store. Every mutation is written through to disk.
#[derive(Debug)]
pub struct FileStore {
    location: StoreLocation,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open(location: StoreLocation) -> Result<Self> {
        let entries = if location.path.exists() {
            let data = fs::read_to_string(&location.path)
                .with_context(|| format!("reading {:?}", location.path))?;
            if data.trim().is_empty() {
                BTreeMap::new()
            } else {
                match serde_yaml::from_str(&data) {
                    Ok(entries) => entries,
                    Err(err) => recover_unreadable(&location.path, &err)?,
                }
            }
        } else {
            BTreeMap::new()
        };
        tracing::debug!(path = ?location.path, entries = entries.len(), "opened store");
        Ok(FileStore { location, entries })
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    fn flush(&self) -> Result<()> {
        let path = &self.location.path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
        }
        let serialized =
            serde_yaml::to_string(&self.entries).context("serializing planner store")?;
        fs::write(path, serialized).with_context(|| format!("writing {:?}", path))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Moves an unparseable store aside so the planner can start empty without
/// overwriting the user's data on the next write.
fn recover_unreadable(path: &Path, err: &serde_yaml::Error) -> Result<BTreeMap<String, String>> {
    let backup = path.with_extension("yml.bak");
    fs::copy(path, &backup).with_context(|| format!("backing up {:?}", path))?;
    tracing::warn!(
        path = ?path,
        backup = ?backup,
        error = %err,
        "planner store is unreadable, starting empty"
    );
    Ok(BTreeMap::new())
}

pub fn init_project_store(dir: &Path) -> Result<StoreLocation> {
    let store_dir = dir.join(PROJECT_DIR);
    fs::create_dir_all(&store_dir).context("failed to create .dayplan directory")?;
    let path = store_dir.join(STORE_FILE);
    if !path.exists() {
        fs::write(&path, "{}\n").with_context(|| format!("writing {:?}", path))?;
    }
    Ok(StoreLocation {
        path,
        scope: StoreScope::Project,
    })
}

pub fn locate_store(start: &Path, explicit: Option<&Path>) -> Result<StoreLocation> {
    if let Some(path) = explicit {
        return Ok(StoreLocation {
            path: path.to_path_buf(),
            scope: StoreScope::Explicit,
        });
    }
    if let Some(project_path) = find_project_store(start) {
        return Ok(StoreLocation {
            path: project_path,
            scope: StoreScope::Project,
        });
    }
    Ok(StoreLocation {
        path: project_dirs()?.data_dir().join(STORE_FILE),
        scope: StoreScope::Global,
    })
}

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "dayplan").context("locating data directory")
}

fn find_project_store(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_DIR).join(STORE_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}
