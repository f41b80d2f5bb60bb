use log::{info, warn};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use super::LocatorResolver;
use crate::error::{RecorderError, Result};

/// group -> (name -> selector)
type ProjectLocators = HashMap<String, HashMap<String, String>>;

/// Reads `<root>/<project>/*.yml` on first use of a project and caches the result.
///
/// Each file is a YAML map of groups:
/// ```yaml
/// login:
///   username: "#user"
///   submit: "css=button[type=submit]"
/// ```
pub struct LocatorStore {
    root: PathBuf,
    cache: RwLock<HashMap<String, Arc<ProjectLocators>>>,
}

impl LocatorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// All groups of a project, loading them if needed.
    ///
    /// `project` must be a single folder name under the root. Files are read
    /// without holding the cache lock; a project whose folder does not exist
    /// resolves to no groups and is not cached.
    pub fn project(&self, project: &str) -> Result<Arc<ProjectLocators>> {
        check_project_name(project)?;
        if let Some(cached) = self.cached(project) {
            return Ok(cached);
        }

        let Some(loaded) = load_project(&self.root.join(project))? else {
            return Ok(Arc::new(ProjectLocators::new()));
        };

        let mut cache = self
            .cache
            .write()
            .map_err(|_| RecorderError::InvalidConfiguration("locator cache poisoned".into()))?;
        // Another caller may have loaded it in the meantime; keep the first copy
        let entry = cache
            .entry(project.to_string())
            .or_insert_with(|| Arc::new(loaded));
        Ok(entry.clone())
    }

    fn cached(&self, project: &str) -> Option<Arc<ProjectLocators>> {
        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.get(project).cloned())
    }
}

impl LocatorResolver for LocatorStore {
    fn resolve(&self, project: &str, group: &str, name: &str) -> Result<String> {
        let locators = self.project(project)?;
        let group_map = locators.get(group).ok_or_else(|| {
            RecorderError::InvalidConfiguration(format!("Locator group not found: {}", group))
        })?;
        let selector = group_map.get(name).ok_or_else(|| {
            RecorderError::InvalidConfiguration(format!("Locator not found: {}", name))
        })?;
        if selector.trim().is_empty() {
            return Err(RecorderError::InvalidConfiguration(format!(
                "Empty selector for locator: {}",
                name
            )));
        }
        Ok(selector.clone())
    }
}

/// Project names address one folder directly below the root
fn check_project_name(project: &str) -> Result<()> {
    let mut components = Path::new(project).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(RecorderError::InvalidConfiguration(format!(
            "Invalid locator project name: {}",
            project
        ))),
    }
}

fn load_project(folder: &Path) -> Result<Option<ProjectLocators>> {
    if !folder.is_dir() {
        warn!("No locator folder at {}", folder.display());
        return Ok(None);
    }
    let mut groups = ProjectLocators::new();

    let entries = std::fs::read_dir(folder).map_err(|e| {
        RecorderError::InvalidConfiguration(format!(
            "Cannot read locators in {}: {}",
            folder.display(),
            e
        ))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == "yml" || ext == "yaml"))
        .collect();
    files.sort();

    for path in files {
        load_file(&path, &mut groups)?;
    }
    Ok(Some(groups))
}

fn load_file(path: &Path, groups: &mut ProjectLocators) -> Result<()> {
    let invalid = |msg: String| RecorderError::InvalidConfiguration(msg);

    let content = std::fs::read_to_string(path)
        .map_err(|e| invalid(format!("Cannot read {}: {}", path.display(), e)))?;
    let doc: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|e| invalid(format!("Invalid YAML in {}: {}", path.display(), e)))?;

    let serde_yaml::Value::Mapping(map) = doc else {
        return Err(invalid(format!(
            "Invalid locator structure in {}",
            path.display()
        )));
    };

    for (group, content) in map {
        let mut values = HashMap::new();
        if let serde_yaml::Value::Mapping(entries) = content {
            for (name, selector) in entries {
                if let Some(name) = yaml_scalar(&name) {
                    values.insert(name, yaml_scalar(&selector).unwrap_or_default());
                }
            }
        }
        if let Some(group) = yaml_scalar(&group) {
            groups.insert(group, values);
        }
    }

    info!("Loaded locators from {}", path.display());
    Ok(())
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
