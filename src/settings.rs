use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Local,
    Flow,
}

/// Webhook endpoints of the remote workflow service, one per operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSettings {
    pub save_record: Option<String>,
    pub get_records: Option<String>,
    pub update_status: Option<String>,
    #[serde(default = "default_list_name")]
    pub list_name: String,
    #[serde(default)]
    pub document_base_url: Option<String>,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            save_record: None,
            get_records: None,
            update_status: None,
            list_name: default_list_name(),
            document_base_url: None,
        }
    }
}

fn default_list_name() -> String {
    "SOW_Records".to_string()
}

fn default_clients() -> Vec<String> {
    ["BSC", "Abiomed", "Cognex", "Itaros"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_created_by() -> String {
    "User".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    pub data_root: String,
    #[serde(default = "default_created_by")]
    pub created_by: String,
    #[serde(default)]
    pub store: StoreKind,
    #[serde(default = "default_clients")]
    pub clients: Vec<String>,
    #[serde(default)]
    pub flow: FlowSettings,
}

impl AppSettings {
    pub fn new(data_root: impl Into<String>) -> Self {
        Self {
            data_root: data_root.into(),
            created_by: default_created_by(),
            store: StoreKind::Local,
            clients: default_clients(),
            flow: FlowSettings::default(),
        }
    }

    /// `data_root` with a leading `~` resolved.
    pub fn root(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "sow-maker", "app") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir).ok();
        }
        return config_dir.join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

/// `None` when no settings file exists yet.
pub fn load_settings_from(path: &Path) -> Result<Option<AppSettings>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<()> {
    let toml_str = toml::to_string_pretty(settings)?;
    fs::write(path, toml_str)?;
    Ok(())
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "data_root = \"/srv/sow\"\n").unwrap();

        let settings = load_settings_from(&path).unwrap().unwrap();
        assert_eq!(settings, AppSettings::new("/srv/sow"));
        assert_eq!(settings.clients, vec!["BSC", "Abiomed", "Cognex", "Itaros"]);
        assert_eq!(settings.flow.list_name, "SOW_Records");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut settings = AppSettings::new("~/Documents/SOW");
        settings.store = StoreKind::Flow;
        settings.flow.save_record = Some("https://flows.example.com/save".into());

        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path).unwrap(), Some(settings));
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_settings_from(&dir.path().join("nope.toml")).unwrap(), None);
    }

    #[test]
    fn bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "data_root = ").unwrap();
        assert!(load_settings_from(&path).is_err());
    }

    #[test]
    fn plain_paths_are_untouched() {
        assert_eq!(expand_home_dir("/var/sow"), "/var/sow");
    }
}
