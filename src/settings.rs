use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use once_cell::sync::Lazy;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = ".novera_settings.yaml";
const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Overrides the directory holding settings and preferences (defaults to `$HOME`).
pub const HOME_ENV: &str = "NOVERA_HOME";
/// Overrides `api_url` from the settings file.
pub const API_URL_ENV: &str = "NOVERA_API_URL";

/// How the reader decides whether a "next chapter" affordance is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NextChapterPolicy {
    /// Always offer the next chapter; a missing one resolves to "not found".
    #[default]
    Optimistic,
    /// Only offer it while the chapter list has a higher chapter number.
    Bounded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub next_chapter: NextChapterPolicy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            api_url: default_api_url(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            next_chapter: NextChapterPolicy::default(),
            access_token: None,
        }
    }
}

static SETTINGS: Lazy<RwLock<Settings>> = Lazy::new(|| RwLock::new(Settings::default()));

/// Directory where settings and preferences live.
pub fn novera_home_dir() -> Option<PathBuf> {
    match std::env::var_os(HOME_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => home::home_dir(),
    }
}

fn settings_path() -> Option<PathBuf> {
    novera_home_dir().map(|home| home.join(SETTINGS_FILENAME))
}

pub fn load_settings() {
    let Some(path) = settings_path() else {
        warn!("Could not determine home directory, using default settings");
        apply_env_overrides();
        return;
    };

    let settings = load_settings_from(&path);
    if let Ok(mut global) = SETTINGS.write() {
        *global = settings;
    }
    apply_env_overrides();
}

/// Reads settings from `path`, creating the file with defaults when it is missing.
pub fn load_settings_from(path: &Path) -> Settings {
    if !path.exists() {
        info!(
            "Settings file not found at {:?}, creating with defaults",
            path
        );
        let settings = Settings::default();
        save_settings_to_file(&settings, path);
        return settings;
    }

    match fs::read_to_string(path) {
        Ok(content) => match parse_settings(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {:?}", path);

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }
                settings
            }
            Err(e) => {
                error!("Failed to parse settings file {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            error!("Failed to read settings file {:?}: {}", path, e);
            Settings::default()
        }
    }
}

pub fn parse_settings(content: &str) -> Result<Settings, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str::<Settings>(content)
}

fn apply_env_overrides() {
    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            info!("Using API url from {}: {}", API_URL_ENV, url);
            if let Ok(mut settings) = SETTINGS.write() {
                settings.api_url = url;
            }
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    let content = generate_settings_yaml(settings);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {:?}", path),
        Err(e) => error!("Failed to save settings to {:?}: {}", path, e),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(SETTINGS_HEADER);
    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!("api_url: \"{}\"\n", settings.api_url));
    content.push_str(&format!(
        "request_timeout_secs: {}\n",
        settings.request_timeout_secs
    ));
    let policy = match settings.next_chapter {
        NextChapterPolicy::Optimistic => "optimistic",
        NextChapterPolicy::Bounded => "bounded",
    };
    content.push_str(&format!("next_chapter: {policy}\n"));
    match &settings.access_token {
        Some(token) => content.push_str(&format!("access_token: \"{token}\"\n")),
        None => content.push_str("# access_token: \"<bearer token from /login>\"\n"),
    }

    content
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# Novera reader settings
# ============================================================================
# api_url              Base url of the Novera API
# request_timeout_secs Timeout for every API request
# next_chapter         optimistic: always allow "next chapter"
#                      bounded: stop at the last chapter in the list
# access_token         Optional bearer token, enables bookmark statuses

"#;

// Public API for accessing settings

pub fn get_api_url() -> String {
    SETTINGS
        .read()
        .map(|s| s.api_url.clone())
        .unwrap_or_else(|_| default_api_url())
}

pub fn get_request_timeout() -> Duration {
    let secs = SETTINGS
        .read()
        .map(|s| s.request_timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs.max(1))
}

pub fn get_next_chapter_policy() -> NextChapterPolicy {
    SETTINGS
        .read()
        .map(|s| s.next_chapter)
        .unwrap_or_default()
}

pub fn get_access_token() -> Option<String> {
    SETTINGS
        .read()
        .ok()
        .and_then(|s| s.access_token.clone())
        .filter(|token| !token.trim().is_empty())
}
