use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::de::Deserializer;
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "config.toml";
const STORE_FILE_NAME: &str = "store.db";
const APP_NAME: &str = "lodcrm";

pub const DEFAULT_ASSISTANT_URL: &str = "http://localhost:3001";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DATABASE: &str = "(default)";
const DEFAULT_PHONE_REGION: &str = "US";

#[derive(Debug, Clone)]
pub struct Config {
    /// Where the configuration was read from; `None` when built-in defaults
    /// are in effect because no file exists yet.
    pub config_path: Option<PathBuf>,
    pub phone_region: String,
    pub assistant: AssistantConfig,
    pub store: StoreConfig,
    pub keys: Keys,
    pub ui: UiConfig,
}

// =============================================================================
// Assistant Configuration
// =============================================================================

/// Connection settings for the chat and AI contact action endpoints.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Send messages that look like contact commands to the action endpoint.
    pub route_actions: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ASSISTANT_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            route_actions: true,
        }
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Managed Firestore database over REST
    Firestore,
    /// SQLite file on this machine
    Local,
}

impl StoreBackend {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Some(StoreBackend::Firestore),
            "local" | "sqlite" => Some(StoreBackend::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    /// Optional OAuth/ID token sent as a bearer token.
    pub auth_token: Option<String>,
    pub database: String,
    /// Overrides the Firestore REST endpoint (emulators, tests).
    pub api_base: Option<String>,
    pub timeout_secs: u64,
    /// SQLite file for the local backend.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Firestore,
            project_id: None,
            api_key: None,
            auth_token: None,
            database: DEFAULT_DATABASE.to_string(),
            api_base: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            path: default_store_path(),
        }
    }
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

// =============================================================================
// UI Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub colors: UiColors,
}

#[derive(Debug, Clone)]
pub struct UiColors {
    pub border: RgbColor,
    pub selection_bg: RgbColor,
    pub selection_fg: RgbColor,
    pub separator: RgbColor,
    pub status_fg: RgbColor,
    pub status_bg: RgbColor,
    pub marked: RgbColor,
    pub error: RgbColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

// =============================================================================
// Key Bindings
// =============================================================================

#[derive(Debug, Clone)]
pub struct Keys {
    pub global: GlobalKeys,
    pub navigation: NavigationKeys,
    pub contacts: ContactsKeys,
    pub listings: ListingsKeys,
    pub editor: EditorKeys,
}

#[derive(Debug, Clone)]
pub struct GlobalKeys {
    pub quit: Vec<String>,
    pub help: Vec<String>,
    pub chat: Vec<String>,
    pub contacts: Vec<String>,
    pub listings: Vec<String>,
    pub reload: Vec<String>,
}

/// Row movement and opening, shared by the contacts and listings screens.
#[derive(Debug, Clone)]
pub struct NavigationKeys {
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub view: Vec<String>,
    pub edit: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ContactsKeys {
    pub filter: Vec<String>,
    pub clear_filters: Vec<String>,
    pub list_mode: Vec<String>,
    pub toggle: Vec<String>,
    pub create_list: Vec<String>,
    pub cancel: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ListingsKeys {
    pub tours: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EditorKeys {
    pub edit: Vec<String>,
    pub save: Vec<String>,
    pub cancel: Vec<String>,
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub change: Vec<String>,
}

fn keys(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for Keys {
    fn default() -> Self {
        Self {
            global: GlobalKeys::default(),
            navigation: NavigationKeys::default(),
            contacts: ContactsKeys::default(),
            listings: ListingsKeys::default(),
            editor: EditorKeys::default(),
        }
    }
}

impl Default for GlobalKeys {
    fn default() -> Self {
        Self {
            quit: keys(&["F10", "q"]),
            help: keys(&["F1", "?"]),
            chat: keys(&["F2", "1"]),
            contacts: keys(&["F3", "2"]),
            listings: keys(&["F4", "3"]),
            reload: keys(&["F5", "r"]),
        }
    }
}

impl Default for NavigationKeys {
    fn default() -> Self {
        Self {
            next: keys(&["j", "Down"]),
            prev: keys(&["k", "Up"]),
            view: keys(&["Enter"]),
            edit: keys(&["e"]),
        }
    }
}

impl Default for ContactsKeys {
    fn default() -> Self {
        Self {
            filter: keys(&["/", "f"]),
            clear_filters: keys(&["c"]),
            list_mode: keys(&["l"]),
            toggle: keys(&["Space"]),
            create_list: keys(&["n"]),
            cancel: keys(&["Esc"]),
        }
    }
}

impl Default for ListingsKeys {
    fn default() -> Self {
        Self {
            tours: keys(&["t"]),
        }
    }
}

impl Default for EditorKeys {
    fn default() -> Self {
        Self {
            edit: keys(&["e"]),
            save: keys(&["s"]),
            cancel: keys(&["Esc"]),
            next: keys(&["j", "Down", "Tab"]),
            prev: keys(&["k", "Up", "BackTab"]),
            change: keys(&["Enter"]),
        }
    }
}

// =============================================================================
// Serde deserialization types (support both single string and array)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeyBinding {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyBinding {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeyBinding::Single(s) => vec![s],
            KeyBinding::Multiple(v) => v,
        }
    }
}

/// Read an optional binding, falling back to the built-in default.
fn binding(value: Option<KeyBinding>, default: Vec<String>) -> Vec<String> {
    value.map(KeyBinding::into_vec).unwrap_or(default)
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeysFile {
    global: GlobalKeysFile,
    navigation: NavigationKeysFile,
    contacts: ContactsKeysFile,
    listings: ListingsKeysFile,
    editor: EditorKeysFile,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct GlobalKeysFile {
    quit: Option<KeyBinding>,
    help: Option<KeyBinding>,
    chat: Option<KeyBinding>,
    contacts: Option<KeyBinding>,
    listings: Option<KeyBinding>,
    reload: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct NavigationKeysFile {
    next: Option<KeyBinding>,
    prev: Option<KeyBinding>,
    view: Option<KeyBinding>,
    edit: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ContactsKeysFile {
    filter: Option<KeyBinding>,
    clear_filters: Option<KeyBinding>,
    list_mode: Option<KeyBinding>,
    toggle: Option<KeyBinding>,
    create_list: Option<KeyBinding>,
    cancel: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ListingsKeysFile {
    tours: Option<KeyBinding>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct EditorKeysFile {
    edit: Option<KeyBinding>,
    save: Option<KeyBinding>,
    cancel: Option<KeyBinding>,
    next: Option<KeyBinding>,
    prev: Option<KeyBinding>,
    change: Option<KeyBinding>,
}

// =============================================================================
// Conversion from file types to runtime types
// =============================================================================

impl From<KeysFile> for Keys {
    fn from(file: KeysFile) -> Self {
        Self {
            global: file.global.into(),
            navigation: file.navigation.into(),
            contacts: file.contacts.into(),
            listings: file.listings.into(),
            editor: file.editor.into(),
        }
    }
}

impl From<GlobalKeysFile> for GlobalKeys {
    fn from(file: GlobalKeysFile) -> Self {
        let defaults = GlobalKeys::default();
        Self {
            quit: binding(file.quit, defaults.quit),
            help: binding(file.help, defaults.help),
            chat: binding(file.chat, defaults.chat),
            contacts: binding(file.contacts, defaults.contacts),
            listings: binding(file.listings, defaults.listings),
            reload: binding(file.reload, defaults.reload),
        }
    }
}

impl From<NavigationKeysFile> for NavigationKeys {
    fn from(file: NavigationKeysFile) -> Self {
        let defaults = NavigationKeys::default();
        Self {
            next: binding(file.next, defaults.next),
            prev: binding(file.prev, defaults.prev),
            view: binding(file.view, defaults.view),
            edit: binding(file.edit, defaults.edit),
        }
    }
}

impl From<ContactsKeysFile> for ContactsKeys {
    fn from(file: ContactsKeysFile) -> Self {
        let defaults = ContactsKeys::default();
        Self {
            filter: binding(file.filter, defaults.filter),
            clear_filters: binding(file.clear_filters, defaults.clear_filters),
            list_mode: binding(file.list_mode, defaults.list_mode),
            toggle: binding(file.toggle, defaults.toggle),
            create_list: binding(file.create_list, defaults.create_list),
            cancel: binding(file.cancel, defaults.cancel),
        }
    }
}

impl From<ListingsKeysFile> for ListingsKeys {
    fn from(file: ListingsKeysFile) -> Self {
        let defaults = ListingsKeys::default();
        Self {
            tours: binding(file.tours, defaults.tours),
        }
    }
}

impl From<EditorKeysFile> for EditorKeys {
    fn from(file: EditorKeysFile) -> Self {
        let defaults = EditorKeys::default();
        Self {
            edit: binding(file.edit, defaults.edit),
            save: binding(file.save, defaults.save),
            cancel: binding(file.cancel, defaults.cancel),
            next: binding(file.next, defaults.next),
            prev: binding(file.prev, defaults.prev),
            change: binding(file.change, defaults.change),
        }
    }
}

/// Normalize a key binding string to a canonical form for collision detection.
/// Single characters preserve case (since 'M' means Shift+m, different from 'm').
/// Multi-character key names are case-insensitive (Enter, ENTER, enter are the same).
fn normalize_binding(binding: &str) -> String {
    let trimmed = binding.trim();
    if trimmed.chars().count() == 1 {
        trimmed.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

/// Check for collisions within a single context
fn check_context_collisions(bindings: &[(&str, &[String])], context_name: &str) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (action_name, keys) in bindings {
        for key in *keys {
            let normalized = normalize_binding(key);
            if normalized.is_empty() {
                continue;
            }
            if let Some(existing_action) = seen.get(&normalized) {
                bail!(
                    "key binding collision in [keys.{}]: '{}' is bound to both '{}' and '{}'",
                    context_name,
                    key,
                    existing_action,
                    action_name
                );
            }
            seen.insert(normalized, action_name);
        }
    }

    Ok(())
}

/// Validate all key bindings for collisions within each context
fn validate_key_bindings(keys: &Keys) -> Result<()> {
    check_context_collisions(
        &[
            ("quit", &keys.global.quit),
            ("help", &keys.global.help),
            ("chat", &keys.global.chat),
            ("contacts", &keys.global.contacts),
            ("listings", &keys.global.listings),
            ("reload", &keys.global.reload),
        ],
        "global",
    )?;

    // The contacts screen sees navigation and contacts bindings at once.
    check_context_collisions(
        &[
            ("next", &keys.navigation.next),
            ("prev", &keys.navigation.prev),
            ("view", &keys.navigation.view),
            ("edit", &keys.navigation.edit),
            ("filter", &keys.contacts.filter),
            ("clear_filters", &keys.contacts.clear_filters),
            ("list_mode", &keys.contacts.list_mode),
            ("toggle", &keys.contacts.toggle),
            ("create_list", &keys.contacts.create_list),
            ("cancel", &keys.contacts.cancel),
        ],
        "contacts",
    )?;

    check_context_collisions(
        &[
            ("next", &keys.navigation.next),
            ("prev", &keys.navigation.prev),
            ("view", &keys.navigation.view),
            ("edit", &keys.navigation.edit),
            ("tours", &keys.listings.tours),
        ],
        "listings",
    )?;

    check_context_collisions(
        &[
            ("edit", &keys.editor.edit),
            ("save", &keys.editor.save),
            ("cancel", &keys.editor.cancel),
            ("next", &keys.editor.next),
            ("prev", &keys.editor.prev),
            ("change", &keys.editor.change),
        ],
        "editor",
    )?;

    Ok(())
}

// =============================================================================
// Config File Deserialization
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    phone_region: Option<String>,
    assistant: AssistantFile,
    store: StoreFile,
    keys: KeysFile,
    ui: UiFile,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct AssistantFile {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    route_actions: Option<bool>,
}

impl From<AssistantFile> for AssistantConfig {
    fn from(file: AssistantFile) -> Self {
        let defaults = AssistantConfig::default();
        let base_url = file
            .base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.base_url);
        Self {
            base_url,
            timeout_secs: file.timeout_secs.unwrap_or(defaults.timeout_secs),
            route_actions: file.route_actions.unwrap_or(defaults.route_actions),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct StoreFile {
    backend: Option<String>,
    project_id: Option<String>,
    api_key: Option<String>,
    auth_token: Option<String>,
    database: Option<String>,
    api_base: Option<String>,
    timeout_secs: Option<u64>,
    path: Option<PathBuf>,
}

impl StoreFile {
    fn into_config(self) -> Result<StoreConfig> {
        let defaults = StoreConfig::default();

        let backend = match self.backend.as_deref() {
            None => defaults.backend,
            Some(name) => match StoreBackend::from_str(name) {
                Some(backend) => backend,
                None => bail!(
                    "invalid store.backend: '{}' (expected \"firestore\" or \"local\")",
                    name
                ),
            },
        };

        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(StoreConfig {
            backend,
            project_id: non_empty(self.project_id),
            api_key: non_empty(self.api_key),
            auth_token: non_empty(self.auth_token),
            database: non_empty(self.database).unwrap_or(defaults.database),
            api_base: non_empty(self.api_base),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            path: self
                .path
                .map(|path| expand_tilde(&path))
                .unwrap_or(defaults.path),
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct UiFile {
    colors: UiColorsFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UiColorsFile {
    border: RgbColor,
    selection_bg: RgbColor,
    selection_fg: RgbColor,
    separator: RgbColor,
    status_fg: RgbColor,
    status_bg: RgbColor,
    marked: RgbColor,
    error: RgbColor,
}

impl Default for UiColorsFile {
    fn default() -> Self {
        Self {
            border: RgbColor::new(255, 165, 0),
            selection_bg: RgbColor::new(255, 165, 0),
            selection_fg: RgbColor::new(0, 0, 0),
            separator: RgbColor::new(255, 165, 0),
            status_fg: RgbColor::new(255, 165, 0),
            status_bg: RgbColor::new(0, 0, 0),
            marked: RgbColor::new(80, 200, 120),
            error: RgbColor::new(211, 47, 47),
        }
    }
}

impl From<UiFile> for UiConfig {
    fn from(file: UiFile) -> Self {
        let c = file.colors;
        Self {
            colors: UiColors {
                border: c.border,
                selection_bg: c.selection_bg,
                selection_fg: c.selection_fg,
                separator: c.separator,
                status_fg: c.status_fg,
                status_bg: c.status_bg,
                marked: c.marked,
                error: c.error,
            },
        }
    }
}

impl<'de> serde::Deserialize<'de> for RgbColor {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Array([u8; 3]),
            Map { r: u8, g: u8, b: u8 },
        }

        let helper = Helper::deserialize(deserializer)?;
        let (r, g, b) = match helper {
            Helper::Array(values) => (values[0], values[1], values[2]),
            Helper::Map { r, g, b } => (r, g, b),
        };
        Ok(RgbColor { r, g, b })
    }
}

// =============================================================================
// Paths and loading
// =============================================================================

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Per-user data directory (`store.db`, `lodcrm.log`).
pub fn data_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|base| base.data_dir().join(APP_NAME))
}

/// HTTP timeout for a configured `timeout_secs`. Zero would fail every
/// request at once, so the floor is one second.
pub fn request_timeout(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

fn default_store_path() -> PathBuf {
    data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STORE_FILE_NAME)
}

/// Load configuration from `path` (or the default location). A missing file
/// is not an error: every setting has a default.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => expand_tilde(path),
        None => config_path()?,
    };

    if !path.exists() {
        tracing::info!(path = %path.display(), "no configuration file, using defaults");
        return from_str("").map(|config| Config {
            config_path: None,
            ..config
        });
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;

    let config = from_str(&raw)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;

    Ok(Config {
        config_path: Some(path),
        ..config
    })
}

/// Parse configuration text.
pub fn from_str(raw: &str) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw).context("failed to parse configuration as TOML")?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .context("failed to deserialize configuration")?;

    let phone_region = cfg_file
        .phone_region
        .as_ref()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_ascii_uppercase())
        .unwrap_or_else(|| DEFAULT_PHONE_REGION.to_string());

    let keys: Keys = cfg_file.keys.into();
    validate_key_bindings(&keys)?;

    let store = cfg_file
        .store
        .into_config()
        .context("failed to parse store configuration")?;

    Ok(Config {
        config_path: None,
        phone_region,
        assistant: cfg_file.assistant.into(),
        store,
        keys,
        ui: cfg_file.ui.into(),
    })
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    let known = HashSet::from(["phone_region", "assistant", "store", "keys", "ui"]);
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            tracing::warn!("unknown configuration key `{}`", key);
        }
    }

    let sections: [(&str, &[&str]); 3] = [
        ("assistant", &["base_url", "timeout_secs", "route_actions"]),
        (
            "store",
            &[
                "backend",
                "project_id",
                "api_key",
                "auth_token",
                "database",
                "api_base",
                "timeout_secs",
                "path",
            ],
        ),
        ("keys", &["global", "navigation", "contacts", "listings", "editor"]),
    ];
    for (section, allowed) in sections {
        if let Some(inner) = table.get(section).and_then(|v| v.as_table()) {
            for key in inner.keys() {
                if !allowed.contains(&key.as_str()) {
                    tracing::warn!("unknown configuration key `{}.{}`", section, key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = from_str("").unwrap();
        assert_eq!(config.assistant.base_url, DEFAULT_ASSISTANT_URL);
        assert!(config.assistant.route_actions);
        assert_eq!(config.store.backend, StoreBackend::Firestore);
        assert_eq!(config.store.database, "(default)");
        assert!(config.store.project_id.is_none());
        assert_eq!(config.phone_region, "US");
        assert_eq!(config.keys.contacts.toggle, vec!["Space"]);
    }

    #[test]
    fn test_full_config() {
        let raw = r#"
phone_region = "gb"

[assistant]
base_url = "http://crm.internal:8080/"
timeout_secs = 5
route_actions = false

[store]
backend = "local"
path = "/tmp/lodcrm-test.db"

[ui.colors]
border = [1, 2, 3]
selection_bg = { r = 4, g = 5, b = 6 }

[keys.contacts]
list_mode = "L"
toggle = ["Space", "x"]
"#;
        let config = from_str(raw).unwrap();
        assert_eq!(config.phone_region, "GB");
        assert_eq!(config.assistant.base_url, "http://crm.internal:8080");
        assert_eq!(config.assistant.timeout_secs, 5);
        assert!(!config.assistant.route_actions);
        assert_eq!(config.store.backend, StoreBackend::Local);
        assert_eq!(config.store.path, PathBuf::from("/tmp/lodcrm-test.db"));
        assert_eq!(config.ui.colors.border, RgbColor::new(1, 2, 3));
        assert_eq!(config.ui.colors.selection_bg, RgbColor::new(4, 5, 6));
        assert_eq!(config.keys.contacts.list_mode, vec!["L"]);
        assert_eq!(config.keys.contacts.toggle, vec!["Space", "x"]);
        // Untouched bindings keep their defaults
        assert_eq!(config.keys.contacts.create_list, vec!["n"]);
    }

    #[test]
    fn test_invalid_backend_is_rejected() {
        let err = from_str("[store]\nbackend = \"mongo\"\n").unwrap_err();
        assert!(format!("{:#}", err).contains("invalid store.backend"));
    }

    #[test]
    fn test_key_collision_detected() {
        let raw = r#"
[keys.contacts]
list_mode = "j"
"#;
        let err = from_str(raw).unwrap_err();
        assert!(err.to_string().contains("key binding collision in [keys.contacts]"));
    }

    #[test]
    fn test_normalize_binding() {
        assert_eq!(normalize_binding("Enter"), "enter");
        assert_eq!(normalize_binding("M"), "M");
        assert_eq!(normalize_binding(" m "), "m");
    }

    #[test]
    fn test_request_timeout_floor() {
        assert_eq!(request_timeout(0), Duration::from_secs(1));
        assert_eq!(request_timeout(1), Duration::from_secs(1));
        assert_eq!(request_timeout(DEFAULT_TIMEOUT_SECS), Duration::from_secs(30));

        let config = from_str("[store]\ntimeout_secs = 0\n[assistant]\ntimeout_secs = 0\n").unwrap();
        assert_eq!(request_timeout(config.store.timeout_secs), Duration::from_secs(1));
        assert_eq!(request_timeout(config.assistant.timeout_secs), Duration::from_secs(1));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(config.config_path.is_none());
        assert_eq!(config.assistant.base_url, DEFAULT_ASSISTANT_URL);
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[store]\nproject_id = \"lod-crm\"\n").unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.store.project_id.as_deref(), Some("lod-crm"));
    }
}
