use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use shellexpand;
use std::path::{Path, PathBuf};

/// Main configuration structure for labmirror
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Base directory under which repositories are mirrored
    pub base_directory: String,

    /// GitLab instance and discovery settings
    #[serde(default)]
    pub gitlab: GitLabConfig,

    /// HTTP request settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitLab configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitLabConfig {
    /// Instance base URL
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Personal access token. Falls back to the GITLAB_TOKEN environment
    /// variable when unset.
    pub token: Option<String>,

    /// Minimum access level for group discovery (10 = Guest)
    #[serde(default = "default_min_access_level")]
    pub min_access_level: u32,

    /// Flatten each root group's subgroup tree into its project list
    #[serde(default = "default_true")]
    pub include_subgroups: bool,

    /// Project exclusion patterns matched against path_with_namespace
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

/// HTTP request configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout: u64,

    /// Page size for paginated API calls (GitLab caps this at 100)
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Timeout for a single git clone or pull in seconds
    #[serde(default = "default_git_timeout")]
    pub git_timeout: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Directory receiving the rotating log files
    #[serde(default = "default_log_directory")]
    pub directory: String,

    /// Number of rotated log files to retain
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

// Default value functions
fn default_instance() -> String {
    "https://gitlab.com".to_string()
}
fn default_true() -> bool {
    true
}
fn default_min_access_level() -> u32 {
    10
}
fn default_http_timeout() -> u64 {
    15
}
fn default_per_page() -> u32 {
    100
}
fn default_git_timeout() -> u64 {
    300
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_directory() -> String {
    "logs".to_string()
}
fn default_max_files() -> usize {
    3
}

// Default implementations
impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            token: None,
            min_access_level: default_min_access_level(),
            include_subgroups: default_true(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
            per_page: default_per_page(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            git_timeout: default_git_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
            max_files: default_max_files(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            // Create default config
            let mut config = Self::default();

            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            // Save default config
            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);

            config.expand_paths()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("labmirror").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.base_directory = shellexpand::full(&self.base_directory)
            .context("Failed to expand base_directory path")?
            .into_owned();

        self.logging.directory = shellexpand::full(&self.logging.directory)
            .context("Failed to expand logging directory path")?
            .into_owned();

        Ok(())
    }

    /// Instance URL without a trailing slash, as used for API URL construction
    pub fn instance_url(&self) -> &str {
        self.gitlab.instance.trim_end_matches('/')
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_directory: "${HOME}/gitlab-backup".to_string(),
            gitlab: GitLabConfig::default(),
            http: HttpConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    // Helper function to create a temporary config directory
    fn setup_test_config_dir() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_dir = temp_dir.path().join("labmirror");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");
        (temp_dir, config_dir)
    }

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert_eq!(config.base_directory, "${HOME}/gitlab-backup");
        assert_eq!(config.gitlab.instance, "https://gitlab.com");
        assert!(config.gitlab.token.is_none());
        assert_eq!(config.gitlab.min_access_level, 10);
        assert!(config.gitlab.include_subgroups);
        assert!(config.gitlab.exclude_patterns.is_empty());
        assert_eq!(config.http.timeout, 15);
        assert_eq!(config.http.per_page, 100);
        assert_eq!(config.sync.git_timeout, 300);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.max_files, 3);
    }

    #[test]
    fn test_instance_url_trims_trailing_slash() {
        let mut config = Config::default();
        config.gitlab.instance = "https://gitlab.example.com/".to_string();
        assert_eq!(config.instance_url(), "https://gitlab.example.com");

        config.gitlab.instance = "https://gitlab.example.com".to_string();
        assert_eq!(config.instance_url(), "https://gitlab.example.com");
    }

    #[test]
    fn test_expand_paths() {
        // Set up test environment
        env::set_var("TEST_LABMIRROR_HOME", "/test/home");

        let mut config = Config::default();
        config.base_directory = "${TEST_LABMIRROR_HOME}/backup".to_string();

        config.expand_paths().expect("Failed to expand paths");

        assert_eq!(config.base_directory, "/test/home/backup");

        // Clean up
        env::remove_var("TEST_LABMIRROR_HOME");
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let nonexistent_path = Path::new("/nonexistent/path/config.yml");
        let result = Config::load(nonexistent_path);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let (_temp_dir, config_dir) = setup_test_config_dir();
        let config_path = config_dir.join("config.yml");

        // Create a config with non-default values
        let mut config = Config::default();
        config.base_directory = "/custom/path".to_string();
        config.gitlab.instance = "https://gitlab.internal.example".to_string();
        config.gitlab.min_access_level = 30;
        config.http.per_page = 50;

        // Save the config
        config.save(&config_path).expect("Failed to save config");

        // Load it back
        let loaded_config = Config::load(&config_path).expect("Failed to load config");

        assert_eq!(loaded_config.base_directory, "/custom/path");
        assert_eq!(
            loaded_config.gitlab.instance,
            "https://gitlab.internal.example"
        );
        assert_eq!(loaded_config.gitlab.min_access_level, 30);
        assert_eq!(loaded_config.http.per_page, 50);
    }

    #[test]
    fn test_config_default_path_xdg() {
        // This test verifies that the default path respects XDG directories
        let default_path = Config::default_config_path().expect("Failed to get default path");
        assert!(default_path.to_string_lossy().contains("labmirror"));
        assert!(default_path.to_string_lossy().ends_with("config.yml"));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml_content = r#"
base_directory: "/srv/gitlab-backup"
gitlab:
  instance: "https://gitlab.example.com"
  token: "glpat-test-token"
  min_access_level: 20
  include_subgroups: false
  exclude_patterns:
    - "sandbox/*"
    - "*-archive"
http:
  timeout: 30
  per_page: 50
sync:
  git_timeout: 600
logging:
  level: "debug"
  directory: "/var/log/labmirror"
  max_files: 5
"#;

        let config: Config = serde_yaml::from_str(yaml_content).expect("Failed to parse YAML");

        assert_eq!(config.base_directory, "/srv/gitlab-backup");
        assert_eq!(config.gitlab.instance, "https://gitlab.example.com");
        assert_eq!(config.gitlab.token, Some("glpat-test-token".to_string()));
        assert_eq!(config.gitlab.min_access_level, 20);
        assert!(!config.gitlab.include_subgroups);
        assert_eq!(
            config.gitlab.exclude_patterns,
            vec!["sandbox/*".to_string(), "*-archive".to_string()]
        );
        assert_eq!(config.http.timeout, 30);
        assert_eq!(config.http.per_page, 50);
        assert_eq!(config.sync.git_timeout, 600);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.directory, "/var/log/labmirror");
        assert_eq!(config.logging.max_files, 5);
    }

    #[test]
    fn test_yaml_parsing_minimal() {
        // Only base_directory is required; every section falls back to defaults
        let config: Config =
            serde_yaml::from_str("base_directory: \"/srv/mirror\"\n").expect("Failed to parse");

        assert_eq!(config.base_directory, "/srv/mirror");
        assert_eq!(config.gitlab.instance, "https://gitlab.com");
        assert_eq!(config.http.per_page, 100);
        assert_eq!(config.sync.git_timeout, 300);
    }
}
