//! Configuration loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "verity";
const PROJECT_FILES: [&str; 2] = ["verity.toml", ".verity.toml"];
const ENV_PREFIX: &str = "VERITY_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Environment: `VERITY_*`, nested with `__` (e.g. `VERITY_CACHE__SECRET`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./verity.toml` or `./.verity.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/verity/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        Self::files_figment(
            Self::global_config_path().as_deref(),
            Self::project_config_path().as_deref(),
            config_path.map(PathBuf::as_path),
        )
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(Box::new)
    }

    /// Merge defaults and whichever of the given files exist.
    ///
    /// An explicit path is merged even when missing so a typo surfaces as
    /// an error instead of silently falling back to defaults.
    pub fn files_figment(
        global: Option<&Path>,
        project: Option<&Path>,
        explicit: Option<&Path>,
    ) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        for path in [global, project].into_iter().flatten() {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        if let Some(path) = explicit {
            figment = figment.merge(Toml::file_exact(path));
        }

        figment
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// `$XDG_CONFIG_HOME/verity/config.toml`, falling back to the platform
    /// config directory.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Default directory for the filesystem cache backend
    pub fn default_cache_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join(APP_DIR))
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources() {
        println!("Configuration sources (in priority order):");
        println!("  [ENV  ] {}* (nested with __)", ENV_PREFIX);

        if let Some(path) = Self::project_config_path() {
            println!("  [FOUND] Project: {}", path.display());
        } else {
            println!("  [     ] Project: ./verity.toml or ./.verity.toml");
        }

        if let Some(path) = Self::global_config_path() {
            let marker = if path.exists() { "FOUND" } else { "     " };
            println!("  [{}] Global:  {}", marker, path.display());
        }

        println!("  [     ] Default: built-in defaults");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert!(config.providers.is_empty());
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("verity"));
    }

    #[test]
    fn test_later_files_override_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("verity.toml");
        fs::write(
            &global,
            "[deadlines]\nprovider_ms = 1000\nrequest_ms = 5000\n\n[consensus]\nmin_sources = 3\n",
        )
        .unwrap();
        fs::write(&project, "[deadlines]\nprovider_ms = 2000\n").unwrap();

        let config: FileConfig = ConfigLoader::files_figment(Some(&global), Some(&project), None)
            .extract()
            .unwrap();
        assert_eq!(config.deadlines.provider_ms, 2000);
        assert_eq!(config.deadlines.request_ms, 5000);
        assert_eq!(config.consensus.min_sources, 3);
        assert_eq!(config.rate_limit.caller.per_minute, 30);
    }

    #[test]
    fn test_missing_optional_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let config: FileConfig = ConfigLoader::files_figment(Some(&missing), None, None)
            .extract()
            .unwrap();
        assert_eq!(config.consensus.policy, "majority-trust");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let result: Result<FileConfig, _> =
            ConfigLoader::files_figment(None, None, Some(&missing)).extract();
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("verity.toml");
        let explicit = dir.path().join("custom.toml");
        fs::write(&project, "[validation]\nenabled = true\n").unwrap();
        fs::write(
            &explicit,
            "[validation]\nenabled = false\n\n[[providers]]\nid = \"a\"\nendpoint = \"https://a.example\"\n",
        )
        .unwrap();

        let config: FileConfig =
            ConfigLoader::files_figment(None, Some(&project), Some(&explicit))
                .extract()
                .unwrap();
        assert!(!config.validation.enabled);
        assert_eq!(config.providers.len(), 1);
    }
}
