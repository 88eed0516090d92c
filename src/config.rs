//! Organizer settings and scan filters loaded from TOML.
//!
//! Filters decide which direct children of the root are offered to the
//! organizer at all. They are applied by the scanner only and can never make
//! a protected path visible.
//!
//! # Configuration File Format
//!
//! ```toml
//! [organizer]
//! default_group = "Unsorted"
//! refresh_shell = true
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = ["desktop.ini", "Thumbs.db"]
//! patterns = ["*.tmp"]
//! extensions = ["lnk"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```

use crate::error::ConfigError;
use crate::generator::DEFAULT_GROUP;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".deskgrouprc.toml";

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub organizer: OrganizerSettings,
    #[serde(default)]
    pub filters: FilterRules,
}

/// `[organizer]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizerSettings {
    /// Folder that receives every file no group claims.
    #[serde(default = "default_group_name")]
    pub default_group: String,

    /// Ask the desktop shell to redraw after organize and restore.
    #[serde(default = "default_refresh_shell")]
    pub refresh_shell: bool,
}

fn default_group_name() -> String {
    DEFAULT_GROUP.to_string()
}

fn default_refresh_shell() -> bool {
    true
}

impl Default for OrganizerSettings {
    fn default() -> Self {
        Self {
            default_group: default_group_name(),
            refresh_shell: default_refresh_shell(),
        }
    }
}

/// `[filters]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRules {
    /// Offer hidden files (starting with ".") to the organizer. Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist that overrides every exclude rule.
    #[serde(default)]
    pub include: IncludeRules,
}

/// Lists left out of the TOML keep their built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames, e.g. "desktop.ini".
    #[serde(default = "default_excluded_filenames")]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the filename.
    #[serde(default = "default_excluded_patterns")]
    pub patterns: Vec<String>,

    /// Extensions without the dot, case-insensitive.
    #[serde(default = "default_excluded_extensions")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub regex: Vec<String>,
}

fn default_excluded_filenames() -> Vec<String> {
    vec!["desktop.ini".to_string(), "Thumbs.db".to_string()]
}

fn default_excluded_patterns() -> Vec<String> {
    vec!["*.tmp".to_string()]
}

fn default_excluded_extensions() -> Vec<String> {
    vec!["lnk".to_string()]
}

impl Default for ExcludeRules {
    fn default() -> Self {
        Self {
            filenames: default_excluded_filenames(),
            patterns: default_excluded_patterns(),
            extensions: default_excluded_extensions(),
            regex: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Config {
    /// Load configuration, falling back to defaults.
    ///
    /// Search order:
    /// 1. `config_path`, when given
    /// 2. `.deskgrouprc.toml` in the current directory
    /// 3. `~/.config/deskgroup/config.toml`
    /// 4. Built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file is missing, if any found
    /// file cannot be parsed, or if the settings fail validation.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match Self::locate(config_path)? {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                Self::load_from_file(&path)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn locate(config_path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
            }
            return Ok(Some(path.to_path_buf()));
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Ok(Some(local_config));
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("deskgroup")
                .join("config.toml");
            if home_config.exists() {
                return Ok(Some(home_config));
            }
        }

        Ok(None)
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration text without validating it.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// The default group must be usable as a single folder name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.organizer.default_group.trim();
        if name.is_empty() {
            return Err(ConfigError::ConfigInvalid(
                "organizer.default_group must not be empty".to_string(),
            ));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::ConfigInvalid(format!(
                "organizer.default_group {name:?} must be a single folder name"
            )));
        }
        Ok(())
    }

    /// Compiles the filter rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Filter rules with every pattern compiled once.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Filters that let everything through except hidden files.
    pub fn permissive() -> Self {
        Self {
            enable_hidden_files: false,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }

    /// Whether a root entry with this name is offered to the organizer.
    ///
    /// Include patterns win; then hidden files, exact names, extensions,
    /// glob patterns and regexes each exclude.
    pub fn should_include(&self, file_name: &str) -> bool {
        if self.include_patterns.iter().any(|p| p.matches(file_name)) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name) {
            return false;
        }

        if let Some(ext) = Path::new(file_name).extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        if self.exclude_patterns.iter().any(|p| p.matches(file_name)) {
            return false;
        }

        !self.exclude_regexes.iter().any(|r| r.is_match(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(rules: FilterRules) -> CompiledFilters {
        Config {
            filters: rules,
            ..Config::default()
        }
        .compile_filters()
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.organizer.default_group, "Unsorted");
        assert!(config.organizer.refresh_shell);
        assert!(!config.filters.enable_hidden_files);
        assert_eq!(config.filters.exclude.filenames, vec!["desktop.ini", "Thumbs.db"]);
        assert_eq!(config.filters.exclude.patterns, vec!["*.tmp"]);
        assert_eq!(config.filters.exclude.extensions, vec!["lnk"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_filters_skip_shell_clutter() {
        let compiled = Config::default().compile_filters().unwrap();
        assert!(!compiled.should_include("desktop.ini"));
        assert!(!compiled.should_include("Thumbs.db"));
        assert!(!compiled.should_include("download.tmp"));
        assert!(!compiled.should_include("Browser.LNK"));
        assert!(compiled.should_include("notes.txt"));
    }

    #[test]
    fn test_parse_partial_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
            [organizer]
            default_group = "Misc"

            [filters.exclude]
            filenames = ["desktop.ini"]
            "#,
        )
        .unwrap();
        assert_eq!(config.organizer.default_group, "Misc");
        assert!(config.organizer.refresh_shell);
        assert_eq!(config.filters.exclude.filenames, vec!["desktop.ini"]);
        assert_eq!(config.filters.exclude.patterns, vec!["*.tmp"]);
        assert_eq!(config.filters.exclude.extensions, vec!["lnk"]);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml_str("[organizer\n"),
            Err(ConfigError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_default_group_validation() {
        let mut config = Config::default();
        config.organizer.default_group = "  ".to_string();
        assert!(config.validate().is_err());
        config.organizer.default_group = "a/b".to_string();
        assert!(config.validate().is_err());
        config.organizer.default_group = "Loose Files".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_missing_file() {
        let result = Config::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_hidden_files_excluded_by_default() {
        let compiled = filters(FilterRules::default());
        assert!(!compiled.should_include(".DS_Store"));
        assert!(compiled.should_include("notes.txt"));
    }

    #[test]
    fn test_exclusions() {
        let compiled = filters(FilterRules {
            enable_hidden_files: true,
            exclude: ExcludeRules {
                filenames: vec!["desktop.ini".to_string()],
                patterns: vec!["~$*".to_string()],
                extensions: vec!["LNK".to_string()],
                regex: vec![r"^tmp\d+$".to_string()],
            },
            include: IncludeRules::default(),
        });

        assert!(!compiled.should_include("desktop.ini"));
        assert!(!compiled.should_include("~$report.docx"));
        assert!(!compiled.should_include("Browser.lnk"));
        assert!(!compiled.should_include("tmp42"));
        assert!(compiled.should_include(".hidden"));
        assert!(compiled.should_include("report.docx"));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let compiled = filters(FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules {
                extensions: vec!["lnk".to_string()],
                ..Default::default()
            },
            include: IncludeRules {
                patterns: vec!["Work*.lnk".to_string(), ".keep".to_string()],
            },
        });

        assert!(compiled.should_include("Work VPN.lnk"));
        assert!(!compiled.should_include("Game.lnk"));
        assert!(compiled.should_include(".keep"));
    }

    #[test]
    fn test_invalid_patterns() {
        let bad_regex = Config {
            filters: FilterRules {
                exclude: ExcludeRules {
                    regex: vec!["[invalid(".to_string()],
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            bad_regex.compile_filters(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = Config {
            filters: FilterRules {
                exclude: ExcludeRules {
                    patterns: vec!["[invalid".to_string()],
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            bad_glob.compile_filters(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }
}
