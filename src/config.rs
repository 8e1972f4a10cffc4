use std::path::{Path, PathBuf};
use std::time::Duration;

use facet::Facet;

use crate::error::SearchError;
use crate::extension::ExtensionSettings;
use crate::paths;
use crate::source::SourceKind;

const MAX_DEBOUNCE_MS: u64 = 10_000;
const KNOWN_KEYS: &[&str] = &["source", "registry_path", "vboxmanage", "debounce_ms"];

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct Config {
    /// `"file"` or `"command"`.
    #[facet(default = "file")]
    pub source: String,
    /// Overrides `~/.VirtualBox/VirtualBox.xml`.
    #[facet(default)]
    pub registry_path: Option<String>,
    #[facet(default = "vboxmanage")]
    pub vboxmanage: String,
    #[facet(default = 100)]
    pub debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: "file".into(),
            registry_path: None,
            vboxmanage: "vboxmanage".into(),
            debounce_ms: 100,
        }
    }
}

impl Config {
    pub fn source_kind(&self) -> Result<SourceKind, SearchError> {
        SourceKind::parse(&self.source).ok_or_else(|| SearchError::Validation {
            message: format!("source must be \"file\" or \"command\" (got '{}')", self.source),
        })
    }

    pub fn registry_path(&self) -> PathBuf {
        match &self.registry_path {
            Some(p) => PathBuf::from(p),
            None => paths::registry_file(),
        }
    }

    /// Resolve into extension settings, with `source` taking precedence over
    /// the config file when given.
    pub fn settings(&self, source: Option<SourceKind>) -> Result<ExtensionSettings, SearchError> {
        let source = match source {
            Some(kind) => kind,
            None => self.source_kind()?,
        };
        Ok(ExtensionSettings {
            source,
            registry_path: self.registry_path(),
            vboxmanage: self.vboxmanage.clone(),
            debounce: Duration::from_millis(self.debounce_ms),
        })
    }
}

// ── validation ────────────────────────────────────────────

fn validate_config(config: &Config) -> Result<(), SearchError> {
    config.source_kind()?;
    if config.vboxmanage.trim().is_empty() {
        return Err(SearchError::Validation {
            message: "vboxmanage must not be empty".into(),
        });
    }
    if config
        .registry_path
        .as_deref()
        .is_some_and(|p| p.trim().is_empty())
    {
        return Err(SearchError::Validation {
            message: "registry_path must not be empty when set".into(),
        });
    }
    if config.debounce_ms > MAX_DEBOUNCE_MS {
        return Err(SearchError::Validation {
            message: format!(
                "debounce_ms must be at most {MAX_DEBOUNCE_MS} (got {})",
                config.debounce_ms
            ),
        });
    }
    Ok(())
}

/// Top-level keys the config does not define. The config is flat, so any
/// table header is unknown as well. Lines inside multi-line strings and
/// wrapped arrays are continuation lines, not keys.
fn unknown_keys(contents: &str) -> Vec<String> {
    let mut unknown = Vec::new();
    let mut open_string: Option<&str> = None;
    let mut array_depth = 0usize;

    for line in contents.lines().map(str::trim) {
        if let Some(delim) = open_string {
            if line.matches(delim).count() % 2 == 1 {
                open_string = None;
            }
            continue;
        }
        if array_depth > 0 {
            array_depth = nested_depth(line, array_depth);
            continue;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            unknown.push(line.trim_matches(['[', ']']).trim().to_string());
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().trim_matches(['"', '\'']);
        if !KNOWN_KEYS.contains(&key) {
            unknown.push(key.to_string());
        }

        let value = value.trim();
        open_string = ["\"\"\"", "'''"]
            .into_iter()
            .find(|delim| value.matches(delim).count() % 2 == 1);
        if open_string.is_none() && value.starts_with('[') {
            array_depth = nested_depth(value, 0);
        }
    }
    unknown
}

/// Bracket depth after `line`, ignoring brackets inside quoted strings.
fn nested_depth(line: &str, mut depth: usize) -> usize {
    let mut quote: Option<char> = None;
    for c in line.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '#') => break,
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

// ── public API ────────────────────────────────────────────

pub fn parse_config(contents: &str, path: &Path) -> Result<Config, SearchError> {
    let config: Config = facet_toml::from_str(contents).map_err(|e| SearchError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    validate_config(&config)?;
    for key in unknown_keys(contents) {
        tracing::warn!(path = %path.display(), key = %key, "ignoring unknown config key");
    }
    Ok(config)
}

/// Load `path`, or the default config location when `None`.
///
/// The default file is optional: when it does not exist, defaults apply. An
/// explicitly given file must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config, SearchError> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (paths::config_file(), false),
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        Err(source) => {
            return Err(SearchError::ConfigLoad {
                path: path.display().to_string(),
                source,
            });
        }
    };

    parse_config(&contents, &path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<Config, SearchError> {
        parse_config(toml, Path::new("config.toml"))
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.source, "file");
        assert_eq!(config.vboxmanage, "vboxmanage");
        assert_eq!(config.debounce_ms, 100);
        assert!(config.registry_path.is_none());
    }

    #[test]
    fn all_keys() {
        let config = parse(
            r#"
source = "command"
registry_path = "/srv/vbox/VirtualBox.xml"
vboxmanage = "/usr/bin/VBoxManage"
debounce_ms = 250
"#,
        )
        .unwrap();
        let settings = config.settings(None).unwrap();
        assert_eq!(settings.source, SourceKind::Command);
        assert_eq!(settings.registry_path, PathBuf::from("/srv/vbox/VirtualBox.xml"));
        assert_eq!(settings.vboxmanage, "/usr/bin/VBoxManage");
        assert_eq!(settings.debounce, Duration::from_millis(250));
    }

    #[test]
    fn cli_source_overrides_file() {
        let config = parse("source = \"command\"").unwrap();
        let settings = config.settings(Some(SourceKind::File)).unwrap();
        assert_eq!(settings.source, SourceKind::File);
    }

    #[test]
    fn default_registry_path_is_under_home() {
        let config = Config::default();
        assert!(config.registry_path().ends_with(".VirtualBox/VirtualBox.xml"));
    }

    #[test]
    fn rejects_unknown_source() {
        let err = parse("source = \"xml\"").unwrap_err();
        assert!(err.to_string().contains("source must be"));
    }

    #[test]
    fn rejects_empty_vboxmanage() {
        assert!(parse("vboxmanage = \"\"").is_err());
    }

    #[test]
    fn rejects_huge_debounce() {
        assert!(parse("debounce_ms = 60000").is_err());
    }

    #[test]
    fn rejects_invalid_toml() {
        let err = parse("source = [").unwrap_err();
        assert!(matches!(err, SearchError::ConfigParse { .. }), "got {err:?}");
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn unknown_keys_are_reported() {
        let contents = r#"
# comment = ignored
source = "file"
vboxmanag = "/usr/bin/VBoxManage"
"debounce_ms" = 50

[extra]
"#;
        assert_eq!(unknown_keys(contents), ["vboxmanag", "extra"]);
        assert!(unknown_keys("source = \"command\"\ndebounce_ms = 5\n").is_empty());
        assert!(parse("bogus_key = 1").is_ok());
    }

    #[test]
    fn continuation_lines_are_not_keys() {
        let contents = r#"
vboxmanage = """
x = 1
"""
registry_path = "/srv/VirtualBox.xml"
extra = [
  "a = b",
  [1, 2],
]
debounce_ms = 5
"#;
        assert_eq!(unknown_keys(contents), ["extra"]);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/config.toml"))).unwrap_err();
        assert!(matches!(err, SearchError::ConfigLoad { .. }));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "source = \"command\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.source_kind().unwrap(), SourceKind::Command);
    }
}
