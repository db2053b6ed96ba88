use std::env;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "grind.toml";
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

#[derive(Debug)]
pub enum ConfigError {
	Io { path: PathBuf, source: std::io::Error },
	Parse { path: PathBuf, source: toml::de::Error },
	Invalid { path: PathBuf, reason: String },
}

impl Display for ConfigError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			ConfigError::Io { path, source } => {
				write!(f, "failed to read config {}: {source}", path.display())
			}
			ConfigError::Parse { path, source } => {
				write!(f, "failed to parse config {}: {source}", path.display())
			}
			ConfigError::Invalid { path, reason } => {
				write!(f, "invalid config {}: {reason}", path.display())
			}
		}
	}
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	pub state_path: PathBuf,
	pub chart_path: PathBuf,
	pub summary_path: PathBuf,
	pub readme_path: PathBuf,
	pub window_days: u32,
	pub publish: bool,
	pub repo_dir: PathBuf,
	pub git_program: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			state_path: PathBuf::from("grind_tracker.json"),
			chart_path: PathBuf::from("grind_report.svg"),
			summary_path: PathBuf::from("grind_summary.md"),
			readme_path: PathBuf::from("README.md"),
			window_days: DEFAULT_WINDOW_DAYS,
			publish: true,
			repo_dir: PathBuf::from("."),
			git_program: "git".to_string(),
		}
	}
}

impl Config {
	/// Files a publish step should pick up after a stop.
	pub fn tracked_files(&self) -> Vec<PathBuf> {
		vec![
			self.state_path.clone(),
			self.chart_path.clone(),
			self.summary_path.clone(),
			self.readme_path.clone(),
		]
	}

	/// The summary and readme carry the same text, so a chart link inside it
	/// only resolves for both when they live in the same directory.
	pub fn validate(&self) -> Result<(), String> {
		let summary_dir = absolute_lexical(self.summary_path.parent().unwrap_or(Path::new("")));
		let readme_dir = absolute_lexical(self.readme_path.parent().unwrap_or(Path::new("")));
		if summary_dir != readme_dir {
			return Err(format!(
				"summary_path ({}) and readme_path ({}) must be in the same directory",
				self.summary_path.display(),
				self.readme_path.display()
			));
		}
		Ok(())
	}
}

/// Absolute form of `path` without touching the file system; an empty path is
/// the working directory.
pub fn absolute_lexical(path: &Path) -> PathBuf {
	let path = if path.as_os_str().is_empty() {
		Path::new(".")
	} else {
		path
	};
	std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
	pub config_path: Option<PathBuf>,
	pub state_path: Option<PathBuf>,
	pub no_publish: bool,
}

pub fn resolve_config(overrides: &Overrides) -> Result<Config, ConfigError> {
	let (path, required) = config_path(overrides.config_path.clone());
	let mut config = load_config(&path, required)?;

	if let Some(path) = env::var_os("GRIND_STATE") {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			config.state_path = path;
		}
	}

	if let Some(path) = &overrides.state_path {
		config.state_path = path.clone();
	}

	if overrides.no_publish {
		config.publish = false;
	}

	Ok(config)
}

/// An explicitly named config must exist; the implicit `grind.toml` may not.
fn config_path(cli_path: Option<PathBuf>) -> (PathBuf, bool) {
	if let Some(path) = cli_path {
		return (path, true);
	}

	if let Some(path) = env::var_os("GRIND_CONFIG") {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return (path, true);
		}
	}

	(PathBuf::from(DEFAULT_CONFIG_FILE), false)
}

pub fn load_config(path: &Path, required: bool) -> Result<Config, ConfigError> {
	let raw = match fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound && !required => return Ok(Config::default()),
		Err(source) => {
			return Err(ConfigError::Io {
				path: path.to_path_buf(),
				source,
			});
		}
	};

	let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
		path: path.to_path_buf(),
		source,
	})?;
	config.validate().map_err(|reason| ConfigError::Invalid {
		path: path.to_path_buf(),
		reason,
	})?;
	Ok(config)
}

#[cfg(test)]
mod tests {
	use std::fs;
	use std::path::PathBuf;

	use super::{Config, ConfigError, load_config};

	#[test]
	fn missing_implicit_config_uses_defaults() {
		let dir = tempfile::tempdir().expect("tempdir");
		let config = load_config(&dir.path().join("grind.toml"), false).expect("defaults");
		assert_eq!(config, Config::default());
		assert_eq!(config.window_days, 7);
	}

	#[test]
	fn missing_explicit_config_is_an_error() {
		let dir = tempfile::tempdir().expect("tempdir");
		let err = load_config(&dir.path().join("custom.toml"), true).expect_err("must fail");
		assert!(matches!(err, ConfigError::Io { .. }));
	}

	#[test]
	fn partial_config_keeps_other_defaults() {
		let dir = tempfile::tempdir().expect("tempdir");
		let path = dir.path().join("grind.toml");
		fs::write(&path, "state_path = \"data/state.json\"\npublish = false\n").expect("write");

		let config = load_config(&path, true).expect("config should parse");
		assert_eq!(config.state_path, PathBuf::from("data/state.json"));
		assert!(!config.publish);
		assert_eq!(config.readme_path, PathBuf::from("README.md"));
		assert_eq!(config.tracked_files().len(), 4);
	}

	#[test]
	fn rejects_unknown_keys() {
		let dir = tempfile::tempdir().expect("tempdir");
		let path = dir.path().join("grind.toml");
		fs::write(&path, "stat_path = \"typo.json\"\n").expect("write");

		let err = load_config(&path, true).expect_err("must fail");
		assert!(matches!(err, ConfigError::Parse { .. }));
	}

	#[test]
	fn rejects_readme_outside_summary_dir() {
		let dir = tempfile::tempdir().expect("tempdir");
		let path = dir.path().join("grind.toml");
		fs::write(&path, "summary_path = \"out/grind_summary.md\"\n").expect("write");

		let err = load_config(&path, true).expect_err("must fail");
		assert!(matches!(err, ConfigError::Invalid { .. }));
	}

	#[test]
	fn accepts_documents_sharing_a_dir_away_from_chart() {
		let dir = tempfile::tempdir().expect("tempdir");
		let path = dir.path().join("grind.toml");
		fs::write(
			&path,
			"summary_path = \"docs/grind_summary.md\"\nreadme_path = \"docs/README.md\"\ngit_program = \"/usr/local/bin/git\"\n",
		)
		.expect("write");

		let config = load_config(&path, true).expect("config should parse");
		assert_eq!(config.chart_path, PathBuf::from("grind_report.svg"));
		assert_eq!(config.git_program, "/usr/local/bin/git");
	}
}
