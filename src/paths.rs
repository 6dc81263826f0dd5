use std::env;
use std::fs;
use std::io::Error;
use std::path::{Path, PathBuf};

const DATA_FILE: &str = "data.json";
const DATA_BACKUP_FILE: &str = "data-backup.json";
const SETTINGS_FILE: &str = "settings.toml";
const LOG_FILE: &str = "ttracker.log";
const DIR_NAME: &str = ".ttracker";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
	dir: PathBuf,
}

impl DataPaths {
	/// `--data-dir` wins, then `TTRACKER_DIR`, then `~/.ttracker`.
	pub fn resolve(cli_dir: Option<PathBuf>) -> Self {
		if let Some(dir) = cli_dir {
			return Self::in_dir(absolutize(dir));
		}

		if let Some(dir) = env::var_os("TTRACKER_DIR") {
			let dir = PathBuf::from(dir);
			if !dir.as_os_str().is_empty() {
				return Self::in_dir(absolutize(dir));
			}
		}

		Self::in_dir(default_dir())
	}

	pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn ensure_dir(&self) -> Result<(), Error> {
		fs::create_dir_all(&self.dir)
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn data_file(&self) -> PathBuf {
		self.dir.join(DATA_FILE)
	}

	pub fn backup_file(&self) -> PathBuf {
		self.dir.join(DATA_BACKUP_FILE)
	}

	pub fn settings_file(&self) -> PathBuf {
		self.dir.join(SETTINGS_FILE)
	}

	pub fn log_file(&self) -> PathBuf {
		self.dir.join(LOG_FILE)
	}
}

fn default_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join("ttracker");
		}
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path).join(DIR_NAME);
	}

	PathBuf::from(DIR_NAME)
}

fn absolutize(path: PathBuf) -> PathBuf {
	let path = if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	};

	if path.exists() {
		fs::canonicalize(&path).unwrap_or(path)
	} else {
		path
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::DataPaths;

	#[test]
	fn cli_dir_takes_precedence() {
		let dir = TempDir::new().expect("temp dir");
		let paths = DataPaths::resolve(Some(dir.path().to_path_buf()));
		let canonical = dir.path().canonicalize().expect("canonical");
		assert_eq!(paths.dir(), canonical.as_path());
		assert_eq!(paths.data_file(), canonical.join("data.json"));
		assert_eq!(paths.backup_file(), canonical.join("data-backup.json"));
		assert_eq!(paths.settings_file(), canonical.join("settings.toml"));
	}

	#[test]
	fn ensure_dir_creates_missing_directories() {
		let dir = TempDir::new().expect("temp dir");
		let paths = DataPaths::in_dir(dir.path().join("a").join("b"));
		paths.ensure_dir().expect("create");
		assert!(paths.dir().is_dir());
		assert_eq!(paths.log_file(), dir.path().join("a").join("b").join("ttracker.log"));
	}
}
