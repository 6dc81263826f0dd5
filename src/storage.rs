use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::calendar;
use crate::domain::{Adjustment, Task, TimeEntry};

pub const DATA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt data at {location}: {reason}")]
    CorruptData { location: String, reason: String },
    #[error("failed to encode task data: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to parse settings: {0}")]
    SettingsDecode(#[from] toml::de::Error),
    #[error("failed to encode settings: {0}")]
    SettingsEncode(#[from] toml::ser::Error),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn corrupt(location: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::CorruptData {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DataDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    tasks: Vec<TaskRecord>,
}

fn default_version() -> u32 {
    DATA_VERSION
}

#[derive(Debug, Serialize, Deserialize)]
struct TaskRecord {
    id: String,
    name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    daily_goal_sec: Option<u64>,
    #[serde(default)]
    time_entries: Vec<TimeEntryRecord>,
    #[serde(default)]
    adjustments: Vec<AdjustmentRecord>,
    #[serde(default)]
    children: Vec<TaskRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TimeEntryRecord {
    start: String,
    #[serde(default)]
    end: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AdjustmentRecord {
    ts: String,
    delta_sec: i64,
}

fn encode_timestamp(timestamp: DateTime<Local>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Accepts RFC 3339 and offset-less ISO 8601, which is read as local time.
/// Sub-second precision is dropped.
fn decode_timestamp(raw: &str, location: impl FnOnce() -> String) -> Result<DateTime<Local>, StorageError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(calendar::truncate_to_second(timestamp.with_timezone(&Local)));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(calendar::truncate_to_second(calendar::resolve_local(naive)));
    }
    Err(StorageError::corrupt(
        location(),
        format!("{raw:?} is not an ISO-8601 timestamp"),
    ))
}

fn task_to_record(task: &Task) -> TaskRecord {
    TaskRecord {
        id: task.id.clone(),
        name: task.name.clone(),
        color: task.color.clone(),
        daily_goal_sec: task.daily_goal_seconds,
        time_entries: task
            .time_entries
            .iter()
            .map(|entry| TimeEntryRecord {
                start: encode_timestamp(entry.start),
                end: entry.end.map(encode_timestamp),
            })
            .collect(),
        adjustments: task
            .adjustments
            .iter()
            .map(|adjustment| AdjustmentRecord {
                ts: encode_timestamp(adjustment.timestamp),
                delta_sec: adjustment.delta_seconds,
            })
            .collect(),
        children: task.children.iter().map(task_to_record).collect(),
    }
}

fn task_from_record(record: TaskRecord) -> Result<Task, StorageError> {
    let id = record.id;
    if id.trim().is_empty() {
        return Err(StorageError::corrupt("task", "empty id"));
    }

    let mut time_entries = Vec::with_capacity(record.time_entries.len());
    for (index, entry) in record.time_entries.into_iter().enumerate() {
        let start = decode_timestamp(&entry.start, || format!("task {id} time_entries[{index}].start"))?;
        let end = match entry.end {
            Some(raw) => Some(decode_timestamp(&raw, || format!("task {id} time_entries[{index}].end"))?),
            None => None,
        };
        time_entries.push(TimeEntry { start, end });
    }

    let mut adjustments = Vec::with_capacity(record.adjustments.len());
    for (index, adjustment) in record.adjustments.into_iter().enumerate() {
        adjustments.push(Adjustment {
            timestamp: decode_timestamp(&adjustment.ts, || format!("task {id} adjustments[{index}].ts"))?,
            delta_seconds: adjustment.delta_sec,
        });
    }

    let children = record
        .children
        .into_iter()
        .map(task_from_record)
        .collect::<Result<Vec<_>, _>>()?;

    let name = if record.name.trim().is_empty() {
        warn!(task = %id, "task has an empty name; using \"Unnamed\"");
        "Unnamed".to_string()
    } else {
        record.name
    };

    Ok(Task {
        id,
        name,
        color: record.color,
        daily_goal_seconds: record.daily_goal_sec,
        time_entries,
        adjustments,
        children,
    })
}

pub fn tasks_to_json(roots: &[Task]) -> Result<String, StorageError> {
    let document = DataDocument {
        version: DATA_VERSION,
        tasks: roots.iter().map(task_to_record).collect(),
    };
    serde_json::to_string_pretty(&document).map_err(StorageError::Encode)
}

/// Decodes a whole data document. Any malformed record aborts the decode.
pub fn tasks_from_json(raw: &str) -> Result<Vec<Task>, StorageError> {
    let document: DataDocument = serde_json::from_str(raw).map_err(|err| {
        StorageError::corrupt(
            format!("line {} column {}", err.line(), err.column()),
            err.to_string(),
        )
    })?;
    if document.version > DATA_VERSION {
        warn!(version = document.version, "data file was written by a newer version");
    }
    document.tasks.into_iter().map(task_from_record).collect()
}

pub fn load_tasks(path: &Path) -> Result<Vec<Task>, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(StorageError::io(path, err)),
    };

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    tasks_from_json(&raw)
}

/// Copies the current data file to `backup_path`, then replaces it. A failed
/// backup is logged and does not stop the write.
pub fn save_tasks(path: &Path, backup_path: &Path, roots: &[Task]) -> Result<(), StorageError> {
    let encoded = tasks_to_json(roots)?;

    if path.exists() {
        if let Err(err) = fs::copy(path, backup_path) {
            warn!(path = %backup_path.display(), error = %err, "failed to back up task data");
        }
    }

    write_atomically(path, encoded.as_bytes())?;
    debug!(path = %path.display(), roots = roots.len(), "saved task data");
    Ok(())
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| StorageError::io(parent, err))?;
        }
    }

    let mut temp_name = OsString::from(path.as_os_str());
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    fs::write(&temp_path, contents).map_err(|err| StorageError::io(&temp_path, err))?;
    fs::rename(&temp_path, path).map_err(|err| StorageError::io(path, err))
}

pub const DEFAULT_APP_HOTKEY: &str = "<Ctrl><Alt><Shift>T";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Accelerator that shows or hides the application; passed through untouched.
    pub app_hotkey: String,
    pub autosave_interval_secs: u64,
    pub goal_check_interval_secs: u64,
    /// Accelerators keyed by task id.
    pub task_hotkeys: BTreeMap<String, String>,
    pub window: WindowGeometry,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_hotkey: DEFAULT_APP_HOTKEY.to_string(),
            autosave_interval_secs: 1800,
            goal_check_interval_secs: 30,
            task_hotkeys: BTreeMap::new(),
            window: WindowGeometry::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowGeometry {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub maximized: bool,
}

pub fn load_settings(path: &Path) -> Result<Settings, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Settings::default()),
        Err(err) => return Err(StorageError::io(path, err)),
    };

    Ok(toml::from_str(&raw)?)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), StorageError> {
    let encoded = toml::to_string_pretty(settings)?;
    write_atomically(path, encoded.as_bytes())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{Duration, Local, TimeZone};
    use tempfile::TempDir;

    use super::{
        Settings, StorageError, load_settings, load_tasks, save_settings, save_tasks, tasks_from_json,
        tasks_to_json,
    };
    use crate::domain::Task;

    fn sample_tree() -> Vec<Task> {
        let start = Local
            .with_ymd_and_hms(2026, 1, 5, 9, 0, 0)
            .single()
            .expect("unambiguous");
        let mut work = Task::new("Work");
        work.color = Some("#1f77b4".to_string());
        work.daily_goal_seconds = Some(4 * 3600);
        work.start_at(start);
        work.stop_at(start + Duration::minutes(90));
        work.add_adjustment_at(-600, start + Duration::hours(2));

        let mut email = Task::new("Email");
        email.start_at(start + Duration::hours(3));
        work.children.push(email);
        vec![work, Task::new("Home")]
    }

    #[test]
    fn round_trips_tree_through_json() {
        let tree = sample_tree();
        let encoded = tasks_to_json(&tree).expect("encode");
        let decoded = tasks_from_json(&encoded).expect("decode");
        assert_eq!(decoded, tree);
        assert!(decoded[0].children[0].is_running());
    }

    #[test]
    fn encodes_documented_field_names() {
        let encoded = tasks_to_json(&sample_tree()).expect("encode");
        let value: serde_json::Value = serde_json::from_str(&encoded).expect("valid json");
        assert_eq!(value["version"], 1);
        let work = &value["tasks"][0];
        assert_eq!(work["daily_goal_sec"], 14400);
        assert_eq!(work["adjustments"][0]["delta_sec"], -600);
        assert!(work["children"][0]["time_entries"][0]["end"].is_null());
        assert!(value["tasks"][1]["color"].is_null());
    }

    #[test]
    fn reads_offsetless_and_fractional_timestamps() {
        let raw = r#"{
            "version": 1,
            "tasks": [{
                "id": "abc",
                "name": "Legacy",
                "time_entries": [
                    {"start": "2026-01-05T09:00:00.123456+00:00", "end": "2026-01-05T10:00:00.5+00:00"},
                    {"start": "2026-01-05T11:00:00", "end": null}
                ],
                "adjustments": [{"ts": "2026-01-05T12:00:00", "delta_sec": 60}]
            }]
        }"#;
        let tasks = tasks_from_json(raw).expect("decode");
        let entry = &tasks[0].time_entries[0];
        assert_eq!(entry.end.map(|end| end - entry.start), Some(Duration::hours(1)));
        assert!(tasks[0].time_entries[1].end.is_none());
        assert_eq!(tasks[0].adjustments[0].delta_seconds, 60);
    }

    #[test]
    fn rejects_bad_timestamps_with_location() {
        let raw = r#"{"version": 1, "tasks": [{"id": "abc", "name": "Broken",
            "time_entries": [{"start": "yesterday-ish", "end": null}]}]}"#;
        match tasks_from_json(raw) {
            Err(StorageError::CorruptData { location, .. }) => {
                assert_eq!(location, "task abc time_entries[0].start");
            }
            other => panic!("expected corrupt data, got {other:?}"),
        }
    }

    #[test]
    fn rejects_fractional_deltas_and_missing_ids() {
        let fractional = r#"{"tasks": [{"id": "abc", "name": "x",
            "adjustments": [{"ts": "2026-01-05T12:00:00+00:00", "delta_sec": 1.5}]}]}"#;
        assert!(matches!(tasks_from_json(fractional), Err(StorageError::CorruptData { .. })));

        let missing_id = r#"{"tasks": [{"name": "x"}]}"#;
        assert!(matches!(tasks_from_json(missing_id), Err(StorageError::CorruptData { .. })));
    }

    #[test]
    fn missing_file_loads_as_empty_forest() {
        let dir = TempDir::new().expect("temp dir");
        let tasks = load_tasks(&dir.path().join("data.json")).expect("load");
        assert!(tasks.is_empty());
    }

    #[test]
    fn save_keeps_previous_file_as_backup() {
        let dir = TempDir::new().expect("temp dir");
        let data = dir.path().join("nested").join("data.json");
        let backup = dir.path().join("nested").join("data-backup.json");
        let mut tree = sample_tree();

        save_tasks(&data, &backup, &tree).expect("first save");
        assert!(!backup.exists());

        tree.push(Task::new("Reading"));
        save_tasks(&data, &backup, &tree).expect("second save");

        assert_eq!(load_tasks(&data).expect("load").len(), 3);
        assert_eq!(load_tasks(&backup).expect("load backup").len(), 2);
        assert!(!dir.path().join("nested").join("data.json.tmp").exists());
    }

    #[test]
    fn settings_default_and_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("settings.toml");
        assert_eq!(load_settings(&path).expect("defaults"), Settings::default());

        let mut settings = Settings::default();
        settings.task_hotkeys.insert("abc".to_string(), "<Ctrl>1".to_string());
        settings.window.width = Some(800);
        save_settings(&path, &settings).expect("save");
        assert_eq!(load_settings(&path).expect("load"), settings);

        fs::write(&path, "app_hotkey = \"<Super>T\"\n").expect("write");
        let partial = load_settings(&path).expect("partial");
        assert_eq!(partial.app_hotkey, "<Super>T");
        assert_eq!(partial.autosave_interval_secs, 1800);
    }
}
