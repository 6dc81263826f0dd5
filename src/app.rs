use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, Local, NaiveDate};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calendar;
use crate::colors::{assign_colors, color_in_use, is_valid_hex};
use crate::domain::{
    self, DEFAULT_SUBTASK_NAME, DEFAULT_TASK_NAME, Task, TaskId, TreeError, find_by_id, find_by_id_mut,
    running_tasks, walk,
};
use crate::duration::{DurationError, humanize_seconds, parse_duration_delta, parse_goal};
use crate::paths::DataPaths;
use crate::report::{self, Report, ReportError, ReportParams};
use crate::storage::{self, Settings, StorageError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Duration(#[from] DurationError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("cannot prepare data directory {path}: {source}")]
    DataDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Something the user should hear about: the dashboard shows it in the status
/// line and the CLI prints it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Started { task: String, today_seconds: i64 },
    Stopped { task: String, today_seconds: i64 },
    GoalReached { task: String, today_seconds: i64, goal_seconds: u64 },
    SaveFailed { reason: String },
}

impl Display for Notice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Started { task, today_seconds } => {
                write!(f, "timer started: {task} (today {})", humanize_seconds(*today_seconds))
            }
            Notice::Stopped { task, today_seconds } => {
                write!(f, "timer stopped: {task} (today {})", humanize_seconds(*today_seconds))
            }
            Notice::GoalReached {
                task,
                today_seconds,
                goal_seconds,
            } => write!(
                f,
                "daily goal reached: {task} (today {} / goal {})",
                humanize_seconds(*today_seconds),
                humanize_seconds(*goal_seconds as i64)
            ),
            Notice::SaveFailed { reason } => write!(f, "save failed: {reason}"),
        }
    }
}

/// Owns the task forest and settings. Every mutation and query runs on the
/// caller's thread; switching timers is `stop_all` followed by `start`.
pub struct Tracker {
    roots: Vec<Task>,
    settings: Settings,
    paths: DataPaths,
    goal_notified: HashMap<TaskId, NaiveDate>,
    notices: Vec<Notice>,
    dirty: bool,
    last_autosave: DateTime<Local>,
    last_goal_check: DateTime<Local>,
}

impl Tracker {
    pub fn open(paths: DataPaths) -> Result<Self, AppError> {
        Self::open_at(paths, calendar::now())
    }

    /// Loads settings and tasks. Colors missing from the data are assigned and
    /// persisted right away so they stay stable across runs.
    pub fn open_at(paths: DataPaths, now: DateTime<Local>) -> Result<Self, AppError> {
        paths.ensure_dir().map_err(|source| AppError::DataDir {
            path: paths.dir().display().to_string(),
            source,
        })?;
        let settings = storage::load_settings(&paths.settings_file())?;
        let roots = storage::load_tasks(&paths.data_file())?;

        let running = running_tasks(&roots);
        if running.len() > 1 {
            let names: Vec<&str> = running.iter().map(|task| task.name.as_str()).collect();
            warn!(?names, "more than one task is running in stored data");
        }

        let mut tracker = Self {
            roots,
            settings,
            paths,
            goal_notified: HashMap::new(),
            notices: Vec::new(),
            dirty: false,
            last_autosave: now,
            last_goal_check: now,
        };

        let assigned = assign_colors(&mut tracker.roots);
        if assigned > 0 {
            info!(assigned, "assigned colors to tasks");
            tracker.on_save()?;
        }
        debug!(roots = tracker.roots.len(), dir = %tracker.paths.dir().display(), "loaded tasks");
        Ok(tracker)
    }

    pub fn roots(&self) -> &[Task] {
        &self.roots
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn task(&self, id: &str) -> Result<&Task, AppError> {
        find_by_id(&self.roots, id).ok_or_else(|| TreeError::TaskNotFound(id.to_string()).into())
    }

    fn task_mut(&mut self, id: &str) -> Result<&mut Task, AppError> {
        find_by_id_mut(&mut self.roots, id).ok_or_else(|| TreeError::TaskNotFound(id.to_string()).into())
    }

    pub fn running_task(&self) -> Option<&Task> {
        walk(&self.roots).find(|task| task.is_running())
    }

    pub fn hotkey_for(&self, id: &str) -> Option<&str> {
        self.settings.task_hotkeys.get(id).map(String::as_str)
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn on_toggle(&mut self, id: &str) -> Result<bool, AppError> {
        self.on_toggle_at(id, calendar::now())
    }

    /// Stops whatever runs, then starts `id` unless it was the one running.
    /// Returns whether `id` is running afterwards.
    pub fn on_toggle_at(&mut self, id: &str, now: DateTime<Local>) -> Result<bool, AppError> {
        let was_running = self.task(id)?.is_running();
        domain::stop_all_at(&mut self.roots, now);
        self.goal_notified.remove(id);

        let task = self.task_mut(id)?;
        if !was_running {
            task.start_at(now);
        }
        let name = task.name.clone();
        let today_seconds = task.today_seconds_at(now);

        if was_running {
            info!(task = %name, "stopped timer");
            self.notices.push(Notice::Stopped {
                task: name,
                today_seconds,
            });
        } else {
            info!(task = %name, "started timer");
            self.notices.push(Notice::Started {
                task: name,
                today_seconds,
            });
        }

        self.maybe_notify_goal(id, now);
        self.dirty = true;
        self.on_save()?;
        Ok(!was_running)
    }

    pub fn on_stop_all(&mut self) -> Result<Option<TaskId>, AppError> {
        self.on_stop_all_at(calendar::now())
    }

    pub fn on_stop_all_at(&mut self, now: DateTime<Local>) -> Result<Option<TaskId>, AppError> {
        let stopped = domain::stop_all_at(&mut self.roots, now);
        if let Some(id) = &stopped {
            let task = self.task(id)?;
            let notice = Notice::Stopped {
                task: task.name.clone(),
                today_seconds: task.today_seconds_at(now),
            };
            info!(task = %task.name, "stopped timer");
            self.notices.push(notice);
            self.dirty = true;
            self.on_save()?;
        }
        Ok(stopped)
    }

    pub fn on_adjust(&mut self, id: &str, delta_text: &str) -> Result<i64, AppError> {
        self.on_adjust_at(id, delta_text, calendar::now())
    }

    /// Records a manual correction. Unparsable input leaves the task untouched.
    pub fn on_adjust_at(&mut self, id: &str, delta_text: &str, now: DateTime<Local>) -> Result<i64, AppError> {
        let delta = parse_duration_delta(delta_text)?;
        let task = self.task_mut(id)?;
        task.add_adjustment_at(delta, now);
        info!(task = %task.name, delta = %humanize_seconds(delta), "adjusted time");

        self.maybe_notify_goal(id, now);
        self.dirty = true;
        self.on_save()?;
        Ok(delta)
    }

    pub fn on_set_goal(&mut self, id: &str, duration_text: &str) -> Result<Option<u64>, AppError> {
        self.on_set_goal_at(id, duration_text, calendar::now())
    }

    /// Sets the daily goal; a zero duration clears it.
    pub fn on_set_goal_at(
        &mut self,
        id: &str,
        duration_text: &str,
        now: DateTime<Local>,
    ) -> Result<Option<u64>, AppError> {
        let seconds = parse_goal(duration_text)?;
        let goal = (seconds > 0).then_some(seconds);
        let task = self.task_mut(id)?;
        task.daily_goal_seconds = goal;
        match goal {
            Some(goal) => info!(task = %task.name, goal = %humanize_seconds(goal as i64), "set daily goal"),
            None => info!(task = %task.name, "cleared daily goal"),
        }

        self.dirty = true;
        self.on_save()?;
        self.maybe_notify_goal(id, now);
        Ok(goal)
    }

    /// Persists the forest. Failures are logged, queued as a notice and returned.
    pub fn on_save(&mut self) -> Result<(), AppError> {
        let assigned = assign_colors(&mut self.roots);
        if assigned > 0 {
            debug!(assigned, "assigned colors to tasks before save");
        }

        match storage::save_tasks(&self.paths.data_file(), &self.paths.backup_file(), &self.roots) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to save task data");
                self.notices.push(Notice::SaveFailed {
                    reason: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    /// Creates a root task, or a subtask when `parent` is given. Blank names fall
    /// back to the default name for the kind of task.
    pub fn add_task(&mut self, name: Option<&str>, parent: Option<&str>) -> Result<TaskId, AppError> {
        let default_name = if parent.is_some() {
            DEFAULT_SUBTASK_NAME
        } else {
            DEFAULT_TASK_NAME
        };
        let mut task = Task::new(default_name);
        if let Some(name) = name {
            task.rename(name);
        }
        let id = task.id.clone();
        info!(task = %task.name, parent = ?parent, "created task");
        domain::insert_task(&mut self.roots, parent, task)?;
        assign_colors(&mut self.roots);
        self.dirty = true;
        Ok(id)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<String, AppError> {
        let task = self.task_mut(id)?;
        let previous = task.name.clone();
        let current = task.rename(name).to_string();
        if current != previous {
            debug!(from = %previous, to = %current, "renamed task");
            self.dirty = true;
        }
        Ok(current)
    }

    pub fn recolor(&mut self, id: &str, color: &str) -> Result<(), AppError> {
        let color = color.trim().to_ascii_lowercase();
        if !is_valid_hex(&color) {
            return Err(TreeError::InvalidColor {
                color,
                reason: "expected #rrggbb".to_string(),
            }
            .into());
        }
        self.task(id)?;
        if color_in_use(&self.roots, &color, id) {
            return Err(TreeError::InvalidColor {
                color,
                reason: "already used by another task".to_string(),
            }
            .into());
        }

        self.task_mut(id)?.color = Some(color);
        self.dirty = true;
        Ok(())
    }

    /// Removes a task with its subtree. Hotkeys of removed tasks are dropped.
    pub fn delete(&mut self, id: &str) -> Result<Task, AppError> {
        let removed = domain::remove_task(&mut self.roots, id)?;
        info!(task = %removed.name, "deleted task");

        let removed_ids: Vec<TaskId> = walk(std::slice::from_ref(&removed))
            .map(|task| task.id.clone())
            .collect();
        for removed_id in &removed_ids {
            self.goal_notified.remove(removed_id);
        }
        let before = self.settings.task_hotkeys.len();
        self.settings
            .task_hotkeys
            .retain(|task_id, _| !removed_ids.contains(task_id));
        if self.settings.task_hotkeys.len() != before {
            storage::save_settings(&self.paths.settings_file(), &self.settings)?;
        }

        self.dirty = true;
        Ok(removed)
    }

    pub fn move_task(&mut self, id: &str, direction: isize) -> Result<usize, AppError> {
        let index = domain::move_task(&mut self.roots, id, direction)?;
        self.dirty = true;
        Ok(index)
    }

    pub fn reparent(&mut self, id: &str, parent: Option<&str>) -> Result<(), AppError> {
        domain::reparent(&mut self.roots, id, parent)?;
        self.dirty = true;
        Ok(())
    }

    /// Stores (or clears, with `None`) the accelerator for a task. The value is
    /// opaque here; binding it is the desktop layer's job.
    pub fn set_hotkey(&mut self, id: &str, accelerator: Option<String>) -> Result<(), AppError> {
        self.task(id)?;
        match accelerator.filter(|value| !value.trim().is_empty()) {
            Some(value) => {
                debug!(task = %id, accelerator = %value, "assigned hotkey");
                self.settings.task_hotkeys.insert(id.to_string(), value);
            }
            None => {
                debug!(task = %id, "cleared hotkey");
                self.settings.task_hotkeys.remove(id);
            }
        }
        storage::save_settings(&self.paths.settings_file(), &self.settings)?;
        Ok(())
    }

    pub fn report(&self, params: ReportParams) -> Result<Report, AppError> {
        Ok(report::generate(&self.roots, params)?)
    }

    pub fn report_at(&self, params: ReportParams, now: DateTime<Local>) -> Result<Report, AppError> {
        Ok(report::generate_at(&self.roots, params, now)?)
    }

    /// Emits a goal notice for every running task that reached its goal today.
    pub fn check_goals_at(&mut self, now: DateTime<Local>) {
        let running: Vec<TaskId> = running_tasks(&self.roots)
            .into_iter()
            .map(|task| task.id.clone())
            .collect();
        for id in running {
            self.maybe_notify_goal(&id, now);
        }
        self.last_goal_check = now;
    }

    /// Runs the periodic goal check and autosave when their intervals elapsed.
    pub fn tick_at(&mut self, now: DateTime<Local>) -> Result<(), AppError> {
        if now - self.last_goal_check >= interval(self.settings.goal_check_interval_secs) {
            self.check_goals_at(now);
        }

        if now - self.last_autosave >= interval(self.settings.autosave_interval_secs) {
            self.last_autosave = now;
            if self.dirty {
                debug!("autosave");
                self.on_save()?;
            }
        }
        Ok(())
    }

    fn maybe_notify_goal(&mut self, id: &str, now: DateTime<Local>) {
        let Some(task) = find_by_id(&self.roots, id) else {
            return;
        };
        let Some(goal_seconds) = task.daily_goal_seconds else {
            return;
        };

        let today = calendar::tracking_date(now);
        if self.goal_notified.get(id) == Some(&today) {
            return;
        }

        if task.goal_reached_at(now) {
            let today_seconds = task.today_seconds_at(now);
            info!(
                task = %task.name,
                today = %humanize_seconds(today_seconds),
                goal = %humanize_seconds(goal_seconds as i64),
                "daily goal reached"
            );
            self.notices.push(Notice::GoalReached {
                task: task.name.clone(),
                today_seconds,
                goal_seconds,
            });
            self.goal_notified.insert(id.to_string(), today);
        }
    }
}

fn interval(seconds: u64) -> Duration {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{DateTime, Duration, Local, TimeZone};
    use tempfile::TempDir;

    use super::{AppError, Notice, Tracker};
    use crate::domain::{TreeError, has_single_active_timer, walk};
    use crate::duration::DurationError;
    use crate::paths::DataPaths;
    use crate::storage::{self, StorageError};

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 4, 14, hour, minute, 0)
            .single()
            .expect("test instant should be unambiguous")
    }

    fn open(dir: &TempDir) -> Tracker {
        Tracker::open_at(DataPaths::in_dir(dir.path()), at(8, 0)).expect("open tracker")
    }

    #[test]
    fn toggle_switches_the_single_active_timer() {
        let dir = TempDir::new().expect("temp dir");
        let mut tracker = open(&dir);
        let work = tracker.add_task(Some("Work"), None).expect("add");
        let email = tracker.add_task(Some("Email"), Some(&work)).expect("add");

        assert_eq!(tracker.on_toggle_at(&work, at(9, 0)).expect("toggle"), true);
        assert_eq!(tracker.on_toggle_at(&email, at(10, 0)).expect("toggle"), true);

        assert!(has_single_active_timer(tracker.roots()));
        assert_eq!(tracker.running_task().map(|task| task.id.as_str()), Some(email.as_str()));
        assert_eq!(tracker.task(&work).expect("work").own_seconds_at(None, at(11, 0)), 3600);

        assert_eq!(tracker.on_toggle_at(&email, at(10, 30)).expect("toggle"), false);
        assert!(tracker.running_task().is_none());
        assert_eq!(tracker.task(&work).expect("work").aggregate_seconds_at(None, at(12, 0)), 5400);
    }

    #[test]
    fn toggle_persists_and_reloads() {
        let dir = TempDir::new().expect("temp dir");
        let mut tracker = open(&dir);
        let work = tracker.add_task(Some("Work"), None).expect("add");
        tracker.on_toggle_at(&work, at(9, 0)).expect("toggle");

        let reloaded = open(&dir);
        let task = reloaded.task(&work).expect("persisted");
        assert!(task.is_running());
        assert_eq!(task.color, tracker.task(&work).expect("task").color);
        assert!(task.color.is_some());
    }

    #[test]
    fn notices_report_start_and_stop() {
        let dir = TempDir::new().expect("temp dir");
        let mut tracker = open(&dir);
        let work = tracker.add_task(Some("Work"), None).expect("add");
        tracker.on_toggle_at(&work, at(9, 0)).expect("start");
        tracker.on_toggle_at(&work, at(9, 30)).expect("stop");

        let notices = tracker.drain_notices();
        assert_eq!(
            notices,
            vec![
                Notice::Started {
                    task: "Work".to_string(),
                    today_seconds: 0
                },
                Notice::Stopped {
                    task: "Work".to_string(),
                    today_seconds: 1800
                },
            ]
        );
        assert_eq!(notices[1].to_string(), "timer stopped: Work (today 30m 0s)");
        assert!(tracker.drain_notices().is_empty());
    }

    #[test]
    fn adjust_rejects_bad_input_without_mutation() {
        let dir = TempDir::new().expect("temp dir");
        let mut tracker = open(&dir);
        let work = tracker.add_task(Some("Work"), None).expect("add");

        assert!(matches!(
            tracker.on_adjust_at(&work, "lots", at(9, 0)),
            Err(AppError::Duration(DurationError::InvalidDurationFormat { .. }))
        ));
        assert!(tracker.task(&work).expect("task").adjustments.is_empty());

        assert_eq!(tracker.on_adjust_at(&work, "+1h30m", at(9, 0)).expect("adjust"), 5400);
        assert_eq!(tracker.task(&work).expect("task").today_seconds_at(at(10, 0)), 5400);
    }

    #[test]
    fn goal_notice_fires_once_per_day() {
        let dir = TempDir::new().expect("temp dir");
        let mut tracker = open(&dir);
        let work = tracker.add_task(Some("Work"), None).expect("add");
        assert_eq!(tracker.on_set_goal_at(&work, "+1h", at(8, 0)).expect("goal"), Some(3600));
        tracker.on_toggle_at(&work, at(9, 0)).expect("start");
        tracker.drain_notices();

        tracker.check_goals_at(at(9, 30));
        assert!(tracker.drain_notices().is_empty());

        tracker.check_goals_at(at(10, 0));
        let notices = tracker.drain_notices();
        assert_eq!(notices.len(), 1);
        assert!(matches!(notices[0], Notice::GoalReached { goal_seconds: 3600, .. }));

        tracker.check_goals_at(at(10, 30));
        assert!(tracker.drain_notices().is_empty());

        let tomorrow = at(10, 0) + Duration::days(1);
        tracker.check_goals_at(tomorrow);
        assert_eq!(tracker.drain_notices().len(), 1);
    }

    #[test]
    fn zero_goal_clears_it() {
        let dir = TempDir::new().expect("temp dir");
        let mut tracker = open(&dir);
        let work = tracker.add_task(Some("Work"), None).expect("add");
        tracker.on_set_goal_at(&work, "-2h", at(8, 0)).expect("goal");
        assert_eq!(tracker.task(&work).expect("task").daily_goal_seconds, Some(7200));
        assert_eq!(tracker.on_set_goal_at(&work, "0m", at(8, 0)).expect("goal"), None);
        assert_eq!(tracker.task(&work).expect("task").daily_goal_seconds, None);
    }

    #[test]
    fn delete_prunes_hotkeys_of_whole_subtree() {
        let dir = TempDir::new().expect("temp dir");
        let mut tracker = open(&dir);
        let work = tracker.add_task(Some("Work"), None).expect("add");
        let email = tracker.add_task(None, Some(&work)).expect("add");
        let home = tracker.add_task(Some("Home"), None).expect("add");
        tracker.set_hotkey(&email, Some("<Ctrl>1".to_string())).expect("hotkey");
        tracker.set_hotkey(&home, Some("<Ctrl>2".to_string())).expect("hotkey");

        assert_eq!(tracker.task(&email).expect("task").name, "New subtask");
        let removed = tracker.delete(&work).expect("delete");
        assert_eq!(removed.children.len(), 1);
        assert_eq!(tracker.hotkey_for(&email), None);
        assert_eq!(tracker.hotkey_for(&home), Some("<Ctrl>2"));

        let settings = storage::load_settings(&tracker.paths().settings_file()).expect("settings");
        assert_eq!(settings.task_hotkeys.len(), 1);
        assert!(matches!(
            tracker.delete(&work),
            Err(AppError::Tree(TreeError::TaskNotFound(_)))
        ));
    }

    #[test]
    fn recolor_rejects_invalid_and_taken_colors() {
        let dir = TempDir::new().expect("temp dir");
        let mut tracker = open(&dir);
        let work = tracker.add_task(Some("Work"), None).expect("add");
        let home = tracker.add_task(Some("Home"), None).expect("add");
        let work_color = tracker.task(&work).expect("task").color.clone().expect("assigned");

        assert!(matches!(
            tracker.recolor(&home, "blue"),
            Err(AppError::Tree(TreeError::InvalidColor { .. }))
        ));
        assert!(matches!(
            tracker.recolor(&home, &work_color.to_uppercase()),
            Err(AppError::Tree(TreeError::InvalidColor { .. }))
        ));
        tracker.recolor(&home, "#ABCDEF").expect("recolor");
        assert_eq!(tracker.task(&home).expect("task").color.as_deref(), Some("#abcdef"));
    }

    #[test]
    fn structural_edits_mark_dirty_until_saved() {
        let dir = TempDir::new().expect("temp dir");
        let mut tracker = open(&dir);
        let work = tracker.add_task(Some("Work"), None).expect("add");
        let home = tracker.add_task(Some("Home"), None).expect("add");
        tracker.on_save().expect("save");
        assert!(!tracker.is_dirty());

        assert_eq!(tracker.move_task(&home, -1).expect("move"), 0);
        tracker.reparent(&work, Some(&home)).expect("reparent");
        assert_eq!(tracker.rename(&work, "  ").expect("rename"), "Work");
        assert!(tracker.is_dirty());

        tracker.tick_at(at(8, 0) + Duration::minutes(31)).expect("tick");
        assert!(!tracker.is_dirty());
        let reloaded = open(&dir);
        let names: Vec<_> = walk(reloaded.roots()).map(|task| task.name.clone()).collect();
        assert_eq!(names, ["Home", "Work"]);
    }

    #[test]
    fn corrupt_data_aborts_open() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(
            dir.path().join("data.json"),
            r#"{"version": 1, "tasks": [{"id": "x", "name": "Bad", "adjustments": [{"ts": "nope", "delta_sec": 5}]}]}"#,
        )
        .expect("write");

        let result = Tracker::open_at(DataPaths::in_dir(dir.path()), at(8, 0));
        assert!(matches!(
            result,
            Err(AppError::Storage(StorageError::CorruptData { .. }))
        ));
    }

    #[test]
    fn save_failure_is_surfaced() {
        let dir = TempDir::new().expect("temp dir");
        let mut tracker = open(&dir);
        tracker.add_task(Some("Work"), None).expect("add");
        fs::create_dir_all(dir.path().join("data.json.tmp")).expect("block temp file");

        assert!(matches!(tracker.on_save(), Err(AppError::Storage(StorageError::Io { .. }))));
        assert!(tracker.is_dirty());
        assert!(matches!(
            tracker.drain_notices().as_slice(),
            [Notice::SaveFailed { .. }]
        ));
    }

    #[test]
    fn open_assigns_and_persists_missing_colors() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(
            dir.path().join("data.json"),
            r#"{"version": 1, "tasks": [{"id": "a", "name": "Plain", "color": null}]}"#,
        )
        .expect("write");

        let tracker = open(&dir);
        let color = tracker.task("a").expect("task").color.clone();
        assert!(color.is_some());
        let stored = storage::load_tasks(&tracker.paths().data_file()).expect("reload");
        assert_eq!(stored[0].color, color);
    }
}
