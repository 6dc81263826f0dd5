use chrono::{DateTime, Local};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use thiserror::Error;

use crate::calendar::{self, TimeRange};

const ID_LEN: usize = 12;

pub const DEFAULT_TASK_NAME: &str = "New task";
pub const DEFAULT_SUBTASK_NAME: &str = "New subtask";

pub type TaskId = String;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("cannot move task {task} under {parent}: it would become its own ancestor")]
    WouldCreateCycle { task: String, parent: String },
    #[error("invalid color {color:?}: {reason}")]
    InvalidColor { color: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEntry {
    pub start: DateTime<Local>,
    /// `None` while the timer is running.
    pub end: Option<DateTime<Local>>,
}

impl TimeEntry {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Length of the entry, with an open entry running until `now`, clipped to `range`.
    pub fn seconds_at(&self, range: Option<&TimeRange>, now: DateTime<Local>) -> i64 {
        let end = self.end.unwrap_or(now);
        match range {
            Some(range) => range.overlap_seconds(self.start, end),
            None => (end - self.start).num_seconds().max(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    pub timestamp: DateTime<Local>,
    pub delta_seconds: i64,
}

impl Adjustment {
    pub fn applies_to(&self, range: Option<&TimeRange>) -> bool {
        range.is_none_or(|range| range.contains(self.timestamp))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub color: Option<String>,
    pub daily_goal_seconds: Option<u64>,
    pub time_entries: Vec<TimeEntry>,
    pub adjustments: Vec<Adjustment>,
    pub children: Vec<Task>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            color: None,
            daily_goal_seconds: None,
            time_entries: Vec::new(),
            adjustments: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.time_entries.iter().any(TimeEntry::is_open)
    }

    /// Opens a new entry unless one is already open on this task. Other running
    /// tasks are left alone; callers switch timers with [`stop_all`] first.
    pub fn start_at(&mut self, now: DateTime<Local>) {
        if !self.is_running() {
            self.time_entries.push(TimeEntry {
                start: now,
                end: None,
            });
        }
    }

    pub fn start(&mut self) {
        self.start_at(calendar::now());
    }

    /// Closes the most recently appended open entry. Returns whether one was open.
    pub fn stop_at(&mut self, now: DateTime<Local>) -> bool {
        match self.time_entries.iter_mut().rev().find(|entry| entry.is_open()) {
            Some(entry) => {
                entry.end = Some(now);
                true
            }
            None => false,
        }
    }

    pub fn stop(&mut self) -> bool {
        self.stop_at(calendar::now())
    }

    pub fn add_adjustment_at(&mut self, delta_seconds: i64, now: DateTime<Local>) {
        self.adjustments.push(Adjustment {
            timestamp: now,
            delta_seconds,
        });
    }

    pub fn add_adjustment(&mut self, delta_seconds: i64) {
        self.add_adjustment_at(delta_seconds, calendar::now());
    }

    /// Time recorded on this task alone, children excluded.
    pub fn own_seconds_at(&self, range: Option<&TimeRange>, now: DateTime<Local>) -> i64 {
        let tracked: i64 = self
            .time_entries
            .iter()
            .map(|entry| entry.seconds_at(range, now))
            .fold(0, i64::saturating_add);
        let adjusted: i64 = self
            .adjustments
            .iter()
            .filter(|adjustment| adjustment.applies_to(range))
            .map(|adjustment| adjustment.delta_seconds)
            .fold(0, i64::saturating_add);
        tracked.saturating_add(adjusted)
    }

    pub fn own_seconds(&self, range: Option<&TimeRange>) -> i64 {
        self.own_seconds_at(range, calendar::now())
    }

    /// Own time plus the aggregate of every child, recomputed on each call.
    pub fn aggregate_seconds_at(&self, range: Option<&TimeRange>, now: DateTime<Local>) -> i64 {
        walk(std::slice::from_ref(self))
            .map(|task| task.own_seconds_at(range, now))
            .fold(0, i64::saturating_add)
    }

    pub fn aggregate_seconds(&self, range: Option<&TimeRange>) -> i64 {
        self.aggregate_seconds_at(range, calendar::now())
    }

    pub fn today_seconds_at(&self, now: DateTime<Local>) -> i64 {
        self.aggregate_seconds_at(Some(&calendar::day_range(now)), now)
    }

    pub fn week_seconds_at(&self, now: DateTime<Local>) -> i64 {
        self.aggregate_seconds_at(Some(&calendar::week_range(now)), now)
    }

    pub fn month_seconds_at(&self, now: DateTime<Local>) -> i64 {
        self.aggregate_seconds_at(Some(&calendar::month_range(now)), now)
    }

    pub fn total_seconds_at(&self, now: DateTime<Local>) -> i64 {
        self.aggregate_seconds_at(None, now)
    }

    pub fn today_seconds(&self) -> i64 {
        self.today_seconds_at(calendar::now())
    }

    pub fn week_seconds(&self) -> i64 {
        self.week_seconds_at(calendar::now())
    }

    pub fn month_seconds(&self) -> i64 {
        self.month_seconds_at(calendar::now())
    }

    pub fn total_seconds(&self) -> i64 {
        self.total_seconds_at(calendar::now())
    }

    pub fn goal_reached_at(&self, now: DateTime<Local>) -> bool {
        match self.daily_goal_seconds {
            Some(goal) if goal > 0 => self.today_seconds_at(now) >= goal as i64,
            _ => false,
        }
    }

    /// Applies a trimmed name; blank input keeps the current name.
    pub fn rename(&mut self, name: &str) -> &str {
        let trimmed = name.trim();
        if !trimmed.is_empty() {
            self.name = trimmed.to_string();
        }
        &self.name
    }

    pub fn contains(&self, id: &str) -> bool {
        walk(std::slice::from_ref(self)).any(|task| task.id == id)
    }
}

/// Pre-order traversal that also reports the depth of each task.
pub struct DepthWalk<'a> {
    stack: Vec<(usize, &'a Task)>,
}

impl<'a> Iterator for DepthWalk<'a> {
    type Item = (usize, &'a Task);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, task) = self.stack.pop()?;
        self.stack
            .extend(task.children.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, task))
    }
}

pub fn walk_with_depth(forest: &[Task]) -> DepthWalk<'_> {
    DepthWalk {
        stack: forest.iter().rev().map(|task| (0, task)).collect(),
    }
}

/// Lazy pre-order traversal: each task comes before its children.
pub fn walk(forest: &[Task]) -> impl Iterator<Item = &Task> {
    walk_with_depth(forest).map(|(_, task)| task)
}

/// Visits every task mutably in pre-order.
pub fn for_each_mut(forest: &mut [Task], visit: &mut impl FnMut(&mut Task)) {
    for task in forest.iter_mut() {
        visit(task);
        for_each_mut(&mut task.children, visit);
    }
}

/// Stops every running task and returns the id of the last one stopped.
pub fn stop_all_at(forest: &mut [Task], now: DateTime<Local>) -> Option<TaskId> {
    let mut last_stopped = None;
    for_each_mut(forest, &mut |task: &mut Task| {
        let mut stopped = false;
        while task.is_running() {
            stopped |= task.stop_at(now);
        }
        if stopped {
            last_stopped = Some(task.id.clone());
        }
    });
    last_stopped
}

pub fn stop_all(forest: &mut [Task]) -> Option<TaskId> {
    stop_all_at(forest, calendar::now())
}

pub fn running_tasks(forest: &[Task]) -> Vec<&Task> {
    walk(forest).filter(|task| task.is_running()).collect()
}

/// Holds when at most one task in the whole forest has an open entry.
pub fn has_single_active_timer(forest: &[Task]) -> bool {
    walk(forest)
        .flat_map(|task| task.time_entries.iter())
        .filter(|entry| entry.is_open())
        .count()
        <= 1
}

pub fn find_by_id<'a>(forest: &'a [Task], id: &str) -> Option<&'a Task> {
    walk(forest).find(|task| task.id == id)
}

pub fn find_by_id_mut<'a>(forest: &'a mut [Task], id: &str) -> Option<&'a mut Task> {
    for task in forest.iter_mut() {
        if task.id == id {
            return Some(task);
        }
        if let Some(found) = find_by_id_mut(&mut task.children, id) {
            return Some(found);
        }
    }
    None
}

/// Finds the sibling list holding `id` together with its index in that list.
pub fn siblings_of_mut<'a>(forest: &'a mut Vec<Task>, id: &str) -> Option<(&'a mut Vec<Task>, usize)> {
    if let Some(index) = forest.iter().position(|task| task.id == id) {
        return Some((forest, index));
    }
    for task in forest.iter_mut() {
        if let Some(found) = siblings_of_mut(&mut task.children, id) {
            return Some(found);
        }
    }
    None
}

/// Swaps `siblings[index]` with its neighbour in `direction` when that neighbour
/// exists. Returns where the item ended up.
pub fn move_within_parent(siblings: &mut [Task], index: usize, direction: isize) -> usize {
    match index.checked_add_signed(direction) {
        Some(target) if index < siblings.len() && target < siblings.len() => {
            siblings.swap(index, target);
            target
        }
        _ => index,
    }
}

pub fn move_task(forest: &mut Vec<Task>, id: &str, direction: isize) -> Result<usize, TreeError> {
    let (siblings, index) =
        siblings_of_mut(forest, id).ok_or_else(|| TreeError::TaskNotFound(id.to_string()))?;
    Ok(move_within_parent(siblings, index, direction))
}

/// Appends `task` to the children of `parent_id`, or to the roots when `None`.
pub fn insert_task(forest: &mut Vec<Task>, parent_id: Option<&str>, task: Task) -> Result<(), TreeError> {
    match parent_id {
        Some(parent_id) => {
            let parent = find_by_id_mut(forest, parent_id)
                .ok_or_else(|| TreeError::TaskNotFound(parent_id.to_string()))?;
            parent.children.push(task);
        }
        None => forest.push(task),
    }
    Ok(())
}

/// Detaches a task and its subtree from wherever it lives.
pub fn remove_task(forest: &mut Vec<Task>, id: &str) -> Result<Task, TreeError> {
    let (siblings, index) =
        siblings_of_mut(forest, id).ok_or_else(|| TreeError::TaskNotFound(id.to_string()))?;
    Ok(siblings.remove(index))
}

/// Moves a task with its subtree under `new_parent`, or to the roots when `None`.
pub fn reparent(forest: &mut Vec<Task>, id: &str, new_parent: Option<&str>) -> Result<(), TreeError> {
    let task = find_by_id(forest, id).ok_or_else(|| TreeError::TaskNotFound(id.to_string()))?;
    if let Some(parent_id) = new_parent {
        if task.contains(parent_id) {
            return Err(TreeError::WouldCreateCycle {
                task: id.to_string(),
                parent: parent_id.to_string(),
            });
        }
        if find_by_id(forest, parent_id).is_none() {
            return Err(TreeError::TaskNotFound(parent_id.to_string()));
        }
    }

    let task = remove_task(forest, id)?;
    insert_task(forest, new_parent, task)
}

pub fn generate_id() -> TaskId {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}
