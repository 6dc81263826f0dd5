//! Range reports: bins over a period and per-root breakdowns of tracked time.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Duration, Local, NaiveDate};
use thiserror::Error;
use tracing::warn;

use crate::calendar::{self, TimeRange};
use crate::domain::Task;

/// Key for a root's own time that was not delegated to a child.
pub const OTHER_PART: &str = "other";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("invalid granularity {0:?}: expected days, weeks or months")]
    InvalidGranularity(String),
    #[error("invalid range: end {end} is not after start {start}")]
    InvalidRange {
        start: DateTime<Local>,
        end: DateTime<Local>,
    },
    #[error("invalid date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("unknown preset {0:?}")]
    UnknownPreset(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Days,
    Weeks,
    Months,
}

impl Granularity {
    pub fn next(self) -> Self {
        match self {
            Granularity::Days => Granularity::Weeks,
            Granularity::Weeks => Granularity::Months,
            Granularity::Months => Granularity::Days,
        }
    }
}

impl FromStr for Granularity {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "days" | "day" => Ok(Granularity::Days),
            "weeks" | "week" => Ok(Granularity::Weeks),
            "months" | "month" => Ok(Granularity::Months),
            _ => Err(ReportError::InvalidGranularity(value.to_string())),
        }
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Granularity::Days => "days",
            Granularity::Weeks => "weeks",
            Granularity::Months => "months",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    CurrentWeek,
    CurrentMonth,
    Last7,
    Last30,
    CurrentYear,
    Last365,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::CurrentWeek,
        Preset::CurrentMonth,
        Preset::Last7,
        Preset::Last30,
        Preset::CurrentYear,
        Preset::Last365,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Preset::CurrentWeek => "current_week",
            Preset::CurrentMonth => "current_month",
            Preset::Last7 => "last_7",
            Preset::Last30 => "last_30",
            Preset::CurrentYear => "current_year",
            Preset::Last365 => "last_365",
        }
    }

    pub fn range_at(self, now: DateTime<Local>) -> TimeRange {
        let trailing = |days: i64| {
            let today = calendar::tracking_date(now);
            TimeRange::new(
                calendar::cutoff_on(calendar::shift_days(today, -(days - 1))),
                calendar::day_end(now),
            )
        };
        match self {
            Preset::CurrentWeek => calendar::week_range(now),
            Preset::CurrentMonth => calendar::month_range(now),
            Preset::Last7 => trailing(7),
            Preset::Last30 => trailing(30),
            Preset::CurrentYear => calendar::year_range(now),
            Preset::Last365 => trailing(365),
        }
    }
}

impl FromStr for Preset {
    type Err = ReportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.key() == value.trim())
            .ok_or_else(|| ReportError::UnknownPreset(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportParams {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub granularity: Granularity,
}

impl ReportParams {
    pub fn new(
        start: DateTime<Local>,
        end: DateTime<Local>,
        granularity: Granularity,
    ) -> Result<Self, ReportError> {
        if end <= start {
            return Err(ReportError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            granularity,
        })
    }

    pub fn from_preset(preset: Preset, granularity: Granularity, now: DateTime<Local>) -> Result<Self, ReportError> {
        let range = preset.range_at(now);
        Self::new(range.start, range.end, granularity)
    }

    /// Inclusive range of tracking days `from..=to`, both given as `YYYY-MM-DD`.
    pub fn custom(from: &str, to: &str, granularity: Granularity) -> Result<Self, ReportError> {
        let from = parse_date(from)?;
        let to = parse_date(to)?;
        Self::new(
            calendar::cutoff_on(from),
            calendar::cutoff_on(calendar::shift_days(to, 1)),
            granularity,
        )
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, ReportError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ReportError::InvalidDate(value.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub label: String,
}

impl Bin {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

/// Partitions `[start, end)` into day, week or month bins. Bins follow natural
/// period boundaries; the first bin starts at `start` and the last stops at
/// `end`, so no bin reaches outside the range.
pub fn build_bins(
    start: DateTime<Local>,
    end: DateTime<Local>,
    granularity: Granularity,
) -> Result<Vec<Bin>, ReportError> {
    if end <= start {
        return Err(ReportError::InvalidRange { start, end });
    }

    let mut bins = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let natural = match granularity {
            Granularity::Days => calendar::day_range(cursor),
            Granularity::Weeks => calendar::week_range(cursor),
            Granularity::Months => calendar::month_range(cursor),
        };
        let bin_start = if natural.start > start { natural.start } else { start };
        let bin_end = if natural.end < end { natural.end } else { end };
        let first_day = calendar::tracking_date(bin_start);
        let label = match granularity {
            Granularity::Days => first_day.format("%Y-%m-%d").to_string(),
            Granularity::Weeks => format!(
                "{}..{}",
                first_day.format("%Y-%m-%d"),
                calendar::tracking_date(bin_end - Duration::seconds(1)).format("%Y-%m-%d")
            ),
            Granularity::Months => first_day.format("%Y-%m").to_string(),
        };
        bins.push(Bin {
            start: bin_start,
            end: bin_end,
            label,
        });
        cursor = natural.end;
    }

    Ok(bins)
}

/// Seconds per part name: direct children by name, plus [`OTHER_PART`].
pub type PartSeconds = BTreeMap<String, i64>;

/// Root name to its parts, for one bin.
pub type BinBreakdown = BTreeMap<String, PartSeconds>;

pub fn compute_breakdown(forest: &[Task], bins: &[Bin]) -> Vec<BinBreakdown> {
    compute_breakdown_at(forest, bins, calendar::now())
}

/// For every bin and root, each direct child contributes its whole subtree under
/// its own name and the root's undelegated time goes to [`OTHER_PART`]. Zero
/// parts are left out. Parts sharing a key are summed and reported with a
/// warning, since names are not unique.
pub fn compute_breakdown_at(forest: &[Task], bins: &[Bin], now: DateTime<Local>) -> Vec<BinBreakdown> {
    bins.iter()
        .map(|bin| {
            let range = bin.range();
            let mut per_root = BinBreakdown::new();
            for root in forest {
                let mut parts = PartSeconds::new();
                for child in &root.children {
                    let seconds = child.aggregate_seconds_at(Some(&range), now);
                    if seconds != 0 {
                        add_part(&mut parts, &root.name, &child.name, seconds);
                    }
                }
                let own = root.own_seconds_at(Some(&range), now);
                if own != 0 {
                    add_part(&mut parts, &root.name, OTHER_PART, own);
                }

                match per_root.get_mut(&root.name) {
                    Some(existing) => {
                        warn!(root = %root.name, bin = %bin.label, "root task name is shared; merging breakdowns");
                        for (part, seconds) in parts {
                            *existing.entry(part).or_insert(0) += seconds;
                        }
                    }
                    None => {
                        per_root.insert(root.name.clone(), parts);
                    }
                }
            }
            per_root
        })
        .collect()
}

fn add_part(parts: &mut PartSeconds, root: &str, part: &str, seconds: i64) {
    match parts.get_mut(part) {
        Some(existing) => {
            warn!(%root, %part, "part name is shared by several entries; summing them");
            *existing += seconds;
        }
        None => {
            parts.insert(part.to_string(), seconds);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartSummary {
    pub name: String,
    pub total: i64,
    pub average: f64,
    pub min: i64,
    pub max: i64,
    pub per_bin: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RootSummary {
    pub name: String,
    pub total: i64,
    pub average: f64,
    pub min: i64,
    pub max: i64,
    /// Sorted by total, largest first.
    pub parts: Vec<PartSummary>,
}

/// Totals, per-bin average and extremes for every root and each of its parts.
pub fn summarize(forest: &[Task], breakdown: &[BinBreakdown]) -> Vec<RootSummary> {
    let mut seen = std::collections::HashSet::new();
    forest
        .iter()
        .filter(|root| seen.insert(root.name.as_str()))
        .map(|root| {
            let per_bin: Vec<i64> = breakdown
                .iter()
                .map(|bin| bin.get(&root.name).map(|parts| parts.values().sum()).unwrap_or(0))
                .collect();
            let (total, average, min, max) = stats(&per_bin);

            let mut part_names: Vec<&String> = breakdown
                .iter()
                .filter_map(|bin| bin.get(&root.name))
                .flat_map(|parts| parts.keys())
                .collect();
            part_names.sort();
            part_names.dedup();

            let mut parts: Vec<PartSummary> = part_names
                .into_iter()
                .map(|name| {
                    let per_bin: Vec<i64> = breakdown
                        .iter()
                        .map(|bin| {
                            bin.get(&root.name)
                                .and_then(|parts| parts.get(name))
                                .copied()
                                .unwrap_or(0)
                        })
                        .collect();
                    let (total, average, min, max) = stats(&per_bin);
                    PartSummary {
                        name: name.clone(),
                        total,
                        average,
                        min,
                        max,
                        per_bin,
                    }
                })
                .collect();
            parts.sort_by(|left, right| right.total.cmp(&left.total).then_with(|| left.name.cmp(&right.name)));

            RootSummary {
                name: root.name.clone(),
                total,
                average,
                min,
                max,
                parts,
            }
        })
        .collect()
}

fn stats(per_bin: &[i64]) -> (i64, f64, i64, i64) {
    let total: i64 = per_bin.iter().sum();
    let average = total as f64 / per_bin.len().max(1) as f64;
    let min = per_bin.iter().copied().min().unwrap_or(0);
    let max = per_bin.iter().copied().max().unwrap_or(0);
    (total, average, min, max)
}

/// Stored color of the direct child behind `part` of `root_name`; `None` for
/// [`OTHER_PART`] and for unknown names.
pub fn part_color<'a>(forest: &'a [Task], root_name: &str, part: &str) -> Option<&'a str> {
    if part == OTHER_PART {
        return None;
    }
    forest
        .iter()
        .filter(|root| root.name == root_name)
        .flat_map(|root| root.children.iter())
        .find(|child| child.name == part)
        .and_then(|child| child.color.as_deref())
}

#[derive(Debug, Clone)]
pub struct Report {
    pub params: ReportParams,
    pub bins: Vec<Bin>,
    pub breakdown: Vec<BinBreakdown>,
    pub summaries: Vec<RootSummary>,
}

pub fn generate(forest: &[Task], params: ReportParams) -> Result<Report, ReportError> {
    let bins = build_bins(params.start, params.end, params.granularity)?;
    let breakdown = compute_breakdown(forest, &bins);
    let summaries = summarize(forest, &breakdown);
    Ok(Report {
        params,
        bins,
        breakdown,
        summaries,
    })
}

pub fn generate_at(forest: &[Task], params: ReportParams, now: DateTime<Local>) -> Result<Report, ReportError> {
    let bins = build_bins(params.start, params.end, params.granularity)?;
    let breakdown = compute_breakdown_at(forest, &bins, now);
    let summaries = summarize(forest, &breakdown);
    Ok(Report {
        params,
        bins,
        breakdown,
        summaries,
    })
}
