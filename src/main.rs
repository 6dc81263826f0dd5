mod app;
mod calendar;
mod colors;
mod domain;
mod duration;
mod paths;
mod report;
mod storage;
mod ui;

use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::app::Tracker;
use crate::domain::{walk, walk_with_depth};
use crate::duration::humanize_seconds;
use crate::paths::DataPaths;
use crate::report::{Granularity, Preset, Report, ReportParams};
use crate::ui::run_dashboard;

const DEFAULT_LOG_FILTER: &str = "ttracker=info";

#[derive(Debug, Parser)]
#[command(name = "ttracker", about = "Hierarchical time tracker with daily goals and range reports")]
struct Cli {
	#[arg(long, global = true)]
	data_dir: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Dashboard,
	Init,
	Add {
		#[arg(long)]
		name: Option<String>,
		#[arg(long)]
		parent: Option<String>,
	},
	List,
	Toggle {
		#[arg(long)]
		task: String,
	},
	Stop,
	Adjust {
		#[arg(long)]
		task: String,
		#[arg(long, allow_hyphen_values = true)]
		delta: String,
	},
	Goal {
		#[arg(long)]
		task: String,
		#[arg(long, allow_hyphen_values = true)]
		duration: String,
	},
	Rename {
		#[arg(long)]
		task: String,
		#[arg(long)]
		name: String,
	},
	Recolor {
		#[arg(long)]
		task: String,
		#[arg(long)]
		color: String,
	},
	Delete {
		#[arg(long)]
		task: String,
	},
	Move {
		#[arg(long)]
		task: String,
		#[arg(long, value_enum)]
		direction: MoveDirection,
	},
	Reparent {
		#[arg(long)]
		task: String,
		/// Omit to move the task to the root list.
		#[arg(long)]
		parent: Option<String>,
	},
	Hotkey {
		#[arg(long)]
		task: String,
		/// Omit to clear the hotkey.
		#[arg(long)]
		accel: Option<String>,
	},
	Report {
		#[arg(long, conflicts_with_all = ["from", "to"])]
		preset: Option<String>,
		#[arg(long, requires = "to")]
		from: Option<String>,
		#[arg(long, requires = "from")]
		to: Option<String>,
		#[arg(long, default_value = "days")]
		granularity: String,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MoveDirection {
	Up,
	Down,
}

impl MoveDirection {
	fn offset(self) -> isize {
		match self {
			MoveDirection::Up => -1,
			MoveDirection::Down => 1,
		}
	}
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let paths = DataPaths::resolve(cli.data_dir);
	let command = cli.command.unwrap_or(Command::Dashboard);

	if matches!(command, Command::Dashboard) {
		paths.ensure_dir()?;
		init_logging(Some(&paths.log_file()))?;
	} else {
		init_logging(None)?;
	}

	let mut tracker = Tracker::open(paths)?;

	match command {
		Command::Dashboard => {
			run_dashboard(&mut tracker)?;
		}
		Command::Init => {
			tracker.on_save()?;
			println!("initialized data directory at {}", tracker.paths().dir().display());
		}
		Command::Add { name, parent } => {
			let parent = parent.map(|query| resolve_task(&tracker, &query)).transpose()?;
			let task_id = tracker.add_task(name.as_deref(), parent.as_deref())?;
			tracker.on_save()?;
			println!("created task {task_id}");
		}
		Command::List => {
			print_tasks(&tracker);
		}
		Command::Toggle { task } => {
			let task_id = resolve_task(&tracker, &task)?;
			tracker.on_toggle(&task_id)?;
		}
		Command::Stop => {
			if tracker.on_stop_all()?.is_none() {
				println!("no timer running");
			}
		}
		Command::Adjust { task, delta } => {
			let task_id = resolve_task(&tracker, &task)?;
			let delta = tracker.on_adjust(&task_id, &delta)?;
			println!("adjusted {} by {}", tracker.task(&task_id)?.name, humanize_seconds(delta));
		}
		Command::Goal { task, duration } => {
			let task_id = resolve_task(&tracker, &task)?;
			match tracker.on_set_goal(&task_id, &duration)? {
				Some(goal) => println!("daily goal set to {}", humanize_seconds(goal as i64)),
				None => println!("daily goal cleared"),
			}
		}
		Command::Rename { task, name } => {
			let task_id = resolve_task(&tracker, &task)?;
			let name = tracker.rename(&task_id, &name)?;
			tracker.on_save()?;
			println!("renamed {task_id} to {name}");
		}
		Command::Recolor { task, color } => {
			let task_id = resolve_task(&tracker, &task)?;
			tracker.recolor(&task_id, &color)?;
			tracker.on_save()?;
			println!("recolored {task_id}");
		}
		Command::Delete { task } => {
			let task_id = resolve_task(&tracker, &task)?;
			let removed = tracker.delete(&task_id)?;
			tracker.on_save()?;
			let subtasks = walk(std::slice::from_ref(&removed)).count() - 1;
			println!("deleted {} ({subtasks} subtasks)", removed.name);
		}
		Command::Move { task, direction } => {
			let task_id = resolve_task(&tracker, &task)?;
			let index = tracker.move_task(&task_id, direction.offset())?;
			tracker.on_save()?;
			println!("moved {task_id} to position {}", index + 1);
		}
		Command::Reparent { task, parent } => {
			let task_id = resolve_task(&tracker, &task)?;
			let parent = parent.map(|query| resolve_task(&tracker, &query)).transpose()?;
			tracker.reparent(&task_id, parent.as_deref())?;
			tracker.on_save()?;
			match parent {
				Some(parent) => println!("moved {task_id} under {parent}"),
				None => println!("moved {task_id} to the root list"),
			}
		}
		Command::Hotkey { task, accel } => {
			let task_id = resolve_task(&tracker, &task)?;
			tracker.set_hotkey(&task_id, accel)?;
			match tracker.hotkey_for(&task_id) {
				Some(accel) => println!("hotkey for {task_id}: {accel}"),
				None => println!("hotkey for {task_id} cleared"),
			}
		}
		Command::Report {
			preset,
			from,
			to,
			granularity,
		} => {
			let granularity: Granularity = granularity.parse()?;
			let now = calendar::now();
			let params = match (from, to) {
				(Some(from), Some(to)) => ReportParams::custom(&from, &to, granularity)?,
				_ => {
					let preset: Preset = preset.as_deref().unwrap_or("current_week").parse()?;
					ReportParams::from_preset(preset, granularity, now)?
				}
			};
			let report = tracker.report(params)?;
			print_report(&report);
		}
	}

	for notice in tracker.drain_notices() {
		println!("{notice}");
	}

	Ok(())
}

/// CLI logs go to stderr; the dashboard owns the terminal, so it logs to a file.
fn init_logging(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
	let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

	let result = match log_file {
		Some(path) => {
			let file = OpenOptions::new().create(true).append(true).open(path)?;
			builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
		}
		None => builder.with_writer(std::io::stderr).try_init(),
	};
	if let Err(err) = result {
		eprintln!("warning: failed to initialize logging: {err}");
	}

	Ok(())
}

/// Accepts a task id, or a name that matches exactly one task.
fn resolve_task(tracker: &Tracker, query: &str) -> Result<String, Box<dyn Error>> {
	if tracker.task(query).is_ok() {
		return Ok(query.to_string());
	}

	let wanted = query.trim();
	let matches: Vec<&str> = walk(tracker.roots())
		.filter(|task| task.name.eq_ignore_ascii_case(wanted))
		.map(|task| task.id.as_str())
		.collect();
	match matches.as_slice() {
		[id] => Ok((*id).to_string()),
		[] => Err(format!("no task with id or name {query:?}").into()),
		_ => Err(format!("{} tasks are named {query:?}; use the id", matches.len()).into()),
	}
}

fn print_tasks(tracker: &Tracker) {
	if tracker.roots().is_empty() {
		println!("no tasks yet");
		return;
	}

	for (depth, task) in walk_with_depth(tracker.roots()) {
		let marker = if task.is_running() { "*" } else { " " };
		let goal = task
			.daily_goal_seconds
			.map(|goal| humanize_seconds(goal as i64))
			.unwrap_or_else(|| "-".to_string());
		let hotkey = tracker.hotkey_for(&task.id).unwrap_or("-");
		println!(
			"{marker} {}{} [{}] | today {} | week {} | month {} | total {} | goal {goal} | hotkey {hotkey}",
			"  ".repeat(depth),
			task.name,
			task.id,
			humanize_seconds(task.today_seconds()),
			humanize_seconds(task.week_seconds()),
			humanize_seconds(task.month_seconds()),
			humanize_seconds(task.total_seconds()),
		);
	}
}

fn print_report(report: &Report) {
	println!(
		"report {} .. {} by {}",
		report.params.start.format("%Y-%m-%d %H:%M"),
		report.params.end.format("%Y-%m-%d %H:%M"),
		report.params.granularity
	);

	for (bin, roots) in report.bins.iter().zip(&report.breakdown) {
		println!("\n{}", bin.label);
		let mut any = false;
		for (root, parts) in roots {
			let total: i64 = parts.values().sum();
			if total == 0 {
				continue;
			}
			any = true;
			let detail = parts
				.iter()
				.map(|(part, seconds)| format!("{part} {}", humanize_seconds(*seconds)))
				.collect::<Vec<_>>()
				.join(", ");
			println!("  {root}: {} ({detail})", humanize_seconds(total));
		}
		if !any {
			println!("  (nothing tracked)");
		}
	}

	if report.summaries.is_empty() {
		return;
	}

	println!("\nsummary:");
	for summary in &report.summaries {
		println!(
			"{} | total {} | avg {} | min {} | max {}",
			summary.name,
			humanize_seconds(summary.total),
			humanize_seconds(summary.average.round() as i64),
			humanize_seconds(summary.min),
			humanize_seconds(summary.max)
		);
		for part in &summary.parts {
			println!(
				"  {} | total {} | avg {} | min {} | max {}",
				part.name,
				humanize_seconds(part.total),
				humanize_seconds(part.average.round() as i64),
				humanize_seconds(part.min),
				humanize_seconds(part.max)
			);
		}
	}
}
