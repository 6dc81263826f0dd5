use std::error::Error;
use std::io;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Local};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use crossterm::{ExecutableCommand, execute};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};
use tracing::debug;

use crate::app::Tracker;
use crate::calendar;
use crate::colors::parse_hex;
use crate::domain::{Task, walk, walk_with_depth};
use crate::duration::humanize_seconds;
use crate::report::{
	Granularity, OTHER_PART, Preset, Report, ReportError, ReportParams, part_color,
};

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
const OTHER_PART_COLOR: Color = Color::Gray;
const GOAL_REACHED_COLOR: Color = Color::LightGreen;
const REPORT_BAR_WIDTH: usize = 28;
const GOAL_BAR_WIDTH: usize = 20;
const MAX_NAME_COLUMN: usize = 32;

pub fn run_dashboard(tracker: &mut Tracker) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, tracker);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	tracker: &mut Tracker,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::default();

	loop {
		let now = calendar::now();
		if let Err(err) = tracker.tick_at(now) {
			debug!(error = %err, "periodic work failed");
		}
		let notices = tracker.drain_notices();
		if !notices.is_empty() {
			app.status = notices
				.iter()
				.map(ToString::to_string)
				.collect::<Vec<_>>()
				.join(" | ");
		}

		let view = build_view(&app, tracker, now);
		app.clamp_selection(&view);
		terminal.draw(|frame| draw_dashboard(frame, &app, &view))?;

		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				let should_quit = match &app.mode {
					InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, tracker),
					InputMode::Select(_) => handle_select_key(&mut app, key.code, tracker),
					InputMode::Normal => handle_normal_key(&mut app, key.code, tracker, &view),
				};

				if should_quit {
					break;
				}
			}
		}
	}

	Ok(())
}

fn draw_dashboard(frame: &mut Frame, app: &App, view: &ViewModel) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(5)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints(if app.report.is_some() {
			[Constraint::Percentage(50), Constraint::Percentage(50)]
		} else {
			[Constraint::Percentage(68), Constraint::Percentage(32)]
		})
		.split(layout[1]);

	render_running_panel(frame, layout[0], view);
	render_tasks_panel(frame, body[0], app, view);
	match &app.report {
		Some(report) => render_report_panel(frame, body[1], app, report, view),
		None => render_details_panel(frame, body[1], app, view),
	}
	render_footer(frame, layout[2], app);

	if let InputMode::Select(select) = &app.mode {
		render_select_popup(frame, select);
	}
}

fn render_running_panel(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let line = match &view.running {
		Some(running) => Line::from(vec![
			Span::styled("● ", Style::default().fg(Color::LightRed)),
			Span::styled(running.name.clone(), running.style.add_modifier(Modifier::BOLD)),
			Span::raw(format!(
				" | running {} | today {}",
				humanize_seconds(running.elapsed),
				humanize_seconds(running.today)
			)),
		]),
		None => Line::from(Span::styled("no timer running", Style::default().fg(Color::DarkGray))),
	};

	let title = format!("ttracker | {}", view.now.format("%a %d %b %H:%M"));
	let panel = Paragraph::new(line).block(Block::default().borders(Borders::ALL).title(title));
	frame.render_widget(panel, area);
}

fn render_tasks_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let name_width = view
		.rows
		.iter()
		.map(|row| row.depth * 2 + row.name.chars().count())
		.max()
		.unwrap_or(0)
		.min(MAX_NAME_COLUMN);

	let items = view
		.rows
		.iter()
		.map(|row| ListItem::new(render_task_row_line(row, name_width)))
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	if !view.rows.is_empty() {
		state.select(Some(app.task_index.min(view.rows.len() - 1)));
	}

	let header = format!(
		"Tasks | {:<width$} {:>9} {:>9} {:>9} {:>10}  goal",
		"",
		"today",
		"week",
		"month",
		"total",
		width = name_width + 2
	);
	let block = Block::default()
		.borders(Borders::ALL)
		.title(header)
		.border_style(border_style(app.focus == FocusPane::Tasks));
	let list = List::new(if items.is_empty() {
		vec![ListItem::new("(no tasks yet, press n to create one)")]
	} else {
		items
	})
	.block(block)
	.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn render_task_row_line(row: &TaskRow, name_width: usize) -> Line<'static> {
	let marker = if row.running { "▶ " } else { "  " };
	let mut label = format!("{}{}", "  ".repeat(row.depth), row.name);
	if label.chars().count() > name_width {
		label = label.chars().take(name_width.saturating_sub(1)).collect::<String>() + "…";
	}
	let padding = " ".repeat(name_width.saturating_sub(label.chars().count()));

	let name_style = if row.running {
		row.style.add_modifier(Modifier::BOLD)
	} else {
		row.style
	};
	let goal_style = if row.goal_reached {
		Style::default().fg(GOAL_REACHED_COLOR)
	} else {
		Style::default().fg(Color::DarkGray)
	};
	let goal = row
		.goal
		.map(|goal| humanize_seconds(goal as i64))
		.unwrap_or_else(|| "-".to_string());

	let mut spans = vec![
		Span::styled(marker, Style::default().fg(Color::LightRed)),
		Span::styled(label, name_style),
		Span::raw(padding),
		Span::raw(format!(
			" {:>9} {:>9} {:>9} {:>10}  ",
			humanize_seconds(row.today),
			humanize_seconds(row.week),
			humanize_seconds(row.month),
			humanize_seconds(row.total)
		)),
		Span::styled(goal, goal_style),
	];
	if let Some(hotkey) = &row.hotkey {
		spans.push(Span::styled(format!("  [{hotkey}]"), Style::default().fg(Color::DarkGray)));
	}

	Line::from(spans)
}

fn render_details_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let mut lines = Vec::new();
	match view.rows.get(app.task_index) {
		Some(row) => {
			lines.push(Line::from(Span::styled(
				row.name.clone(),
				row.style.add_modifier(Modifier::BOLD),
			)));
			lines.push(Line::from(Span::styled(
				format!("id {}", row.id),
				Style::default().fg(Color::DarkGray),
			)));
			lines.push(Line::from(format!("color: {}", row.color.as_deref().unwrap_or("-"))));
			lines.push(Line::from(format!("hotkey: {}", row.hotkey.as_deref().unwrap_or("-"))));
			lines.push(Line::from(""));
			lines.push(Line::from(format!("Today:  {}", humanize_seconds(row.today))));
			lines.push(Line::from(format!("Week:   {}", humanize_seconds(row.week))));
			lines.push(Line::from(format!("Month:  {}", humanize_seconds(row.month))));
			lines.push(Line::from(format!("Total:  {}", humanize_seconds(row.total))));
			lines.push(Line::from(""));
			match row.goal {
				Some(goal) => {
					lines.push(Line::from(format!("Daily goal: {}", humanize_seconds(goal as i64))));
					let filled = goal_bar_width(row.today, goal);
					lines.push(Line::from(vec![
						Span::styled("█".repeat(filled), Style::default().fg(GOAL_REACHED_COLOR)),
						Span::styled(
							"░".repeat(GOAL_BAR_WIDTH - filled),
							Style::default().fg(Color::DarkGray),
						),
						Span::raw(if row.goal_reached { " reached" } else { "" }),
					]));
				}
				None => lines.push(Line::from("Daily goal: none")),
			}
			lines.push(Line::from(""));
			lines.push(Line::from(format!(
				"{} time entries | {} adjustments | {} subtasks",
				row.entry_count, row.adjustment_count, row.subtask_count
			)));
		}
		None => lines.push(Line::from("(no task selected)")),
	}

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Details"));
	frame.render_widget(panel, area);
}

fn render_report_panel(frame: &mut Frame, area: Rect, app: &App, state: &ReportState, view: &ViewModel) {
	let focused = app.focus == FocusPane::Report;
	let title = format!("Report: {} by {}", state.range.label(), state.granularity);
	let block = Block::default()
		.borders(Borders::ALL)
		.title(title)
		.border_style(border_style(focused));

	let lines = match &view.report {
		Some(Ok(report)) => report_lines(report, state.root_index),
		Some(Err(err)) => vec![Line::from(Span::styled(
			format!("error: {err}"),
			Style::default().fg(Color::LightRed),
		))],
		None => vec![Line::from("(no report)")],
	};

	let panel = Paragraph::new(lines).block(block);
	frame.render_widget(panel, area);
}

fn report_lines(view: &ReportView, root_index: usize) -> Vec<Line<'static>> {
	let report = &view.report;
	let mut lines = vec![Line::from(format!(
		"{} .. {}",
		report.params.start.format("%Y-%m-%d %H:%M"),
		report.params.end.format("%Y-%m-%d %H:%M")
	))];

	let root_index = root_index.min(report.summaries.len().saturating_sub(1));
	let Some(summary) = report.summaries.get(root_index) else {
		lines.push(Line::from("(no tasks)"));
		return lines;
	};
	lines.push(Line::from(vec![
		Span::raw(format!("root {}/{}: ", root_index + 1, report.summaries.len())),
		Span::styled(summary.name.clone(), Style::default().add_modifier(Modifier::BOLD)),
	]));
	lines.push(Line::from(""));

	let label_width = report
		.bins
		.iter()
		.map(|bin| bin.label.chars().count())
		.max()
		.unwrap_or(0);
	for (bin, roots) in report.bins.iter().zip(&report.breakdown) {
		let parts: Vec<(String, i64, Style)> = roots
			.get(&summary.name)
			.map(|parts| {
				summary
					.parts
					.iter()
					.filter_map(|part| {
						let seconds = parts.get(&part.name).copied()?;
						let style = part_style(&view.forest_colors, &summary.name, &part.name);
						Some((part.name.clone(), seconds, style))
					})
					.collect()
			})
			.unwrap_or_default();
		let total: i64 = parts.iter().map(|(_, seconds, _)| seconds).sum();

		let mut spans = vec![Span::raw(format!("{:<label_width$} ", bin.label))];
		for (_, width, style) in stacked_bar(&parts, summary.max, REPORT_BAR_WIDTH) {
			spans.push(Span::styled("█".repeat(width), style));
		}
		spans.push(Span::raw(format!(" {}", humanize_seconds(total))));
		lines.push(Line::from(spans));
	}

	lines.push(Line::from(""));
	lines.push(Line::from(format!(
		"total {} | avg {} | min {} | max {}",
		humanize_seconds(summary.total),
		humanize_seconds(summary.average.round() as i64),
		humanize_seconds(summary.min),
		humanize_seconds(summary.max)
	)));
	for part in &summary.parts {
		lines.push(Line::from(vec![
			Span::styled("■ ", part_style(&view.forest_colors, &summary.name, &part.name)),
			Span::raw(format!(
				"{} {} | avg {} | max {}",
				part.name,
				humanize_seconds(part.total),
				humanize_seconds(part.average.round() as i64),
				humanize_seconds(part.max)
			)),
		]));
	}

	lines
}

/// Splits a bar of `width` cells among positive parts in proportion to `scale`.
fn stacked_bar(parts: &[(String, i64, Style)], scale: i64, width: usize) -> Vec<(String, usize, Style)> {
	if scale <= 0 {
		return Vec::new();
	}
	parts
		.iter()
		.filter(|(_, seconds, _)| *seconds > 0)
		.map(|(name, seconds, style)| {
			let cells = ((*seconds as f64 / scale as f64) * width as f64).round() as usize;
			(name.clone(), cells.clamp(1, width), *style)
		})
		.collect()
}

fn goal_bar_width(today: i64, goal: u64) -> usize {
	if goal == 0 {
		return 0;
	}
	let ratio = (today.max(0) as f64 / goal as f64).min(1.0);
	(ratio * GOAL_BAR_WIDTH as f64).round() as usize
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
	let footer_lines = match &app.mode {
		InputMode::Normal => vec![
			Line::from(
				"j/k move | Enter/space start/stop | x stop all | a adjust | g goal | n new task | s subtask",
			),
			Line::from(
				"r rename | c color | d delete | K/J reorder | m reparent | h hotkey | R report | S save | q quit",
			),
			if app.report.is_some() {
				Line::from("Tab focus report | report: j/k root | p preset | f custom range | u granularity")
			} else {
				Line::from("")
			},
			Line::from(app.status.clone()),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from("Enter submit | Esc cancel"),
			Line::from(app.status.clone()),
		],
		InputMode::Select(select) => vec![
			Line::from(select.title.clone()),
			Line::from(format!(
				"Selected: {}",
				select
					.selected_option()
					.map(|option| option.label.as_str())
					.unwrap_or("(none)")
			)),
			Line::from("j/k or arrows move | Enter choose | Esc cancel"),
			Line::from(app.status.clone()),
		],
	};

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_select_popup(frame: &mut Frame, select: &SelectState) {
	let area = centered_rect(62, 55, frame.area());
	frame.render_widget(Clear, area);

	let items = if select.options.is_empty() {
		vec![ListItem::new("(no choices)")]
	} else {
		select
			.options
			.iter()
			.map(|option| ListItem::new(option.label.clone()).style(option.style))
			.collect::<Vec<_>>()
	};

	let current = if select.options.is_empty() {
		0
	} else {
		select.selected.saturating_add(1)
	};
	let total = select.options.len();
	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(format!("{} ({current}/{total})", select.title)),
		)
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len().saturating_sub(1))));
	}
	frame.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
	let popup_layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Percentage((100 - percent_y) / 2),
			Constraint::Percentage(percent_y),
			Constraint::Percentage((100 - percent_y) / 2),
		])
		.split(area);
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage((100 - percent_x) / 2),
			Constraint::Percentage(percent_x),
			Constraint::Percentage((100 - percent_x) / 2),
		])
		.split(popup_layout[1])[1]
}

fn handle_normal_key(app: &mut App, code: KeyCode, tracker: &mut Tracker, view: &ViewModel) -> bool {
	match code {
		KeyCode::Char('q') => {
			if !tracker.is_dirty() {
				return true;
			}
			match persist(tracker) {
				Ok(()) => return true,
				Err(err) => app.status = format!("error: {err} (Q quits without saving)"),
			}
		}
		KeyCode::Char('Q') => return true,
		KeyCode::Char('S') => {
			app.status = match persist(tracker) {
				Ok(()) => format!("saved to {}", tracker.paths().data_file().display()),
				Err(err) => format!("error: {err}"),
			};
		}
		KeyCode::Char('x') => match tracker.on_stop_all() {
			Ok(Some(_)) => {}
			Ok(None) => app.status = "No timer running".to_string(),
			Err(err) => app.status = format!("error: {err}"),
		},
		KeyCode::Char('R') => {
			if app.report.is_some() {
				app.report = None;
				app.focus = FocusPane::Tasks;
				app.status = "Report closed".to_string();
			} else {
				app.report = Some(ReportState::default());
				app.status = "Report opened (Tab to focus it)".to_string();
			}
		}
		KeyCode::Tab | KeyCode::BackTab => {
			if app.report.is_some() {
				app.focus = app.focus.next();
			}
		}
		KeyCode::Char('n') => {
			app.mode = InputMode::Prompt(PromptState::new("New task name", PromptKind::NewTask { parent: None }));
		}
		_ => match app.focus {
			FocusPane::Tasks => handle_tasks_key(app, code, tracker, view),
			FocusPane::Report => handle_report_key(app, code, view),
		},
	}

	false
}

fn handle_tasks_key(app: &mut App, code: KeyCode, tracker: &mut Tracker, view: &ViewModel) {
	match code {
		KeyCode::Up | KeyCode::Char('k') => app.move_task_selection(-1, view),
		KeyCode::Down | KeyCode::Char('j') => app.move_task_selection(1, view),
		KeyCode::Home => app.task_index = 0,
		KeyCode::End => app.task_index = view.rows.len().saturating_sub(1),
		_ => {
			let Some(row) = view.rows.get(app.task_index) else {
				app.status = "No task selected".to_string();
				return;
			};
			let task_id = row.id.clone();
			match code {
				KeyCode::Enter | KeyCode::Char(' ') => {
					if let Err(err) = tracker.on_toggle(&task_id) {
						app.status = format!("error: {err}");
					}
				}
				KeyCode::Char('a') => {
					app.mode = InputMode::Prompt(PromptState::new(
						format!("Adjust {} by (e.g. +1h30m, -15m)", row.name),
						PromptKind::Adjust { task_id },
					));
				}
				KeyCode::Char('g') => {
					app.mode = InputMode::Prompt(PromptState::new(
						format!("Daily goal for {} (e.g. 2h, 0 clears)", row.name),
						PromptKind::Goal { task_id },
					));
				}
				KeyCode::Char('s') => {
					app.mode = InputMode::Prompt(PromptState::new(
						format!("New subtask of {}", row.name),
						PromptKind::NewTask { parent: Some(task_id) },
					));
				}
				KeyCode::Char('r') => {
					let mut prompt = PromptState::new(format!("Rename {}", row.name), PromptKind::Rename { task_id });
					prompt.input = row.name.clone();
					app.mode = InputMode::Prompt(prompt);
				}
				KeyCode::Char('c') => {
					let mut prompt = PromptState::new(
						format!("Color for {} (#rrggbb)", row.name),
						PromptKind::Recolor { task_id },
					);
					prompt.input = row.color.clone().unwrap_or_default();
					app.mode = InputMode::Prompt(prompt);
				}
				KeyCode::Char('h') => {
					let mut prompt = PromptState::new(
						format!("Hotkey for {} (empty clears)", row.name),
						PromptKind::Hotkey { task_id },
					);
					prompt.input = row.hotkey.clone().unwrap_or_default();
					app.mode = InputMode::Prompt(prompt);
				}
				KeyCode::Char('d') => {
					app.mode = InputMode::Select(build_delete_select(row));
				}
				KeyCode::Char('m') => {
					app.mode = InputMode::Select(build_reparent_select(tracker.roots(), &task_id, &row.name));
				}
				KeyCode::Char('K') | KeyCode::Char('J') => {
					let direction = if code == KeyCode::Char('K') { -1 } else { 1 };
					let moved = tracker
						.move_task(&task_id, direction)
						.map_err(|err| err.to_string())
						.and_then(|_| persist(tracker));
					match moved {
						Ok(()) => app.select_task_id = Some(task_id),
						Err(err) => app.status = format!("error: {err}"),
					}
				}
				_ => {}
			}
		}
	}
}

fn handle_report_key(app: &mut App, code: KeyCode, view: &ViewModel) {
	let root_count = match &view.report {
		Some(Ok(report)) => report.report.summaries.len(),
		_ => 0,
	};
	let Some(report) = app.report.as_mut() else {
		return;
	};

	match code {
		KeyCode::Up | KeyCode::Char('k') => report.root_index = report.root_index.saturating_sub(1),
		KeyCode::Down | KeyCode::Char('j') => {
			report.root_index = (report.root_index + 1).min(root_count.saturating_sub(1));
		}
		KeyCode::Char('u') => {
			report.granularity = report.granularity.next();
			app.status = format!("Granularity: {}", report.granularity);
		}
		KeyCode::Char('p') => {
			app.mode = InputMode::Select(build_preset_select());
		}
		KeyCode::Char('f') => {
			app.mode = InputMode::Prompt(PromptState::new(
				"Report from (YYYY-MM-DD)",
				PromptKind::ReportFrom,
			));
		}
		_ => {}
	}
}

fn handle_prompt_key(app: &mut App, code: KeyCode, tracker: &mut Tracker) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Input cancelled".to_string();
		}
		KeyCode::Backspace => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.pop();
			}
		}
		KeyCode::Char(value) => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.push(value);
			}
		}
		KeyCode::Enter => {
			let prompt = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Prompt(prompt) => prompt,
				InputMode::Normal | InputMode::Select(_) => return false,
			};

			match submit_prompt(prompt.clone(), app, tracker) {
				Ok(PromptOutcome::NextPrompt(next_prompt)) => app.mode = InputMode::Prompt(next_prompt),
				Ok(PromptOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Prompt(prompt);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn handle_select_key(app: &mut App, code: KeyCode, tracker: &mut Tracker) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Selection cancelled".to_string();
		}
		KeyCode::Up | KeyCode::Char('k') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(-1);
			}
		}
		KeyCode::Down | KeyCode::Char('j') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(1);
			}
		}
		KeyCode::Enter => {
			let select = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Select(select) => select,
				_ => return false,
			};

			match submit_select(select.clone(), app, tracker) {
				Ok(message) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Select(select);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn submit_prompt(prompt: PromptState, app: &mut App, tracker: &mut Tracker) -> Result<PromptOutcome, String> {
	match prompt.kind {
		PromptKind::Adjust { task_id } => {
			let delta = tracker.on_adjust(&task_id, &prompt.input).map_err(|err| err.to_string())?;
			Ok(PromptOutcome::Done(format!("adjusted by {}", humanize_seconds(delta))))
		}
		PromptKind::Goal { task_id } => {
			let goal = tracker.on_set_goal(&task_id, &prompt.input).map_err(|err| err.to_string())?;
			Ok(PromptOutcome::Done(match goal {
				Some(goal) => format!("daily goal set to {}", humanize_seconds(goal as i64)),
				None => "daily goal cleared".to_string(),
			}))
		}
		PromptKind::NewTask { parent } => {
			let task_id = tracker
				.add_task(optional_text(&prompt.input).as_deref(), parent.as_deref())
				.map_err(|err| err.to_string())?;
			persist(tracker)?;
			let name = tracker.task(&task_id).map_err(|err| err.to_string())?.name.clone();
			app.select_task_id = Some(task_id);
			Ok(PromptOutcome::Done(format!("created task: {name}")))
		}
		PromptKind::Rename { task_id } => {
			let name = tracker.rename(&task_id, &prompt.input).map_err(|err| err.to_string())?;
			persist(tracker)?;
			Ok(PromptOutcome::Done(format!("renamed to {name}")))
		}
		PromptKind::Recolor { task_id } => {
			tracker.recolor(&task_id, &prompt.input).map_err(|err| err.to_string())?;
			persist(tracker)?;
			Ok(PromptOutcome::Done("color updated".to_string()))
		}
		PromptKind::Hotkey { task_id } => {
			tracker
				.set_hotkey(&task_id, optional_text(&prompt.input))
				.map_err(|err| err.to_string())?;
			Ok(PromptOutcome::Done(match tracker.hotkey_for(&task_id) {
				Some(hotkey) => format!("hotkey set to {hotkey}"),
				None => "hotkey cleared".to_string(),
			}))
		}
		PromptKind::ReportFrom => {
			let from = required_text(&prompt.input, "start date")?;
			Ok(PromptOutcome::NextPrompt(PromptState::new(
				format!("Report from {from} to (YYYY-MM-DD, inclusive)"),
				PromptKind::ReportTo { from },
			)))
		}
		PromptKind::ReportTo { from } => {
			let to = required_text(&prompt.input, "end date")?;
			let Some(report) = app.report.as_mut() else {
				return Ok(PromptOutcome::Done("Report closed".to_string()));
			};
			let range = ReportRange::Custom { from, to };
			range.params(report.granularity, calendar::now()).map_err(|err| err.to_string())?;
			report.range = range;
			report.root_index = 0;
			Ok(PromptOutcome::Done(format!("Report range: {}", report.range.label())))
		}
	}
}

fn submit_select(select: SelectState, app: &mut App, tracker: &mut Tracker) -> Result<String, String> {
	let selected_value = select
		.selected_option()
		.map(|option| option.value.clone())
		.ok_or_else(|| "no option selected".to_string())?;

	match select.kind {
		SelectKind::DeleteConfirm { task_id, name } => {
			if selected_value.as_deref() != Some("delete") {
				return Ok("Delete cancelled".to_string());
			}
			tracker.delete(&task_id).map_err(|err| err.to_string())?;
			persist(tracker)?;
			Ok(format!("deleted {name}"))
		}
		SelectKind::Reparent { task_id } => {
			tracker
				.reparent(&task_id, selected_value.as_deref())
				.map_err(|err| err.to_string())?;
			persist(tracker)?;
			app.select_task_id = Some(task_id);
			Ok(match selected_value {
				Some(parent) => format!("moved under {}", tracker.task(&parent).map_err(|err| err.to_string())?.name),
				None => "moved to the root list".to_string(),
			})
		}
		SelectKind::ReportPreset => {
			let preset: Preset = selected_value
				.as_deref()
				.ok_or_else(|| "selected preset is missing".to_string())?
				.parse()
				.map_err(|err: ReportError| err.to_string())?;
			let Some(report) = app.report.as_mut() else {
				return Ok("Report closed".to_string());
			};
			report.range = ReportRange::Preset(preset);
			report.root_index = 0;
			Ok(format!("Report range: {}", preset.key()))
		}
	}
}

fn build_delete_select(row: &TaskRow) -> SelectState {
	let label = if row.subtask_count > 0 {
		format!("Delete {} and {} subtasks", row.name, row.subtask_count)
	} else {
		format!("Delete {}", row.name)
	};
	SelectState::new(
		format!("Delete {}?", row.name),
		SelectKind::DeleteConfirm {
			task_id: row.id.clone(),
			name: row.name.clone(),
		},
		vec![
			SelectOption::new("Cancel", Some("cancel".to_string()), Style::default()),
			SelectOption::new(label, Some("delete".to_string()), Style::default().fg(Color::LightRed)),
		],
	)
}

/// Every task outside the moved subtree is a valid new parent.
fn build_reparent_select(forest: &[Task], task_id: &str, name: &str) -> SelectState {
	let moved = walk(forest).find(|task| task.id == task_id);
	let mut options = vec![SelectOption::new("(root list)", None, Style::default().fg(Color::Gray))];
	for (depth, task) in walk_with_depth(forest) {
		if moved.is_some_and(|moved| moved.contains(&task.id)) {
			continue;
		}
		options.push(SelectOption::new(
			format!("{}{}", "  ".repeat(depth), task.name),
			Some(task.id.clone()),
			task_style(task),
		));
	}

	SelectState::new(
		format!("Move {name} under"),
		SelectKind::Reparent {
			task_id: task_id.to_string(),
		},
		options,
	)
}

fn build_preset_select() -> SelectState {
	let options = Preset::ALL
		.into_iter()
		.map(|preset| SelectOption::new(preset.key(), Some(preset.key().to_string()), Style::default()))
		.collect();
	SelectState::new("Report range", SelectKind::ReportPreset, options)
}

fn build_view(app: &App, tracker: &Tracker, now: DateTime<Local>) -> ViewModel {
	let rows = walk_with_depth(tracker.roots())
		.map(|(depth, task)| TaskRow {
			id: task.id.clone(),
			depth,
			name: task.name.clone(),
			color: task.color.clone(),
			style: task_style(task),
			running: task.is_running(),
			today: task.today_seconds_at(now),
			week: task.week_seconds_at(now),
			month: task.month_seconds_at(now),
			total: task.total_seconds_at(now),
			goal: task.daily_goal_seconds,
			goal_reached: task.goal_reached_at(now),
			hotkey: tracker.hotkey_for(&task.id).map(str::to_string),
			entry_count: task.time_entries.len(),
			adjustment_count: task.adjustments.len(),
			subtask_count: walk(&task.children).count(),
		})
		.collect();

	let running = tracker.running_task().map(|task| RunningView {
		name: task.name.clone(),
		style: task_style(task),
		elapsed: task
			.time_entries
			.iter()
			.rev()
			.find(|entry| entry.is_open())
			.map(|entry| (now - entry.start).num_seconds().max(0))
			.unwrap_or(0),
		today: task.today_seconds_at(now),
	});

	let report = app.report.as_ref().map(|state| {
		state
			.range
			.params(state.granularity, now)
			.map_err(|err| err.to_string())
			.and_then(|params| tracker.report_at(params, now).map_err(|err| err.to_string()))
			.map(|report| ReportView::new(report, tracker.roots()))
	});

	ViewModel {
		now,
		rows,
		running,
		report,
	}
}

fn persist(tracker: &mut Tracker) -> Result<(), String> {
	tracker.on_save().map_err(|err| err.to_string())
}

fn required_text(input: &str, field_name: &str) -> Result<String, String> {
	let trimmed = input.trim();
	if trimmed.is_empty() {
		return Err(format!("{field_name} is required"));
	}
	Ok(trimmed.to_string())
}

fn optional_text(input: &str) -> Option<String> {
	let trimmed = input.trim();
	if trimmed.is_empty() {
		None
	} else {
		Some(trimmed.to_string())
	}
}

fn task_style(task: &Task) -> Style {
	task.color
		.as_deref()
		.and_then(color_from_hex)
		.map(|color| Style::default().fg(color))
		.unwrap_or_default()
}

fn part_style(colors: &[(String, String, Option<String>)], root: &str, part: &str) -> Style {
	if part == OTHER_PART {
		return Style::default().fg(OTHER_PART_COLOR);
	}
	colors
		.iter()
		.find(|(root_name, part_name, _)| root_name == root && part_name == part)
		.and_then(|(_, _, color)| color.as_deref())
		.and_then(color_from_hex)
		.map(|color| Style::default().fg(color))
		.unwrap_or_default()
}

fn color_from_hex(hex: &str) -> Option<Color> {
	parse_hex(hex).map(|(r, g, b)| Color::Rgb(r, g, b))
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default()
			.fg(FOCUSED_PANEL_BORDER_COLOR)
			.add_modifier(Modifier::BOLD)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

#[derive(Debug, Clone)]
enum PromptOutcome {
	NextPrompt(PromptState),
	Done(String),
}

#[derive(Debug, Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn new(title: impl Into<String>, kind: PromptKind) -> Self {
		Self {
			title: title.into(),
			input: String::new(),
			kind,
		}
	}
}

#[derive(Debug, Clone)]
struct SelectState {
	title: String,
	options: Vec<SelectOption>,
	selected: usize,
	kind: SelectKind,
}

impl SelectState {
	fn new(title: impl Into<String>, kind: SelectKind, options: Vec<SelectOption>) -> Self {
		Self {
			title: title.into(),
			options,
			selected: 0,
			kind,
		}
	}

	fn move_selection(&mut self, delta: i32) {
		if self.options.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.options.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_option(&self) -> Option<&SelectOption> {
		self.options.get(self.selected)
	}
}

#[derive(Debug, Clone)]
struct SelectOption {
	label: String,
	value: Option<String>,
	style: Style,
}

impl SelectOption {
	fn new(label: impl Into<String>, value: Option<String>, style: Style) -> Self {
		Self {
			label: label.into(),
			value,
			style,
		}
	}
}

#[derive(Debug, Clone)]
enum PromptKind {
	Adjust { task_id: String },
	Goal { task_id: String },
	NewTask { parent: Option<String> },
	Rename { task_id: String },
	Recolor { task_id: String },
	Hotkey { task_id: String },
	ReportFrom,
	ReportTo { from: String },
}

#[derive(Debug, Clone)]
enum SelectKind {
	DeleteConfirm { task_id: String, name: String },
	Reparent { task_id: String },
	ReportPreset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusPane {
	Tasks,
	Report,
}

impl FocusPane {
	fn next(self) -> Self {
		match self {
			FocusPane::Tasks => FocusPane::Report,
			FocusPane::Report => FocusPane::Tasks,
		}
	}
}

#[derive(Debug, Clone)]
enum InputMode {
	Normal,
	Prompt(PromptState),
	Select(SelectState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReportRange {
	Preset(Preset),
	Custom { from: String, to: String },
}

impl ReportRange {
	fn params(&self, granularity: Granularity, now: DateTime<Local>) -> Result<ReportParams, ReportError> {
		match self {
			ReportRange::Preset(preset) => ReportParams::from_preset(*preset, granularity, now),
			ReportRange::Custom { from, to } => ReportParams::custom(from, to, granularity),
		}
	}

	fn label(&self) -> String {
		match self {
			ReportRange::Preset(preset) => preset.key().to_string(),
			ReportRange::Custom { from, to } => format!("{from}..{to}"),
		}
	}
}

#[derive(Debug, Clone)]
struct ReportState {
	range: ReportRange,
	granularity: Granularity,
	root_index: usize,
}

impl Default for ReportState {
	fn default() -> Self {
		Self {
			range: ReportRange::Preset(Preset::Last7),
			granularity: Granularity::Days,
			root_index: 0,
		}
	}
}

#[derive(Debug, Clone)]
struct App {
	focus: FocusPane,
	task_index: usize,
	select_task_id: Option<String>,
	mode: InputMode,
	report: Option<ReportState>,
	status: String,
}

impl Default for App {
	fn default() -> Self {
		Self {
			focus: FocusPane::Tasks,
			task_index: 0,
			select_task_id: None,
			mode: InputMode::Normal,
			report: None,
			status: "Ready".to_string(),
		}
	}
}

impl App {
	fn clamp_selection(&mut self, view: &ViewModel) {
		if let Some(task_id) = self.select_task_id.take() {
			if let Some(index) = view.rows.iter().position(|row| row.id == task_id) {
				self.task_index = index;
			}
		}

		if view.rows.is_empty() {
			self.task_index = 0;
		} else {
			self.task_index = self.task_index.min(view.rows.len() - 1);
		}
	}

	fn move_task_selection(&mut self, delta: i32, view: &ViewModel) {
		if view.rows.is_empty() {
			self.task_index = 0;
			return;
		}

		if delta > 0 {
			self.task_index = (self.task_index + delta as usize).min(view.rows.len() - 1);
		} else {
			self.task_index = self.task_index.saturating_sub(delta.unsigned_abs() as usize);
		}
	}
}

struct ViewModel {
	now: DateTime<Local>,
	rows: Vec<TaskRow>,
	running: Option<RunningView>,
	report: Option<Result<ReportView, String>>,
}

struct TaskRow {
	id: String,
	depth: usize,
	name: String,
	color: Option<String>,
	style: Style,
	running: bool,
	today: i64,
	week: i64,
	month: i64,
	total: i64,
	goal: Option<u64>,
	goal_reached: bool,
	hotkey: Option<String>,
	entry_count: usize,
	adjustment_count: usize,
	subtask_count: usize,
}

struct RunningView {
	name: String,
	style: Style,
	elapsed: i64,
	today: i64,
}

/// A generated report plus the child colors it needs for rendering.
struct ReportView {
	report: Report,
	/// `(root name, part name, stored color)` for every part in the report.
	forest_colors: Vec<(String, String, Option<String>)>,
}

impl ReportView {
	fn new(report: Report, forest: &[Task]) -> Self {
		let forest_colors = report
			.summaries
			.iter()
			.flat_map(|summary| {
				summary.parts.iter().map(|part| {
					(
						summary.name.clone(),
						part.name.clone(),
						part_color(forest, &summary.name, &part.name).map(str::to_string),
					)
				})
			})
			.collect();
		Self { report, forest_colors }
	}
}

#[cfg(test)]
mod tests {
	use chrono::{DateTime, Local, TimeZone};
	use ratatui::style::{Color, Style};
	use tempfile::TempDir;

	use super::{App, ReportRange, ReportState, build_reparent_select, build_view, goal_bar_width, stacked_bar};
	use crate::app::Tracker;
	use crate::paths::DataPaths;
	use crate::report::{Granularity, Preset};

	fn at(day: u32, hour: u32) -> DateTime<Local> {
		Local
			.with_ymd_and_hms(2026, 4, day, hour, 0, 0)
			.single()
			.expect("test instant should be unambiguous")
	}

	#[test]
	fn view_lists_tasks_in_tree_order_with_running_marker() {
		let dir = TempDir::new().expect("temp dir");
		let mut tracker = Tracker::open_at(DataPaths::in_dir(dir.path()), at(14, 8)).expect("open");
		let work = tracker.add_task(Some("Work"), None).expect("add");
		let email = tracker.add_task(Some("Email"), Some(&work)).expect("add");
		tracker.add_task(Some("Home"), None).expect("add");
		tracker.on_toggle_at(&email, at(14, 9)).expect("toggle");

		let view = build_view(&App::default(), &tracker, at(14, 11));
		let names: Vec<_> = view.rows.iter().map(|row| (row.depth, row.name.as_str())).collect();
		assert_eq!(names, [(0, "Work"), (1, "Email"), (0, "Home")]);
		assert!(view.rows[1].running);
		assert_eq!(view.rows[0].today, 7200);
		assert_eq!(view.rows[0].subtask_count, 1);
		assert!(matches!(view.rows[0].style.fg, Some(Color::Rgb(..))));

		let running = view.running.expect("running");
		assert_eq!(running.name, "Email");
		assert_eq!(running.elapsed, 7200);
		assert!(view.report.is_none());
	}

	#[test]
	fn view_builds_report_when_open() {
		let dir = TempDir::new().expect("temp dir");
		let mut tracker = Tracker::open_at(DataPaths::in_dir(dir.path()), at(14, 8)).expect("open");
		let work = tracker.add_task(Some("Work"), None).expect("add");
		tracker.add_task(Some("Email"), Some(&work)).expect("add");
		tracker.on_toggle_at(&work, at(14, 9)).expect("toggle");

		let mut app = App::default();
		app.report = Some(ReportState {
			range: ReportRange::Preset(Preset::Last7),
			granularity: Granularity::Days,
			root_index: 0,
		});
		let view = build_view(&app, &tracker, at(14, 10));
		let report = view.report.expect("report").expect("valid report");
		assert_eq!(report.report.bins.len(), 7);
		assert_eq!(report.report.summaries[0].total, 3600);
		assert_eq!(report.forest_colors.len(), 1);
		assert_eq!(report.forest_colors[0].1, "other");

		app.report = Some(ReportState {
			range: ReportRange::Custom {
				from: "2026-04-10".to_string(),
				to: "2026-04-01".to_string(),
			},
			granularity: Granularity::Days,
			root_index: 0,
		});
		let view = build_view(&app, &tracker, at(14, 10));
		assert!(view.report.expect("report").is_err());
	}

	#[test]
	fn reparent_choices_exclude_the_moved_subtree() {
		let dir = TempDir::new().expect("temp dir");
		let mut tracker = Tracker::open_at(DataPaths::in_dir(dir.path()), at(14, 8)).expect("open");
		let work = tracker.add_task(Some("Work"), None).expect("add");
		let email = tracker.add_task(Some("Email"), Some(&work)).expect("add");
		let home = tracker.add_task(Some("Home"), None).expect("add");

		let select = build_reparent_select(tracker.roots(), &work, "Work");
		let values: Vec<_> = select.options.iter().map(|option| option.value.clone()).collect();
		assert_eq!(values, [None, Some(home)]);
		assert!(!values.contains(&Some(email)));
	}

	#[test]
	fn stacked_bar_scales_parts_to_the_widest_bin() {
		let style = Style::default();
		let parts = vec![
			("Email".to_string(), 1800, style),
			("other".to_string(), 1800, style),
			("Idle".to_string(), 0, style),
		];
		let bar = stacked_bar(&parts, 7200, 20);
		let widths: Vec<_> = bar.iter().map(|(name, width, _)| (name.as_str(), *width)).collect();
		assert_eq!(widths, [("Email", 5), ("other", 5)]);
		assert!(stacked_bar(&parts, 0, 20).is_empty());
	}

	#[test]
	fn goal_bar_is_capped_when_goal_is_exceeded() {
		assert_eq!(goal_bar_width(1800, 3600), 10);
		assert_eq!(goal_bar_width(7200, 3600), 20);
		assert_eq!(goal_bar_width(-60, 3600), 0);
	}
}
