use std::error::Error;
use std::io;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, List, ListItem, Paragraph};
use ratatui::{Frame, Terminal};

use crate::chart::SvgPieChart;
use crate::config::Config;
use crate::domain::{format_duration, local_day, round_hours, DATE_KEY_FORMAT, Ledger};
use crate::report::{generate, run_report, ReportStatus};
use crate::storage::LedgerStore;

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const BAR_COLOR: Color = Color::LightYellow;

pub fn run_dashboard(store: &LedgerStore, config: &Config) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, store, config);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	store: &LedgerStore,
	config: &Config,
) -> Result<(), Box<dyn Error>> {
	let mut status = "r regenerate report | q quit".to_string();

	loop {
		let now = Utc::now();
		// Reloaded every tick so starts and stops from another shell show up.
		let view = match store.load() {
			Ok(ledger) => build_view(&ledger, now, config.window_days),
			Err(err) => ViewModel::failed(err.to_string()),
		};
		terminal.draw(|frame| draw_dashboard(frame, &view, &status))?;

		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				match key.code {
					KeyCode::Char('q') | KeyCode::Esc => break,
					KeyCode::Char('r') => status = regenerate(store, config, now),
					_ => {}
				}
			}
		}
	}

	Ok(())
}

fn regenerate(store: &LedgerStore, config: &Config, now: DateTime<Utc>) -> String {
	let ledger = match store.load() {
		Ok(ledger) => ledger,
		Err(err) => return format!("error: {err}"),
	};

	match run_report(&ledger, local_day(now), config, &SvgPieChart::default()) {
		Ok(ReportStatus::Written(paths)) => format!("report written ({} files)", paths.len()),
		Ok(ReportStatus::EmptyWindow) => "No data to generate report.".to_string(),
		Err(err) => format!("error: {err}"),
	}
}

fn draw_dashboard(frame: &mut Frame, view: &ViewModel, status: &str) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(4), Constraint::Min(10), Constraint::Length(3)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
		.split(layout[1]);

	render_active_panel(frame, layout[0], view);
	render_totals_panel(frame, body[0], view);
	render_daily_panel(frame, body[1], view);

	let footer = Paragraph::new(Line::from(status.to_string()))
		.block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, layout[2]);
}

fn render_active_panel(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let lines = if let Some(error) = &view.error {
		vec![Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red)))]
	} else if let Some(active) = &view.active {
		vec![
			Line::from(vec![
				Span::raw("Running: "),
				Span::styled(active.category.clone(), Style::default().add_modifier(Modifier::BOLD)),
			]),
			Line::from(format!("Elapsed: {}", format_duration(active.elapsed_seconds))),
		]
	} else {
		vec![Line::from("No active timer running.")]
	};

	let panel = Paragraph::new(lines).block(
		Block::default()
			.borders(Borders::ALL)
			.title("Session")
			.border_style(border_style(view.active.is_some())),
	);
	frame.render_widget(panel, area);
}

fn render_totals_panel(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let block = Block::default()
		.borders(Borders::ALL)
		.title(format!("Past {} days (hrs)", view.window_days));

	if view.totals.is_empty() {
		frame.render_widget(Paragraph::new("(no data in window)").block(block), area);
		return;
	}

	let bars = view
		.totals
		.iter()
		.map(|(category, hours)| {
			Bar::default()
				.value((hours * 100.0).round() as u64)
				.text_value(format!("{hours:.2}"))
				.label(Line::from(category.clone()))
		})
		.collect::<Vec<_>>();

	let chart = BarChart::default()
		.block(block)
		.data(BarGroup::default().bars(&bars))
		.bar_width(8)
		.bar_gap(2)
		.bar_style(Style::default().fg(BAR_COLOR));
	frame.render_widget(chart, area);
}

fn render_daily_panel(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let items = if view.daily.is_empty() {
		vec![ListItem::new("(empty)")]
	} else {
		view.daily
			.iter()
			.map(|row| {
				ListItem::new(Line::from(vec![
					Span::styled(format!("{} ", row.day), Style::default().fg(Color::DarkGray)),
					Span::raw(format!("{} | {:.2} hrs", row.category, row.hours)),
				]))
			})
			.collect()
	};

	let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Daily Logs"));
	frame.render_widget(list, area);
}

fn border_style(focused: bool) -> Style {
	Style::default().fg(if focused {
		FOCUSED_PANEL_BORDER_COLOR
	} else {
		INACTIVE_PANEL_BORDER_COLOR
	})
}

fn build_view(ledger: &Ledger, now: DateTime<Utc>, window_days: u32) -> ViewModel {
	let active = ledger.active_session.as_ref().map(|session| ActiveView {
		category: session.category.clone(),
		elapsed_seconds: session.elapsed_seconds(now),
	});

	let (totals, daily) = match generate(ledger, local_day(now), window_days) {
		Some(report) => {
			let daily: Vec<DailyRow> = report
				.daily_logs
				.iter()
				.rev()
				.flat_map(|(day, categories)| {
					let day = day.format(DATE_KEY_FORMAT).to_string();
					categories.iter().map(move |(category, seconds)| DailyRow {
						day: day.clone(),
						category: category.clone(),
						hours: round_hours(*seconds),
					})
				})
				.collect();
			(report.hours(), daily)
		}
		None => (Vec::new(), Vec::new()),
	};

	ViewModel {
		active,
		totals,
		daily,
		window_days,
		error: None,
	}
}

struct ViewModel {
	active: Option<ActiveView>,
	totals: Vec<(String, f64)>,
	daily: Vec<DailyRow>,
	window_days: u32,
	error: Option<String>,
}

impl ViewModel {
	fn failed(error: String) -> Self {
		Self {
			active: None,
			totals: Vec::new(),
			daily: Vec::new(),
			window_days: 0,
			error: Some(error),
		}
	}
}

struct ActiveView {
	category: String,
	elapsed_seconds: f64,
}

struct DailyRow {
	day: String,
	category: String,
	hours: f64,
}

#[cfg(test)]
mod tests {
	use chrono::{Duration, Utc};

	use crate::domain::{date_key, Ledger};

	use super::build_view;

	#[test]
	fn view_shows_running_session_and_committed_totals() {
		let now = Utc::now();
		let mut ledger = Ledger::new();
		ledger.add_duration(&date_key(now), "coding", 5400.0);
		ledger
			.start("reading", now - Duration::minutes(10))
			.expect("start should work");

		let view = build_view(&ledger, now, 7);
		let active = view.active.expect("active session");
		assert_eq!(active.category, "reading");
		assert!(active.elapsed_seconds > 599.0);
		assert_eq!(view.totals, vec![("coding".to_string(), 1.5)]);
		assert_eq!(view.daily.len(), 1);
		assert_eq!(view.daily[0].day, date_key(now));
	}

	#[test]
	fn empty_ledger_has_no_rows() {
		let view = build_view(&Ledger::new(), Utc::now(), 7);
		assert!(view.active.is_none());
		assert!(view.totals.is_empty());
		assert!(view.daily.is_empty());
	}
}
