use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

use chrono::{Days, NaiveDate};
use tracing::info;

use crate::chart::{ChartRenderer, Slice};
use crate::config::{Config, absolute_lexical};
use crate::domain::{DATE_KEY_FORMAT, DayTotals, Ledger, parse_date_key, round_hours};
use crate::storage::write_atomic;

pub const CHART_TITLE: &str = "Weekly Grind Breakdown";
const TABLE_HEADER: &str = "| Category | Time Spent (hrs) |\n|----------|------------------|\n";

/// Committed time inside the trailing window. The running session is never part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    pub window_start: NaiveDate,
    pub today: NaiveDate,
    pub window_days: u32,
    pub totals: DayTotals,
    pub daily_logs: BTreeMap<NaiveDate, DayTotals>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportStatus {
    Written(Vec<PathBuf>),
    EmptyWindow,
}

/// Aggregates every day in `[today - window_days, today]`. Keys that are not
/// `YYYY-MM-DD` dates are skipped. Returns `None` when nothing falls inside.
/// A window reaching past the earliest representable date starts there.
pub fn generate(ledger: &Ledger, today: NaiveDate, window_days: u32) -> Option<WeeklyReport> {
    let window_start = today
        .checked_sub_days(Days::new(u64::from(window_days)))
        .unwrap_or(NaiveDate::MIN);
    let mut totals = DayTotals::new();
    let mut daily_logs: BTreeMap<NaiveDate, DayTotals> = BTreeMap::new();

    for (key, categories) in &ledger.days {
        let Some(day) = parse_date_key(key) else {
            continue;
        };
        if day < window_start || day > today {
            continue;
        }

        for (category, seconds) in categories {
            *totals.entry(category.clone()).or_insert(0.0) += seconds;
            *daily_logs
                .entry(day)
                .or_default()
                .entry(category.clone())
                .or_insert(0.0) += seconds;
        }
    }

    if totals.is_empty() {
        return None;
    }

    Some(WeeklyReport {
        window_start,
        today,
        window_days,
        totals,
        daily_logs,
    })
}

impl WeeklyReport {
    /// Rounded hours per category, largest first.
    pub fn hours(&self) -> Vec<(String, f64)> {
        let mut rows = self
            .totals
            .iter()
            .map(|(category, seconds)| (category.clone(), round_hours(*seconds)))
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| right.1.total_cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
        rows
    }

    pub fn slices(&self) -> Vec<Slice> {
        self.hours()
            .into_iter()
            .map(|(label, hours)| Slice { label, hours })
            .collect()
    }
}

pub fn render_markdown(report: &WeeklyReport, chart_ref: &str) -> String {
    let mut out = String::new();
    out.push_str("## 🧠 Weekly Grind Time Breakdown\n\n");
    let _ = writeln!(out, "![Grind Chart]({chart_ref})\n");

    out.push_str(TABLE_HEADER);
    for (category, hours) in report.hours() {
        push_row(&mut out, &category, hours);
    }

    let _ = writeln!(out, "\n## 📅 Daily Logs (Past {} Days)\n", report.window_days);
    for (day, categories) in report.daily_logs.iter().rev() {
        let _ = writeln!(out, "### {}\n", day.format(DATE_KEY_FORMAT));
        out.push_str(TABLE_HEADER);
        for (category, seconds) in categories {
            push_row(&mut out, category, round_hours(*seconds));
        }
        out.push('\n');
    }

    out
}

fn push_row(out: &mut String, category: &str, hours: f64) {
    let _ = writeln!(out, "| {category} | {hours:.2} hrs |");
}

/// Link from the summary document to the chart image, relative to the
/// summary's directory. The readme shares that directory, see `Config::validate`.
pub fn chart_reference(chart_path: &Path, summary_path: &Path) -> String {
    let summary_dir = summary_path.parent().unwrap_or(Path::new(""));
    let relative = relative_to(summary_dir, chart_path);
    let parts = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    match parts.as_slice() {
        [name] => format!("./{name}"),
        _ => parts.join("/"),
    }
}

fn relative_to(dir: &Path, target: &Path) -> PathBuf {
    let dir = absolute_lexical(dir);
    let target = absolute_lexical(target);
    let dir_parts = dir.components().collect::<Vec<_>>();
    let target_parts = target.components().collect::<Vec<_>>();
    let common = dir_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(left, right)| left == right)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..dir_parts.len() {
        relative.push(Component::ParentDir.as_os_str());
    }
    for part in &target_parts[common..] {
        relative.push(part.as_os_str());
    }
    relative
}

/// Renders the chart and writes the same markdown to the summary and readme paths.
pub fn write_artifacts(
    report: &WeeklyReport,
    config: &Config,
    renderer: &dyn ChartRenderer,
) -> Result<Vec<PathBuf>, std::io::Error> {
    renderer.render(CHART_TITLE, &report.slices(), &config.chart_path)?;
    info!(path = %config.chart_path.display(), "chart written");

    let markdown = render_markdown(
        report,
        &chart_reference(&config.chart_path, &config.summary_path),
    );
    for path in [&config.summary_path, &config.readme_path] {
        write_atomic(path, markdown.as_bytes())?;
        info!(path = %path.display(), "summary written");
    }

    Ok(vec![
        config.chart_path.clone(),
        config.summary_path.clone(),
        config.readme_path.clone(),
    ])
}

/// Full report pass. An empty window writes nothing so earlier artifacts survive.
pub fn run_report(
    ledger: &Ledger,
    today: NaiveDate,
    config: &Config,
    renderer: &dyn ChartRenderer,
) -> Result<ReportStatus, std::io::Error> {
    match generate(ledger, today, config.window_days) {
        Some(report) => Ok(ReportStatus::Written(write_artifacts(&report, config, renderer)?)),
        None => Ok(ReportStatus::EmptyWindow),
    }
}
