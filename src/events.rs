use std::error::Error;

use chrono::Utc;
use tracing::warn;

use crate::chart::ChartRenderer;
use crate::config::Config;
use crate::domain::{Ledger, StopOutcome, local_day, parse_date_key};
use crate::report::{ReportStatus, run_report};

/// Something the caller wants done after a session has been committed.
pub trait StopListener {
    fn name(&self) -> &'static str;

    fn on_stop(&mut self, ledger: &Ledger, outcome: &StopOutcome) -> Result<(), Box<dyn Error>>;
}

/// Notifies listeners in order. A failing listener is logged and the rest still run.
pub fn dispatch_stop(listeners: &mut [Box<dyn StopListener>], ledger: &Ledger, outcome: &StopOutcome) {
    for listener in listeners.iter_mut() {
        if let Err(err) = listener.on_stop(ledger, outcome) {
            warn!(listener = listener.name(), error = %err, "stop listener failed");
            eprintln!("warning: {} step failed: {err}", listener.name());
        }
    }
}

pub struct ReportListener<R> {
    config: Config,
    renderer: R,
}

impl<R: ChartRenderer> ReportListener<R> {
    pub fn new(config: Config, renderer: R) -> Self {
        Self { config, renderer }
    }
}

impl<R: ChartRenderer> StopListener for ReportListener<R> {
    fn name(&self) -> &'static str {
        "report"
    }

    fn on_stop(&mut self, ledger: &Ledger, outcome: &StopOutcome) -> Result<(), Box<dyn Error>> {
        let today = parse_date_key(&outcome.date_key).unwrap_or_else(|| local_day(Utc::now()));
        let status = run_report(ledger, today, &self.config, &self.renderer)?;
        print_report_status(&status);
        Ok(())
    }
}

pub fn print_report_status(status: &ReportStatus) {
    match status {
        ReportStatus::Written(paths) => {
            for path in paths {
                println!("wrote {}", path.display());
            }
        }
        ReportStatus::EmptyWindow => println!("No data to generate report."),
    }
}
