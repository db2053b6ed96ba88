mod chart;
mod config;
mod domain;
mod events;
mod publish;
mod report;
mod storage;
mod ui;

use std::error::Error;
use std::path::PathBuf;

use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::chart::SvgPieChart;
use crate::config::{Config, Overrides, resolve_config};
use crate::domain::{Ledger, StopOutcome, format_duration, local_day, round_hours};
use crate::events::{ReportListener, StopListener, dispatch_stop, print_report_status};
use crate::publish::{GitPublisher, PublishListener};
use crate::report::run_report;
use crate::storage::{LedgerStore, StoreError};
use crate::ui::run_dashboard;

#[derive(Debug, Parser)]
#[command(name = "grind", about = "Track work sessions and publish a weekly breakdown")]
struct Cli {
	/// Config file (defaults to ./grind.toml when present)
	#[arg(long, global = true)]
	config: Option<PathBuf>,
	/// State file, overrides the config and GRIND_STATE
	#[arg(long, global = true)]
	state: Option<PathBuf>,
	/// Skip the git commit and push after a stop
	#[arg(long, global = true)]
	no_publish: bool,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Start timing a category
	Start { category: String },
	/// Stop the running timer, update the report and publish it
	Stop,
	/// Regenerate the chart and summaries without touching the timer
	Report,
	/// Show the running timer
	Status,
	/// Live terminal view of the current week
	Dashboard,
}

fn main() {
	init_tracing();
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn init_tracing() {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "grind=warn".into()))
		.with_writer(std::io::stderr)
		.init();
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let Some(command) = cli.command else {
		Cli::command().print_help()?;
		println!();
		return Ok(());
	};

	let config = resolve_config(&Overrides {
		config_path: cli.config,
		state_path: cli.state,
		no_publish: cli.no_publish,
	})?;
	let store = LedgerStore::new(config.state_path.clone());
	debug!(state = %store.path().display(), publish = config.publish, "resolved config");

	match command {
		Command::Start { category } => start(&store, &category)?,
		Command::Stop => stop(&store, &config)?,
		Command::Report => {
			let ledger = store.load()?;
			let status = run_report(&ledger, local_day(Utc::now()), &config, &SvgPieChart::default())?;
			print_report_status(&status);
		}
		Command::Status => {
			let ledger = store.load()?;
			match &ledger.active_session {
				Some(session) => println!(
					"Running '{}' for {}.",
					session.category,
					format_duration(session.elapsed_seconds(Utc::now()))
				),
				None => println!("No active timer running."),
			}
		}
		Command::Dashboard => run_dashboard(&store, &config)?,
	}

	Ok(())
}

fn start(store: &LedgerStore, category: &str) -> Result<(), Box<dyn Error>> {
	match store.start(category, Utc::now()) {
		Ok(session) => println!("Started '{}' session.", session.category),
		Err(StoreError::Session(err)) => println!("{err}"),
		Err(StoreError::Storage(err)) => return Err(err.into()),
	}
	Ok(())
}

fn stop(store: &LedgerStore, config: &Config) -> Result<(), Box<dyn Error>> {
	let (outcome, ledger) = match store.stop(Utc::now()) {
		Ok(stopped) => stopped,
		Err(StoreError::Session(err)) => {
			println!("{err}");
			return Ok(());
		}
		Err(StoreError::Storage(err)) => return Err(err.into()),
	};

	println!("{}", stop_message(&outcome, &ledger));

	let mut listeners = stop_listeners(config);
	dispatch_stop(&mut listeners, &ledger, &outcome);

	Ok(())
}

fn stop_message(outcome: &StopOutcome, ledger: &Ledger) -> String {
	format!(
		"Stopped session. Logged {:.2} hrs to '{}' ({:.2} hrs on {}).",
		outcome.hours(),
		outcome.category,
		round_hours(ledger.seconds_for(&outcome.date_key, &outcome.category)),
		outcome.date_key
	)
}

/// Report first so the publish step picks up fresh artifacts.
fn stop_listeners(config: &Config) -> Vec<Box<dyn StopListener>> {
	let mut listeners: Vec<Box<dyn StopListener>> = vec![Box::new(ReportListener::new(
		config.clone(),
		SvgPieChart::default(),
	))];
	if config.publish {
		listeners.push(Box::new(PublishListener::new(
			GitPublisher::new(config.repo_dir.clone()).with_program(config.git_program.clone()),
			config,
		)));
	}
	listeners
}
