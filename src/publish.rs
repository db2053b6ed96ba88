use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::Command;

use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{Ledger, StopOutcome};
use crate::events::StopListener;

#[derive(Debug)]
pub enum PublishError {
	Spawn { step: String, source: std::io::Error },
	Failed { step: String, code: Option<i32> },
}

impl Display for PublishError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			PublishError::Spawn { step, source } => write!(f, "could not run {step}: {source}"),
			PublishError::Failed { step, code: Some(code) } => {
				write!(f, "{step} exited with status {code}")
			}
			PublishError::Failed { step, code: None } => write!(f, "{step} was terminated"),
		}
	}
}

impl std::error::Error for PublishError {}

pub trait Publisher {
	fn publish(&self, files: &[PathBuf], message: &str) -> Result<(), PublishError>;
}

/// Stages, commits and pushes with the `git` binary in `repo_dir`.
#[derive(Debug, Clone)]
pub struct GitPublisher {
	program: String,
	repo_dir: PathBuf,
}

impl GitPublisher {
	pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
		Self {
			program: "git".to_string(),
			repo_dir: repo_dir.into(),
		}
	}

	pub fn with_program(mut self, program: impl Into<String>) -> Self {
		self.program = program.into();
		self
	}

	fn run(&self, args: &[&str], extra: &[PathBuf]) -> Result<(), PublishError> {
		let step = format!("{} {}", self.program, args.join(" "));
		let status = Command::new(&self.program)
			.args(args)
			.args(extra)
			.current_dir(&self.repo_dir)
			.status()
			.map_err(|source| PublishError::Spawn {
				step: step.clone(),
				source,
			})?;

		if !status.success() {
			return Err(PublishError::Failed {
				step,
				code: status.code(),
			});
		}
		Ok(())
	}
}

impl Publisher for GitPublisher {
	fn publish(&self, files: &[PathBuf], message: &str) -> Result<(), PublishError> {
		let files = files
			.iter()
			.filter(|path| self.repo_dir.join(path).exists())
			.cloned()
			.collect::<Vec<_>>();

		self.run(&["add", "--"], &files)?;
		self.run(&["commit", "-m", message], &[])?;
		self.run(&["push"], &[])?;
		info!(repo = %self.repo_dir.display(), files = files.len(), "published");
		Ok(())
	}
}

pub fn commit_message(outcome: &StopOutcome) -> String {
	format!(
		"Auto-update: Logged {:.2} hrs to {} on {}",
		outcome.hours(),
		outcome.category,
		outcome.date_key
	)
}

pub struct PublishListener<P> {
	publisher: P,
	files: Vec<PathBuf>,
}

impl<P: Publisher> PublishListener<P> {
	pub fn new(publisher: P, config: &Config) -> Self {
		Self {
			publisher,
			files: config.tracked_files(),
		}
	}
}

impl<P: Publisher> StopListener for PublishListener<P> {
	fn name(&self) -> &'static str {
		"publish"
	}

	/// Publish problems are reported here and never returned, a stop is already committed.
	fn on_stop(&mut self, _ledger: &Ledger, outcome: &StopOutcome) -> Result<(), Box<dyn Error>> {
		match self.publisher.publish(&self.files, &commit_message(outcome)) {
			Ok(()) => println!("Changes pushed."),
			Err(err) => {
				warn!(error = %err, "publish failed");
				println!("Publish failed: {err}");
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::path::PathBuf;
	use std::rc::Rc;

	use crate::config::Config;
	use crate::domain::{Ledger, StopOutcome};
	use crate::events::StopListener;

	use super::{GitPublisher, PublishError, PublishListener, Publisher, commit_message};

	fn outcome() -> StopOutcome {
		StopOutcome {
			category: "coding".to_string(),
			duration_seconds: 3661.0,
			date_key: "2026-10-14".to_string(),
		}
	}

	#[derive(Clone, Default)]
	struct FakePublisher {
		calls: Rc<RefCell<Vec<(Vec<PathBuf>, String)>>>,
		fail: bool,
	}

	impl Publisher for FakePublisher {
		fn publish(&self, files: &[PathBuf], message: &str) -> Result<(), PublishError> {
			self.calls
				.borrow_mut()
				.push((files.to_vec(), message.to_string()));
			if self.fail {
				return Err(PublishError::Failed {
					step: "git push".to_string(),
					code: Some(1),
				});
			}
			Ok(())
		}
	}

	#[test]
	fn formats_commit_message() {
		assert_eq!(
			commit_message(&outcome()),
			"Auto-update: Logged 1.02 hrs to coding on 2026-10-14"
		);
	}

	#[test]
	fn publishes_all_four_artifacts() {
		let publisher = FakePublisher::default();
		let mut listener = PublishListener::new(publisher.clone(), &Config::default());
		listener
			.on_stop(&Ledger::new(), &outcome())
			.expect("listener never fails");

		let calls = publisher.calls.borrow();
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].0, Config::default().tracked_files());
		assert!(calls[0].1.contains("coding"));
	}

	#[test]
	fn publish_failure_is_swallowed() {
		let publisher = FakePublisher {
			fail: true,
			..FakePublisher::default()
		};
		let mut listener = PublishListener::new(publisher, &Config::default());
		assert!(listener.on_stop(&Ledger::new(), &outcome()).is_ok());
	}

	#[test]
	fn missing_git_binary_is_a_spawn_error() {
		let dir = tempfile::tempdir().expect("tempdir");
		let publisher = GitPublisher::new(dir.path()).with_program("grind-no-such-binary");
		let err = publisher
			.publish(&[PathBuf::from("README.md")], "msg")
			.expect_err("spawn must fail");
		assert!(matches!(err, PublishError::Spawn { .. }));
	}
}
