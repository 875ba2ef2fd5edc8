//! Batch orchestrator
//!
//! Ties the run together: claims the pid file, opens the timestamp log,
//! starts the callback listener, drives every configured task in order,
//! then stops the listener and closes the log. The log is closed even when
//! individual tasks fail; only startup preconditions abort the run.

use crate::config::UpdateConfig;
use crate::driver::{TaskDriver, TaskOutcome};
use crate::error::Result;
use crate::fetch::DumpFetcher;
use crate::listener::CallbackServer;
use crate::pidfile;
use crate::signal::CompletionRegistry;
use crate::submit::ImportClient;
use crate::timestamps::TimestampLog;
use tracing::{info, warn};

/// Outcome counts for one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: usize,
    pub timed_out: usize,
    pub no_submission: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Completed => self.completed += 1,
            TaskOutcome::TimedOut => self.timed_out += 1,
            TaskOutcome::NoSubmission => self.no_submission += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.timed_out + self.no_submission
    }
}

/// Runs one update batch over the configured tasks
pub struct Updater {
    config: UpdateConfig,
}

impl Updater {
    pub fn new(config: UpdateConfig) -> Self {
        Self { config }
    }

    /// Execute the whole batch: claim the pid file, open the timestamp log,
    /// start the callback listener, drive every task in order, then stop
    /// the listener and close the log.
    pub async fn run(&self) -> Result<BatchReport> {
        pidfile::acquire(&self.config.pid_file)?;

        let tslog = TimestampLog::open(&self.config.timestamps)?;

        let registry = CompletionRegistry::new();
        let server =
            CallbackServer::start(&self.config.host, self.config.port, registry.clone()).await?;

        // An explicit callback_url wins; otherwise the remote service is
        // pointed at the address the listener actually bound.
        let callback_base = match self.config.callback_url {
            Some(ref url) => url.clone(),
            None => format!("http://{}", server.local_addr()),
        };

        let client = reqwest::Client::new();
        let driver = TaskDriver::new(
            DumpFetcher::new(client.clone()),
            ImportClient::new(client, registry.clone(), callback_base),
            registry,
        );

        let mut report = BatchReport::default();
        for task in &self.config.tasks {
            info!("Execute task: {:?}", task);
            let outcome = driver.execute(task, &self.config, &tslog).await;
            match outcome {
                TaskOutcome::Completed => info!("✓ Region {} import completed", task.region),
                TaskOutcome::TimedOut => warn!("✗ Region {} import timed out", task.region),
                TaskOutcome::NoSubmission => {
                    warn!("✗ Region {} import was not submitted", task.region)
                },
            }
            report.record(outcome);
        }

        server.shutdown().await;
        tslog.close()?;

        info!(
            "Batch completed: {} done, {} timed out, {} not submitted",
            report.completed, report.timed_out, report.no_submission
        );

        Ok(report)
    }
}
