//! Task driver
//!
//! Runs one task through fetch, submit, bounded wait, cleanup. Tasks are
//! strictly sequential: the next fetch does not start until the current
//! task settles. Nothing a single task does aborts the batch; failures are
//! logged and folded into the task's outcome.

use crate::config::{Task, UpdateConfig};
use crate::fetch::DumpFetcher;
use crate::signal::CompletionRegistry;
use crate::submit::ImportClient;
use crate::timestamps::TimestampLog;
use tracing::{error, info, warn};

/// Terminal state of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Callback received before the deadline; the dump was cleaned up
    Completed,
    /// No callback within the wait window; the dump is retained for
    /// inspection or a later retry
    TimedOut,
    /// The import was never accepted, so there was nothing to wait for
    NoSubmission,
}

/// Executes tasks one at a time
pub struct TaskDriver {
    fetcher: DumpFetcher,
    submitter: ImportClient,
    registry: CompletionRegistry,
}

impl TaskDriver {
    pub fn new(fetcher: DumpFetcher, submitter: ImportClient, registry: CompletionRegistry) -> Self {
        Self {
            fetcher,
            submitter,
            registry,
        }
    }

    /// Drive one task to a terminal state
    pub async fn execute(
        &self,
        task: &Task,
        config: &UpdateConfig,
        tslog: &TimestampLog,
    ) -> TaskOutcome {
        if let Err(e) = self.fetcher.fetch(task, config, tslog).await {
            // The submission still goes out; it may reference an older dump.
            error!("Region {} dump fetch failed: {}", task.region, e);
        }

        let signal = match self.submitter.submit(task, config).await {
            Ok(Some(signal)) => signal,
            Ok(None) => return TaskOutcome::NoSubmission,
            Err(e) => {
                error!("Region {} import submission failed: {}", task.region, e);
                return TaskOutcome::NoSubmission;
            },
        };

        let timeout = config.timeout_for(task);
        info!(
            "Wait for import to be done, timeout {}h ({} sec.)",
            timeout.as_secs_f64() / 3600.0,
            timeout.as_secs_f64()
        );

        let completed = signal.wait(timeout).await;
        if completed {
            signal.clear();
        }
        self.registry.remove(&task.region);

        if completed {
            info!("Done import");
            self.cleanup(task, config);
            TaskOutcome::Completed
        } else {
            info!("Import timed out");
            TaskOutcome::TimedOut
        }
    }

    /// Remove the used dump after a completed import
    fn cleanup(&self, task: &Task, config: &UpdateConfig) {
        let dump_path = config.dump_path(&task.region);
        info!("Remove {}", dump_path.display());
        if let Err(e) = std::fs::remove_file(&dump_path) {
            if e.kind() == std::io::ErrorKind::NotFound {
                warn!("Dump {} was already gone", dump_path.display());
            } else {
                warn!("Failed to remove dump {}: {}", dump_path.display(), e);
            }
        }
        info!("Task {} done", task.region);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUBMITTED: &str = r#"{"state":"submitted"}"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        config: UpdateConfig,
        tslog: TimestampLog,
        registry: CompletionRegistry,
        driver: TaskDriver,
    }

    fn fixture(api_url: String) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = UpdateConfig {
            base: dir.path().to_path_buf(),
            timestamps: dir.path().join("timestamps.html"),
            ..Default::default()
        };
        config.gazetteer_api.url = api_url;

        let tslog = TimestampLog::open(&config.timestamps).unwrap();
        let registry = CompletionRegistry::new();
        let driver = TaskDriver::new(
            DumpFetcher::new(reqwest::Client::new()),
            ImportClient::new(
                reqwest::Client::new(),
                registry.clone(),
                "http://127.0.0.1:9009".to_string(),
            ),
            registry.clone(),
        );

        Fixture {
            _dir: dir,
            config,
            tslog,
            registry,
            driver,
        }
    }

    fn place_dump(config: &UpdateConfig, region: &str) {
        let path = config.dump_path(region);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"dump").unwrap();
    }

    /// Keep poking the registry until the region's signal appears, then set it
    fn complete_soon(registry: &CompletionRegistry, region: &str) {
        let registry = registry.clone();
        let region = region.to_string();
        tokio::spawn(async move {
            loop {
                if registry.complete(&region) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });
    }

    #[tokio::test]
    async fn test_callback_completes_task_and_removes_dump() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/location/_import"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUBMITTED))
            .mount(&server)
            .await;

        let fx = fixture(server.uri());
        let task = Task {
            region: "by".to_string(),
            ..Default::default()
        };
        place_dump(&fx.config, "by");
        complete_soon(&fx.registry, "by");

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            fx.driver.execute(&task, &fx.config, &fx.tslog),
        )
        .await
        .unwrap();

        assert_eq!(outcome, TaskOutcome::Completed);
        assert!(!fx.config.dump_path("by").exists());
        assert!(fx.registry.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_retains_dump() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/location/_import"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUBMITTED))
            .mount(&server)
            .await;

        let fx = fixture(server.uri());
        let task = Task {
            region: "by".to_string(),
            // 0.36 seconds
            timeout: Some(0.0001),
            ..Default::default()
        };
        place_dump(&fx.config, "by");

        let outcome = fx.driver.execute(&task, &fx.config, &fx.tslog).await;

        assert_eq!(outcome, TaskOutcome::TimedOut);
        assert!(fx.config.dump_path("by").exists());
        assert!(fx.registry.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_submission_skips_the_wait() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/location/_import"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"state":"rejected"}"#))
            .mount(&server)
            .await;

        let fx = fixture(server.uri());
        let task = Task {
            region: "by".to_string(),
            // An hour; the test finishing at all proves no wait happened
            timeout: Some(1.0),
            ..Default::default()
        };
        place_dump(&fx.config, "by");

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            fx.driver.execute(&task, &fx.config, &fx.tslog),
        )
        .await
        .unwrap();

        assert_eq!(outcome, TaskOutcome::NoSubmission);
        assert!(fx.config.dump_path("by").exists());
    }

    #[tokio::test]
    async fn test_fetch_failure_still_submits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dump.json.gz"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/location/_import"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUBMITTED))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(server.uri());
        let task = Task {
            region: "by".to_string(),
            dump_src: Some(format!("{}/dump.json.gz", server.uri())),
            ..Default::default()
        };
        complete_soon(&fx.registry, "by");

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            fx.driver.execute(&task, &fx.config, &fx.tslog),
        )
        .await
        .unwrap();

        assert_eq!(outcome, TaskOutcome::Completed);
    }

    #[tokio::test]
    async fn test_callback_racing_the_ack_is_not_lost() {
        let server = MockServer::start().await;
        // The ack is delayed past the callback below
        Mock::given(method("GET"))
            .and(path("/location/_import"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SUBMITTED)
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let fx = fixture(server.uri());
        let task = Task {
            region: "by".to_string(),
            timeout: Some(1.0),
            ..Default::default()
        };
        place_dump(&fx.config, "by");
        complete_soon(&fx.registry, "by");

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            fx.driver.execute(&task, &fx.config, &fx.tslog),
        )
        .await
        .unwrap();

        assert_eq!(outcome, TaskOutcome::Completed);
        assert!(!fx.config.dump_path("by").exists());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_dump() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/location/_import"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUBMITTED))
            .mount(&server)
            .await;

        let fx = fixture(server.uri());
        let task = Task {
            region: "by".to_string(),
            ..Default::default()
        };
        // No dump file placed
        complete_soon(&fx.registry, "by");

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            fx.driver.execute(&task, &fx.config, &fx.tslog),
        )
        .await
        .unwrap();

        assert_eq!(outcome, TaskOutcome::Completed);
    }
}
