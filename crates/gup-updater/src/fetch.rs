//! Dump fetcher
//!
//! Downloads a region's dump to `<base>/dumps/<region>.json.gz` ahead of
//! submission and, when the task configures one, pulls a small timestamp
//! marker into the batch's timestamp log. Dumps can run to gigabytes, so
//! downloads stream to disk chunk by chunk.

use crate::config::{Task, UpdateConfig};
use crate::error::Result;
use crate::timestamps::TimestampLog;
use futures::StreamExt;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Outcome of one fetch step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The task declares no dump source; nothing was touched
    NoSource,
    /// Destination exists and the overwrite policy forbids reloading
    SkippedExisting,
    /// Dump downloaded, replacing any previous file
    Downloaded,
}

/// Downloads dumps and timestamp markers
pub struct DumpFetcher {
    client: reqwest::Client,
}

impl DumpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch the task's dump according to the overwrite policy, then the
    /// optional timestamp marker
    pub async fn fetch(
        &self,
        task: &Task,
        config: &UpdateConfig,
        tslog: &TimestampLog,
    ) -> Result<FetchOutcome> {
        let Some(ref dump_src) = task.dump_src else {
            debug!("Region {} has no dump source, nothing to fetch", task.region);
            return Ok(FetchOutcome::NoSource);
        };

        let dump_path = config.dump_path(&task.region);

        if dump_path.is_file() {
            if !config.force_reload_for(task) {
                info!("Region {} dump already exists, skip", task.region);
                return Ok(FetchOutcome::SkippedExisting);
            }
            info!("Region {} dump will be overwritten", task.region);
        }

        info!("Download {} to {}", dump_src, dump_path.display());
        self.download_file(dump_src, &dump_path).await?;

        if let Some(ref dump_ts) = task.dump_ts {
            self.append_timestamp(dump_ts, tslog).await?;
        }

        Ok(FetchOutcome::Downloaded)
    }

    /// Stream a remote file to disk, replacing any previous content
    async fn download_file(&self, url: &str, output_path: &Path) -> Result<()> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::File::create(output_path)?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)?;
        }

        Ok(())
    }

    /// Fetch a timestamp marker into memory and append it to the log
    async fn append_timestamp(&self, url: &str, tslog: &TimestampLog) -> Result<()> {
        info!("Fetch timestamp marker from {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        tslog.append(&body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        _dir: tempfile::TempDir,
        config: UpdateConfig,
        tslog: TimestampLog,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = UpdateConfig {
            base: dir.path().to_path_buf(),
            timestamps: dir.path().join("timestamps.html"),
            ..Default::default()
        };
        let tslog = TimestampLog::open(&config.timestamps).unwrap();
        Fixture {
            _dir: dir,
            config,
            tslog,
        }
    }

    #[tokio::test]
    async fn test_no_dump_source_is_a_noop() {
        let fx = fixture();
        let fetcher = DumpFetcher::new(reqwest::Client::new());
        let task = Task::default();

        let outcome = fetcher.fetch(&task, &fx.config, &fx.tslog).await.unwrap();

        assert_eq!(outcome, FetchOutcome::NoSource);
        assert!(!fx.config.base.join("dumps").exists());
    }

    #[tokio::test]
    async fn test_download_writes_dump_file() {
        let fx = fixture();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/by.json.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"dump-bytes"[..]))
            .mount(&server)
            .await;

        let fetcher = DumpFetcher::new(reqwest::Client::new());
        let task = Task {
            region: "by".to_string(),
            dump_src: Some(format!("{}/by.json.gz", server.uri())),
            ..Default::default()
        };

        let outcome = fetcher.fetch(&task, &fx.config, &fx.tslog).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Downloaded);
        let written = std::fs::read(fx.config.dump_path("by")).unwrap();
        assert_eq!(written, b"dump-bytes");
    }

    #[tokio::test]
    async fn test_existing_dump_kept_when_reload_disabled() {
        let mut fx = fixture();
        fx.config.force_dump_reload = false;

        let dump_path = fx.config.dump_path("by");
        std::fs::create_dir_all(dump_path.parent().unwrap()).unwrap();
        std::fs::write(&dump_path, b"previous").unwrap();

        let fetcher = DumpFetcher::new(reqwest::Client::new());
        let task = Task {
            region: "by".to_string(),
            dump_src: Some("http://127.0.0.1:1/unreachable".to_string()),
            ..Default::default()
        };

        let outcome = fetcher.fetch(&task, &fx.config, &fx.tslog).await.unwrap();

        assert_eq!(outcome, FetchOutcome::SkippedExisting);
        assert_eq!(std::fs::read(&dump_path).unwrap(), b"previous");
    }

    #[tokio::test]
    async fn test_task_override_forces_reload() {
        let mut fx = fixture();
        fx.config.force_dump_reload = false;

        let dump_path = fx.config.dump_path("by");
        std::fs::create_dir_all(dump_path.parent().unwrap()).unwrap();
        std::fs::write(&dump_path, b"previous").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/by.json.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"fresh"[..]))
            .mount(&server)
            .await;

        let fetcher = DumpFetcher::new(reqwest::Client::new());
        let task = Task {
            region: "by".to_string(),
            dump_src: Some(format!("{}/by.json.gz", server.uri())),
            force_dump_reload: Some(true),
            ..Default::default()
        };

        let outcome = fetcher.fetch(&task, &fx.config, &fx.tslog).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Downloaded);
        assert_eq!(std::fs::read(&dump_path).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_timestamp_marker_appended_to_log() {
        let fx = fixture();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/by.json.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"dump"[..]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/by.timestamp"))
            .respond_with(ResponseTemplate::new(200).set_body_string("2026-08-20T03:00:00"))
            .mount(&server)
            .await;

        let fetcher = DumpFetcher::new(reqwest::Client::new());
        let task = Task {
            region: "by".to_string(),
            dump_src: Some(format!("{}/by.json.gz", server.uri())),
            dump_ts: Some(format!("{}/by.timestamp", server.uri())),
            ..Default::default()
        };

        fetcher.fetch(&task, &fx.config, &fx.tslog).await.unwrap();

        let log = std::fs::read_to_string(&fx.config.timestamps).unwrap();
        assert_eq!(log, "<html><body><pre>\n\r2026-08-20T03:00:00");
    }

    #[tokio::test]
    async fn test_http_error_status_fails_the_fetch() {
        let fx = fixture();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/by.json.gz"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = DumpFetcher::new(reqwest::Client::new());
        let task = Task {
            region: "by".to_string(),
            dump_src: Some(format!("{}/by.json.gz", server.uri())),
            ..Default::default()
        };

        let result = fetcher.fetch(&task, &fx.config, &fx.tslog).await;
        assert!(result.is_err());
    }
}
