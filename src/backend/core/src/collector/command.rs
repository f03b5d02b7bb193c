//! Collector backed by an external program.
//!
//! The program (typically a browser-automation agent) must print the post list
//! as JSON on stdout and exit with status zero.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::{CollectResult, Collector, CollectorError, PostValidator};
use crate::config::CollectorConfig;

/// Bytes of stderr kept in failure messages.
const STDERR_TAIL: usize = 512;

#[derive(Debug, Clone)]
pub struct CommandCollector {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    raw_output_path: Option<PathBuf>,
    validator: PostValidator,
}

impl CommandCollector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let defaults = CollectorConfig::default();
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(defaults.timeout_secs),
            raw_output_path: None,
            validator: PostValidator::from_config(&defaults),
        }
    }

    /// Build from configuration; `None` when no command is configured.
    pub fn from_config(config: &CollectorConfig) -> Option<Self> {
        let (program, args) = config.command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: Duration::from_secs(config.timeout_secs),
            raw_output_path: config.raw_output_path.clone(),
            validator: PostValidator::from_config(config),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_raw_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.raw_output_path = Some(path.into());
        self
    }

    pub fn with_validator(mut self, validator: PostValidator) -> Self {
        self.validator = validator;
        self
    }

    async fn keep_raw_output(&self, raw: &str) {
        let Some(path) = &self.raw_output_path else {
            return;
        };
        if let Err(e) = tokio::fs::write(path, raw).await {
            warn!(path = %path.display(), error = %e, "Failed to write raw collector output");
        }
    }
}

#[async_trait]
impl Collector for CommandCollector {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn collect(&self) -> CollectResult {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CollectorError::Failed(format!("Failed to start collector {}: {}", self.program, e))
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CollectorError::Failed(format!(
                    "Failed to read collector output: {}",
                    e
                )))
            }
            Err(_) => return Err(CollectorError::TimedOut(self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollectorError::Failed(format!(
                "Collector exited with {}: {}",
                output.status,
                tail(stderr.trim(), STDERR_TAIL)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(bytes = output.stdout.len(), "Collector finished");

        let list = self.validator.parse(&stdout)?;
        self.keep_raw_output(stdout.trim()).await;

        info!(posts = list.len(), "Collector returned posts");
        Ok(list)
    }
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandCollector {
        CommandCollector::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_collects_json_from_stdout() {
        let script = r#"echo '{"posts":[{"url":"https://www.instagram.com/p/a1/","image_url":"https://cdn.example.com/a1.jpg","title":"Expo","description":"Vernissage"}]}'"#;
        let list = sh(script).collect().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.posts[0].url, "https://www.instagram.com/p/a1/");
    }

    #[tokio::test]
    async fn test_empty_stdout_is_a_failure() {
        let err = sh("true").collect().await.unwrap_err();
        assert_eq!(err.to_string(), "No result returned from collector");
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_stderr() {
        let err = sh("echo 'browser crashed' >&2; exit 3")
            .collect()
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Collector exited with"));
        assert!(message.ends_with("browser crashed"));
    }

    #[tokio::test]
    async fn test_timeout_kills_collector() {
        let err = sh("sleep 5")
            .with_timeout(Duration::from_millis(100))
            .collect()
            .await
            .unwrap_err();
        assert_eq!(err, CollectorError::TimedOut(Duration::from_millis(100)));
        assert_eq!(err.to_string(), "Collector timed out after 100ms");
    }

    #[tokio::test]
    async fn test_raw_output_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.json");
        sh(r#"echo '{"posts":[]}'"#)
            .with_raw_output_path(&path)
            .collect()
            .await
            .unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"{"posts":[]}"#);
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        assert_eq!(tail("abc", 10), "abc");
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ééé", 3), "é");
    }

    #[test]
    fn test_from_config_requires_command() {
        assert!(CommandCollector::from_config(&CollectorConfig::default()).is_none());
        let config = CollectorConfig {
            command: vec!["python".into(), "-m".into(), "scraper".into()],
            ..CollectorConfig::default()
        };
        let collector = CommandCollector::from_config(&config).unwrap();
        assert_eq!(collector.program, "python");
        assert_eq!(collector.args, vec!["-m", "scraper"]);
    }
}
