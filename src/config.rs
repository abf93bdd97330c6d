use crate::capture::DEFAULT_THROTTLE;
use crate::sink::SinkDescriptor;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LOG_DIR: &str = "keylogs";
const DEFAULT_LOG_FILE: &str = "keylog.txt";

/// Whether starting the pipeline occupies the caller until capture stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaptureMode {
    /// The caller runs the capture loop and only gets control back once it is interrupted.
    #[default]
    Blocking,
    /// The capture loop runs on its own task.
    NonBlocking,
}

/// The per-user default log file: `$HOME/keylogs/keylog.txt`.
///
/// Falls back to `keylogs/keylog.txt` in the working directory if `HOME` is not set.
pub fn default_log_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(DEFAULT_LOG_DIR)
        .join(DEFAULT_LOG_FILE)
}

/// Configuration for a [`LoggingPipeline`](crate::LoggingPipeline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// The log files to write to.
    pub sinks: Vec<SinkDescriptor>,
    /// The pause after each captured key press.
    pub throttle: Duration,
    pub mode: CaptureMode,
    /// Refuse to start if no log file passes validation.
    pub require_sink: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sinks: vec![SinkDescriptor::new(default_log_path())],
            throttle: DEFAULT_THROTTLE,
            mode: CaptureMode::default(),
            require_sink: true,
        }
    }
}

impl PipelineConfig {
    /// Log to `paths` with the default policy. An empty list selects the default log file.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let sinks = paths
            .into_iter()
            .map(SinkDescriptor::new)
            .collect::<Vec<_>>();

        if sinks.is_empty() {
            return Self::default();
        }

        Self {
            sinks,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: SinkDescriptor) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Apply the overwrite policy to every log file.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        for sink in &mut self.sinks {
            sink.overwrite = overwrite;
        }
        self
    }

    #[must_use]
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: CaptureMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn require_sink(mut self, required: bool) -> Self {
        self.require_sink = required;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();

        assert_eq!(config.sinks, vec![SinkDescriptor::new(default_log_path())]);
        assert_eq!(config.throttle, Duration::from_millis(50));
        assert_eq!(config.mode, CaptureMode::Blocking);
        assert!(config.require_sink);
        assert!(!config.sinks[0].overwrite);
    }

    #[test]
    fn default_path_is_per_user() {
        let path = default_log_path();

        assert!(path.ends_with("keylogs/keylog.txt"));
    }

    #[test]
    fn empty_path_list_uses_default_sink() {
        let config = PipelineConfig::from_paths(Vec::<PathBuf>::new());

        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn overwrite_applies_to_every_sink() {
        let config = PipelineConfig::from_paths(["a.txt", "b.txt"]).with_overwrite(true);

        assert_eq!(config.sinks.len(), 2);
        assert!(config.sinks.iter().all(|s| s.overwrite));
    }
}
