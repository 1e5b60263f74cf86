//! JSON output adapter.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use photo_curator_core::{CurationDecision, ResultOutput};

use crate::commands::run::OutputFormat;

/// Writes decisions as JSON Lines, or as one JSON array on flush.
pub struct JsonOutput {
    writer: Mutex<Box<dyn Write + Send>>,
    format: OutputFormat,
    pretty: bool,
    pending: Mutex<Vec<CurationDecision>>,
}

impl JsonOutput {
    /// Creates a new JSON output writing to stdout.
    #[must_use]
    pub fn stdout(format: OutputFormat, pretty: bool) -> Self {
        Self::new(Box::new(io::stdout()), format, pretty)
    }

    /// Creates a new JSON output writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            format,
            pretty,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn write_line(&self, json: &str) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{json}")?;
        Ok(())
    }
}

impl ResultOutput for JsonOutput {
    fn write(&self, decision: &CurationDecision) -> Result<()> {
        match self.format {
            OutputFormat::Jsonl => self.write_line(&serde_json::to_string(decision)?),
            OutputFormat::Json => {
                self.pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(decision.clone());
                Ok(())
            }
        }
    }

    fn flush(&self) -> Result<()> {
        if matches!(self.format, OutputFormat::Json) {
            let decisions =
                std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
            let json = if self.pretty {
                serde_json::to_string_pretty(&decisions)?
            } else {
                serde_json::to_string(&decisions)?
            };
            self.write_line(&json)?;
        }
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use photo_curator_core::CurationError;

    use super::*;

    /// Shared buffer so the test can read what the output wrote.
    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn decisions() -> Vec<CurationDecision> {
        vec![
            CurationDecision::kept("/p/a.jpg", true),
            CurationDecision::failed("/p/b.jpg", CurationError::Decode("bad header".into())),
        ]
    }

    #[test]
    fn test_jsonl_writes_one_line_per_decision() {
        let buf = Buffer::default();
        let output = JsonOutput::new(Box::new(buf.clone()), OutputFormat::Jsonl, false);
        for d in &decisions() {
            output.write(d).unwrap();
        }
        output.flush().unwrap();

        let text = buf.text();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["outcome"], "kept");
        assert_eq!(first["has_person"], true);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["outcome"], "failed");
        assert_eq!(second["error"]["kind"], "decode");
    }

    #[test]
    fn test_json_buffers_until_flush() {
        let buf = Buffer::default();
        let output = JsonOutput::new(Box::new(buf.clone()), OutputFormat::Json, true);
        for d in &decisions() {
            output.write(d).unwrap();
        }
        assert!(buf.text().is_empty());

        output.flush().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&buf.text()).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert!(buf.text().contains("\n  "));
    }

    #[test]
    fn test_json_empty_run_is_empty_array() {
        let buf = Buffer::default();
        let output = JsonOutput::new(Box::new(buf.clone()), OutputFormat::Json, false);
        output.flush().unwrap();
        assert_eq!(buf.text().trim(), "[]");
    }
}
