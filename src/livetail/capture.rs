//! Capture: a short-lived writer attached to a Source's Live Tail Hub,
//! rolling records to a file under a sandbox directory.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::buffer::RawRecord;
use crate::model::{CaptureFormat, CaptureInfo};

pub struct CaptureWriter {
    info: CaptureInfo,
    file: Mutex<File>,
}

impl CaptureWriter {
    /// Begins a writer under `sandbox_dir`. The path is always confined to
    /// that directory: the capture id (a UUID) is the only user-influenced
    /// path component, which rules out traversal.
    pub fn start(
        sandbox_dir: &Path,
        source_id: &str,
        format: CaptureFormat,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(sandbox_dir)?;
        let id = Uuid::new_v4().to_string();
        let ext = match format {
            CaptureFormat::Line => "log",
            CaptureFormat::JsonLines => "jsonl",
        };
        let path: PathBuf = sandbox_dir.join(format!("{source_id}-{id}.{ext}"));
        let file = File::create(&path)?;

        Ok(Self {
            info: CaptureInfo {
                id,
                source_id: source_id.to_string(),
                path: path.display().to_string(),
                format,
                started_at: chrono::Utc::now(),
            },
            file: Mutex::new(file),
        })
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn info(&self) -> &CaptureInfo {
        &self.info
    }

    pub fn write(&self, record: &RawRecord) {
        let mut file = self.file.lock();
        let line = match self.info.format {
            CaptureFormat::Line => format!("{}\n", record.raw),
            CaptureFormat::JsonLines => {
                serde_json::to_string(&serde_json::json!({
                    "raw": record.raw,
                    "received_at_unix_nanos": record.received_at_unix_nanos,
                }))
                .map(|s| format!("{s}\n"))
                .unwrap_or_default()
            }
        };
        let _ = file.write_all(line.as_bytes());
    }

    pub fn flush(&self) {
        let _ = self.file.lock().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_line_format_records() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CaptureWriter::start(dir.path(), "s1", CaptureFormat::Line).unwrap();
        writer.write(&RawRecord::new("hello"));
        writer.flush();
        let contents = std::fs::read_to_string(&writer.info().path).unwrap();
        assert_eq!(contents, "hello\n");
    }

    #[test]
    fn writes_json_lines_format_records() {
        let dir = tempfile::tempdir().unwrap();
        let writer = CaptureWriter::start(dir.path(), "s1", CaptureFormat::JsonLines).unwrap();
        writer.write(&RawRecord::new("hello"));
        writer.flush();
        let contents = std::fs::read_to_string(&writer.info().path).unwrap();
        assert!(contents.contains("\"raw\":\"hello\""));
    }
}
