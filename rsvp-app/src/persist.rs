use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rsvp_experiment::{ExperimentError, RecordSink, RunRecord};
use tracing::info;

/// Writes each run record as pretty JSON into one directory.
pub struct JsonSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl JsonSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// `<participant>_s<session>_<start time>.json`
    pub fn file_name(record: &RunRecord) -> String {
        let participant: String = record
            .participant
            .participant_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let participant = if participant.is_empty() { "anonymous".to_string() } else { participant };
        format!(
            "{participant}_s{}_{}.json",
            record.participant.session,
            record.started_at.format("%Y%m%d_%H%M%S")
        )
    }

    fn write(&self, record: &RunRecord) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create {}", self.dir.display()))?;
        let path = self.dir.join(Self::file_name(record));
        write_json(&path, record)?;
        Ok(path)
    }
}

fn write_json(path: &Path, record: &RunRecord) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, record)?;
    writer.flush()?;
    Ok(())
}

impl RecordSink for JsonSink {
    fn persist(&mut self, record: &RunRecord) -> Result<(), ExperimentError> {
        let path = self
            .write(record)
            .map_err(|e| ExperimentError::Persistence(format!("{e:#}")))?;
        info!(path = %path.display(), "run record saved");
        self.written.push(path);
        Ok(())
    }
}
