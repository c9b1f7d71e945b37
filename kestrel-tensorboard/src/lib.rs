//! Write training records as TensorBoard summaries.
use kestrel_core::record::{AggregateRecorder, Record, RecordStorage, RecordValue, Recorder};
use log::warn;
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// Only [`RecordValue::Scalar`] values are written; other values are skipped,
/// or rejected with a panic if the recorder was built with
/// [`TensorboardRecorder::new_with_check_unsupported_value`].
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
    ignore_unsupported_value: bool,
    storage: RecordStorage,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "env_steps".to_string(),
            ignore_unsupported_value: true,
            storage: RecordStorage::new(),
        }
    }

    /// Construct a [`TensorboardRecorder`] with checking unsupported record value.
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new_with_check_unsupported_value<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            ignore_unsupported_value: false,
            ..Self::new(logdir)
        }
    }

    fn write_at(&mut self, record: &Record, step: usize) {
        for (k, v) in record.iter() {
            if *k == self.step_key {
                continue;
            }
            match v {
                RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                _ => {
                    if !self.ignore_unsupported_value {
                        panic!("Unsupported value: {:?}", (k, v));
                    }
                }
            }
        }
        self.writer.flush();
    }
}

impl Recorder for TensorboardRecorder {
    /// Writes the scalars of `record` at the step given by its `"env_steps"` entry.
    fn write(&mut self, record: Record) {
        match record.get_scalar(&self.step_key) {
            Ok(step) => self.write_at(&record, step as usize),
            Err(_) => warn!("Record without {:?} is not written", self.step_key),
        }
    }
}

impl AggregateRecorder for TensorboardRecorder {
    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    /// Writes the mean of the stored scalars at `step`.
    fn flush(&mut self, step: i64) {
        let record = self.storage.aggregate();
        if !record.is_empty() {
            self.write_at(&record, step.max(0) as usize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_flush_writes_event_file() {
        let dir = TempDir::new("tensorboard").unwrap();
        let mut recorder = TensorboardRecorder::new(dir.path());
        recorder.store(Record::from_scalar("loss", 1.0));
        recorder.store(Record::from_scalar("loss", 3.0));
        recorder.flush(10);

        let n_files = std::fs::read_dir(dir.path()).unwrap().count();
        assert!(n_files > 0);
    }

    fn tagged_record() -> Record {
        Record::from_slice(&[
            ("env_steps", RecordValue::Scalar(5.0)),
            ("loss", RecordValue::Scalar(0.5)),
            ("tag", RecordValue::String("dqn".into())),
        ])
    }

    #[test]
    fn test_string_values_are_skipped_by_default() {
        let dir = TempDir::new("tensorboard").unwrap();
        let mut recorder = TensorboardRecorder::new(dir.path());
        recorder.write(tagged_record());
    }

    #[test]
    #[should_panic(expected = "Unsupported value")]
    fn test_string_values_panic_when_checked() {
        let dir = TempDir::new("tensorboard").unwrap();
        let mut recorder = TensorboardRecorder::new_with_check_unsupported_value(dir.path());
        recorder.write(tagged_record());
    }
}
