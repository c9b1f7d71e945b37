use super::Record;

/// Writes a record to an output destination.
pub trait Recorder {
    /// Write a record.
    fn write(&mut self, record: Record);
}

/// Stores records and writes aggregated values on [`AggregateRecorder::flush`].
pub trait AggregateRecorder {
    /// Store the record.
    fn store(&mut self, record: Record);

    /// Writes values aggregated from the stored records.
    fn flush(&mut self, step: i64);
}
