//! Record storage with aggregation.
use super::{Record, RecordValue};
use std::collections::HashMap;

/// Accumulates records and reduces them to one.
///
/// Scalars are averaged; for any other value the most recent one is kept.
#[derive(Default)]
pub struct RecordStorage {
    data: Vec<Record>,
}

impl RecordStorage {
    /// Constructs an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record.
    pub fn store(&mut self, record: Record) {
        self.data.push(record);
    }

    /// Aggregates the stored records and empties the storage.
    pub fn aggregate(&mut self) -> Record {
        let mut sums: HashMap<String, (f32, usize)> = HashMap::new();
        let mut record = Record::empty();

        for r in self.data.drain(..) {
            for (k, v) in r.into_iter_in_record() {
                match v {
                    RecordValue::Scalar(v) => {
                        let e = sums.entry(k).or_insert((0.0, 0));
                        e.0 += v;
                        e.1 += 1;
                    }
                    v => record.insert(k, v),
                }
            }
        }

        for (k, (sum, n)) in sums {
            record.insert(k, RecordValue::Scalar(sum / n as f32));
        }

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_are_averaged() {
        let mut storage = RecordStorage::new();
        storage.store(Record::from_scalar("loss", 1.0));
        storage.store(Record::from_scalar("loss", 3.0));
        storage.store(Record::from_slice(&[(
            "phase",
            RecordValue::String("train".into()),
        )]));

        let r = storage.aggregate();
        assert_eq!(r.get_scalar("loss").unwrap(), 2.0);
        assert_eq!(r.get_string("phase").unwrap(), "train");
        assert!(storage.aggregate().is_empty());
    }
}
