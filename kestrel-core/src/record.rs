//! Types and traits for recording training metrics.
//!
//! ```rust
//! use kestrel_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("loss", 0.5);
//! record.insert("episode_return", RecordValue::Scalar(21.0));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.5);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
pub use storage::RecordStorage;
