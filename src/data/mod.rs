//! Data ingestion: typed records, CSV loading and profiling

mod dataset;
mod loader;
mod profile;
mod record;

pub use dataset::Dataset;
pub use loader::{DataLoader, NULL_MARKER, REQUIRED_COLUMNS};
pub(crate) use loader::{numeric_column, string_column};
pub use profile::{ColumnProfile, DatasetProfile};
pub use record::{
    Gender, PatientRecord, RecordFlags, ResidenceType, SmokingStatus, WorkType,
};
