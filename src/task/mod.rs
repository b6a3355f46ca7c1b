//! Task records and the registry that owns them.

pub mod record;
pub mod registry;

pub use record::{progress, TaskId, TaskRecord, TaskStatus, UploadInfo};
pub use registry::TaskRegistry;
