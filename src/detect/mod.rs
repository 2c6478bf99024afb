mod adapter;
mod backend;
pub mod backends;
mod nms;
mod registry;
mod result;

pub use adapter::DetectionAdapter;
pub use backend::{DetectParams, DetectorBackend};
pub use backends::ScriptedBackend;
pub use nms::non_max_suppression;
pub use registry::{BackendRegistry, SharedBackend};
pub use result::{DetectedObject, Label, LabelCounts};

#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
