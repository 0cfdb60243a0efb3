/// File upload and download pipeline
///
/// The coordinator drives each file section through validation and the
/// pending/upload/available saga; the gate decides whether stored bytes may
/// be served back.

pub mod coordinator;
pub mod gate;
pub mod models;

pub use coordinator::UploadCoordinator;
pub use gate::DownloadGate;
pub use models::*;
