//! Reference collector: device key registration with manual approval,
//! status checks and day-bucketed photo storage.

mod admin;
mod handlers;
mod registry;
mod server;
mod storage;

pub use admin::AdminClient;
pub use handlers::ADMIN_KEY_HEADER;
pub use registry::{DeviceRecord, DeviceRegistry, DeviceStatus, DeviceSummary, Registration};
pub use server::{router, CollectorServer, CollectorState};
pub use storage::{sanitize_file_name, StoreError, UploadStorage};
