//! Business logic shared by handlers, jobs and binaries

pub mod bulk_email;
pub mod import;
pub mod jobs;
pub mod profiles;
pub mod regeocode;
