//! Database access for the web service
//!
//! Schema creation lives in `alumni_common::db`; this module holds the
//! queries used by handlers, jobs and the backfill binary.

pub mod email_log;
pub mod jobs;
pub mod profiles;
pub mod users;

pub use profiles::{GeocodeScope, ProfileFilter, ProfileSort, SortOrder, Visibility};
