pub mod admin;
pub mod config;
pub mod dates;
pub mod error;
pub mod grade;
pub mod model;
pub mod notify;
pub mod recurrence;
pub mod reminder;
pub mod session;
pub mod storage;
pub mod task_api;
