pub mod config;
pub mod core;
pub mod exchange;
pub mod grading;
pub mod marksheet;
pub mod results;
