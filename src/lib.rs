pub mod clean;
pub mod config;
pub mod duck;
pub mod error;
pub mod fetch;
