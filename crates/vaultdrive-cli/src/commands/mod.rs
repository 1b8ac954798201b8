pub mod auth;
pub mod completions;
pub mod config;
pub mod remote;
pub mod sync;
