pub mod config;
pub mod logging;

pub mod api;
pub mod clock;
pub mod controller;
pub mod error;
pub mod estimator;
pub mod job;
pub mod record_db;
pub mod sampler;
pub mod store;
