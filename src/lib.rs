pub mod backend;
pub mod config;
pub mod export;
pub mod metrics;
pub mod models;
pub mod repository;
pub mod services;
pub mod shutdown;
pub mod tracing;
pub mod utils;
pub mod web;
