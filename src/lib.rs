pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod utils;
