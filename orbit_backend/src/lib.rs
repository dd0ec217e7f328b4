pub mod accounts;
pub mod alerts;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod database;
pub mod friends;
pub mod geo;
pub mod location;
pub mod nearby;
pub mod seed;
pub mod telemetry;
pub mod utils;
pub mod visibility;
