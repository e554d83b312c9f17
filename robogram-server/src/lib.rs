// Library exports for robogram-server
// The admin CLI and the integration tests drive the same modules the server uses

pub mod api;
pub mod assets;
pub mod config;
pub mod counters;
pub mod db;
pub mod generation;
pub mod rate_limit;
pub mod scheduler;
pub mod state;
pub mod webhook;
