// Library exports for tally-server
// Integration tests and the binary both build on these modules

pub mod api;
pub mod config;
pub mod db;
pub mod engagement;
pub mod state;
