pub mod auth;
pub mod dashboard;
pub mod db;
pub mod headscale;
pub mod metrics;
pub mod parsers;
pub mod runner;
pub mod systemd;
pub mod tailscale;
pub mod wifi;
