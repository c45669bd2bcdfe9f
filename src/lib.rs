pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod eutils;
pub mod fetcher;
pub mod output;
pub mod rate_gate;
pub mod session;
pub mod sink;
