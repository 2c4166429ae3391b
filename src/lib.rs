pub mod board;
pub mod client;
pub mod config;
pub mod session;
pub mod ws;
