pub mod config;
pub mod error;
pub mod exchange;
pub mod listener;
pub mod ping_pong;
