pub mod agent;
pub mod config;
pub mod evaluation;
pub mod gateway;
pub mod server;
pub mod session;
