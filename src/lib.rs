pub mod adapters;
pub mod cli;
pub mod core;
pub mod handlers;
pub mod ports;
pub mod transport;
