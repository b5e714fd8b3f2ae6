pub mod chain;
pub mod client;
pub mod config;
pub mod dapps;
pub mod exchange;
pub mod modes;
pub mod token;
