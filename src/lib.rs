pub mod arguments;
pub mod config;
pub mod constants;
pub mod database;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod logger;
pub mod notifications;
pub mod paths;
pub mod relay;
pub mod rpc;
pub mod scheduler;
pub mod sessions;
pub mod wallets;
