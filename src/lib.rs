pub mod api;
pub mod clients;
pub mod config;
pub mod consumer;
pub mod error;
pub mod models;
pub mod producer;
pub mod worker;
