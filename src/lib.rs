pub mod api;
pub mod clock;
pub mod config;
pub mod fraud;
pub mod models;
pub mod network;
pub mod service;
pub mod session;
pub mod storage;
