pub mod api;
pub mod client_ip;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod models;
pub mod redirect;
pub mod service;
pub mod storage;
