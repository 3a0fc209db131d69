pub mod admin;
pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod orders;
pub mod restaurants;
pub mod seed;
pub mod state;
pub mod storage;
pub mod store;
pub mod users;
