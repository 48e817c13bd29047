#[macro_use]
extern crate lazy_static;

pub mod client;
pub mod config;
pub mod cookies;
pub mod epub;
pub mod error;
pub mod fetcher;
pub mod layout;
pub mod models;
pub mod templates;
pub mod urls;
