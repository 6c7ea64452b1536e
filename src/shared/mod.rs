pub mod app;
pub mod handlers;
pub mod service;
pub mod types;
pub mod util;
