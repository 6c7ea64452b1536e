pub mod app;
pub mod approval;
pub mod handlers;
pub mod service;
pub mod types;
pub mod util;
