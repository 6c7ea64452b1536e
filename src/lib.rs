pub mod app;
pub mod auth;
pub mod resource;
pub mod shared;
