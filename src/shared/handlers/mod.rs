pub mod debug_handler;
pub mod postgres_handler;
