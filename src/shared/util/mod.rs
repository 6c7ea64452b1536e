pub mod clean_html;
pub mod config;
pub mod handler;
