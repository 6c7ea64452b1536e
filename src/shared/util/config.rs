//! Loads config from config.toml (or the file named by `CONFIG_FILE`)

use serde_derive::Deserialize;
use cached::proc_macro::cached;
use std::env;
use std::fs;
use std::process::exit;
use toml;
use sqlx::postgres::{PgPoolOptions, PgPool};

#[derive(Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub limits: LimitsConfig
}

#[derive(Deserialize, Clone)]
pub struct DatabaseConfig {
    pub ip: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32
}

#[derive(Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    pub log: bool,
    pub request_quota_replenish_ms: u64,
    pub request_quota: u32,
    /// Keep everything in memory instead of postgres, for local trials
    #[serde(default)]
    pub in_memory: bool
}

#[derive(Deserialize, Clone)]
pub struct AuthConfig {
    pub jwks_url: String,
    pub issuer: String,
    pub audience: Option<String>,
    #[serde(default = "default_key_cache_ttl")]
    pub key_cache_ttl_seconds: u64,
    #[serde(default = "default_algorithms")]
    pub allowed_algorithms: Vec<String>,
    pub webhook_secret: String
}

#[derive(Deserialize, Clone)]
pub struct LimitsConfig {
    pub max_bulk_items: usize,
    pub default_page_size: u32,
    pub max_page_size: u32
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig { max_bulk_items: 100, default_page_size: 20, max_page_size: 100 }
    }
}

fn default_max_connections() -> u32 { 5 }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_key_cache_ttl() -> u64 { 3600 } // Keys are refreshed at most hourly
fn default_algorithms() -> Vec<String> { vec!["RS256".to_string()] }

#[cached(result = true)]
pub async fn get_pool() -> Result<PgPool, sqlx::Error> {
    let config = get_config();
    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(format!("postgres://{}:{}@{}:{}/{}", // user:password / ip/db
            config.database.user,
            config.database.password,
            config.database.ip,
            config.database.port,
            config.database.name
        ).as_str())
        .await
}

pub fn parse_config(contents: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(contents)
}

#[cached]
pub fn get_config() -> Config {
    let path = env::var("CONFIG_FILE").unwrap_or("config.toml".to_string());
    let contents = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => {
            eprintln!("Could not find {path}, please create or ensure it's accessible");
            exit(1);
        }
    };

    match parse_config(&contents) {
        Ok(d) => d,
        Err(err) => {
            eprintln!("Unable to load data from config: {err}");
            exit(1);
        }
    }
}
