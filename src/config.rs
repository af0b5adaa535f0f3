use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub page_size: u64,
    pub api_tokens: Vec<String>,
    pub admin_token: Option<String>,
    pub site_title: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "8000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://reelhouse.db?mode=rwc".to_string());

        let page_size: u64 = std::env::var("PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(2);

        let api_tokens = std::env::var("API_TOKENS").map(|s| split_tokens(&s)).unwrap_or_default();

        let admin_token =
            std::env::var("ADMIN_TOKEN").ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let site_title = std::env::var("SITE_TITLE").unwrap_or_else(|_| "Reelhouse".to_string());

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            page_size,
            api_tokens,
            admin_token,
            site_title,
        })
    }
}

fn split_tokens(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect()
}
