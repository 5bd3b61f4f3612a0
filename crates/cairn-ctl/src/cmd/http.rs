//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/api", port)
}

pub fn rpc_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/rpc", port)
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    let resp = reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to cairnd at {} (is it running?)", url))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{}: {}", status, body);
    }
    resp.json::<T>().await.context("failed to parse response")
}

pub async fn post_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::Client::new()
        .post(url)
        .send()
        .await
        .with_context(|| format!("failed to connect to cairnd at {} (is it running?)", url))?
        .json::<T>()
        .await
        .context("failed to parse response")
}

pub async fn post_json_body<T, R>(url: &str, body: &T) -> Result<R>
where
    T: Serialize,
    R: for<'de> Deserialize<'de>,
{
    reqwest::Client::new()
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("failed to connect to cairnd at {} (is it running?)", url))?
        .json::<R>()
        .await
        .context("failed to parse response")
}
