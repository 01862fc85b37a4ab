//! CLI Status Command
//!
//! Queries `/api/health` of a running instance.

use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

pub async fn run(port: u16) -> Result<()> {
    println!("\n📊 VisionProxy Status\n");

    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;
    match client.get(format!("http://127.0.0.1:{port}/api/health")).send().await {
        Ok(resp) => {
            let body: Value = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Err(_) => {
            println!("VisionProxy is not running on port {port}");
        }
    }
    Ok(())
}
