//! `ragline serve` — Start the HTTP/WebSocket gateway.

use std::path::PathBuf;

pub async fn run(
    config_path: Option<PathBuf>,
    port_override: Option<u16>,
    host_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    println!("Ragline gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Default model: {}", config.defaults.model_id);

    ragline_gateway::serve(config).await?;

    Ok(())
}
