//! `openmanus serve` Start the HTTP API server.

use openmanus_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("OpenManus Gateway");
    println!("  Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("  Model:     {}", config.default_model);
    println!("  Max steps: {}", config.agent.max_steps);

    openmanus_gateway::start(config).await?;

    Ok(())
}
