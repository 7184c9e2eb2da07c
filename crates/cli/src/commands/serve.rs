//! `knowdesk serve` — Start the HTTP gateway and chat frontend.

use knowdesk_config::{AppConfig, AwsCredentials};

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let credentials = AwsCredentials::load()
        .map_err(|e| format!("{e}. Run `knowdesk onboard` and fill in secrets.toml"))?;

    println!("📚 Knowdesk Gateway");
    println!("   Listening:      http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Region:         {}", credentials.region_or(&config.aws.region));
    println!("   Knowledge base: {}", config.knowledge_base.knowledge_base_id);

    knowdesk_gateway::start(config, credentials).await?;

    Ok(())
}
