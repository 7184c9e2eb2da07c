//! `knowdesk config` — Configuration management commands.

use knowdesk_config::AppConfig;
use knowdesk_core::Topic;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if config.classifier.max_tokens < 4 {
                warnings.push("Classifier max_tokens below 4 may cut off \"does_not_match\"");
            }

            if config.gateway.host == "0.0.0.0" {
                warnings.push("Gateway bound to 0.0.0.0 is reachable from other machines");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Region:          {}", config.aws.region);
            println!("   Classifier:      {}", config.classifier.model_id);
            println!("   Knowledge base:  {}", config.knowledge_base.knowledge_base_id);
            println!(
                "   Gateway:         {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!(
                "   Topics:          {}",
                Topic::ALL.map(Topic::display_name).join(", ")
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}
