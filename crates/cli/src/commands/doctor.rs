//! `knowdesk doctor` — Diagnose configuration and credentials.

use knowdesk_config::{AppConfig, AwsCredentials};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Knowdesk Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    // Config
    let config_path = AppConfig::config_path();
    if !config_path.exists() {
        println!("  ⚠️  No config file — using defaults (run `knowdesk onboard` to create one)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            Some(config)
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            issues += 1;
            None
        }
    };

    // Credentials
    match AwsCredentials::load() {
        Ok(credentials) => {
            println!("  ✅ AWS credentials found");
            if credentials.session_token.is_some() {
                println!("  ✅ Using temporary (STS) credentials");
            }
            if let Some(config) = &config {
                println!(
                    "  ✅ Region: {}",
                    credentials.region_or(&config.aws.region)
                );
            }
        }
        Err(e) => {
            println!("  ❌ {e}");
            println!("     Add them to {} or set the environment variables", AppConfig::secrets_path().display());
            issues += 1;
        }
    }

    if let Some(config) = &config {
        println!();
        println!("  Classifier model: {}", config.classifier.model_id);
        println!("  Knowledge base:   {}", config.knowledge_base.knowledge_base_id);
        println!("  Answer model:     {}", config.knowledge_base.model_arn);
        println!("  Gateway:          {}:{}", config.gateway.host, config.gateway.port);
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
