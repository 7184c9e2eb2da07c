//! `knowdesk onboard` — First-time setup.

use std::path::Path;

use knowdesk_config::{AppConfig, AwsCredentials};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();
    let secrets_path = AppConfig::secrets_path();

    println!("📚 Knowdesk — First-Time Setup");
    println!("==============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    if secrets_path.exists() {
        println!("  Secrets file exists: {}", secrets_path.display());
    } else {
        write_secret_file(&secrets_path, &AwsCredentials::template_toml())?;
        println!("✅ Created secrets.toml at: {}", secrets_path.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Add your AWS keys to {}", secrets_path.display());
    println!("   2. Run: knowdesk doctor");
    println!("   3. Run: knowdesk serve  (or `knowdesk ask`)\n");

    Ok(())
}

/// Write a file readable only by the current user where the OS supports it.
fn write_secret_file(path: &Path, contents: &str) -> std::io::Result<()> {
    std::fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
