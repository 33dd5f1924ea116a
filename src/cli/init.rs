use super::phrase::{display_generated_phrase, save_phrase_to_file};
use sogs_bot::config::{default_config_path, default_phrase_path, BotConfig};
use sogs_bot::crypto::keys::generate_recovery_phrase;
use std::path::PathBuf;

/// Write a default config and, if none exists yet, a fresh recovery phrase
/// next to it.
pub fn execute(config_path: Option<String>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(format!(
            "Config file '{}' already exists (use --force to overwrite)",
            config_path.display()
        )
        .into());
    }

    BotConfig::create_default(&config_path)?;
    println!("📝 Created config: {}", config_path.display());

    let phrase_path = default_phrase_path(&config_path);
    if phrase_path.exists() {
        println!("🔑 Keeping existing recovery phrase: {}", phrase_path.display());
    } else {
        let (phrase, keys) = generate_recovery_phrase()?;
        save_phrase_to_file(&phrase, &phrase_path)?;
        display_generated_phrase(&phrase, &keys.account_id(), Some(&phrase_path));
    }

    println!();
    println!("Next steps:");
    println!("  1. Set [server] url, public_key and room in the config");
    println!("  2. Edit the [[responses]] tables");
    println!("  3. sogs-bot run --config {}", config_path.display());

    Ok(())
}
