use super::phrase::load_key_material;
use sogs_bot::config::{default_config_path, BotConfig};
use sogs_bot::crypto::{BlindingContext, KeyMaterial, SigningMode};
use std::path::PathBuf;

/// Identifiers the bot is known by
#[derive(Debug, PartialEq, Eq)]
pub struct Identities {
    pub account_id: String,
    pub unblinded_id: String,
    pub blinded_id: String,
    pub active: String,
}

pub fn identities(keys: &KeyMaterial, config: &BotConfig) -> Result<Identities, Box<dyn std::error::Error>> {
    let blinding = BlindingContext::derive(keys, &config.server_public_key()?)?;
    let active = match config.signing_mode() {
        SigningMode::Unblinded => keys.unblinded_id(),
        SigningMode::Blinded => blinding.blinded_id(),
    };

    Ok(Identities {
        account_id: keys.account_id(),
        unblinded_id: keys.unblinded_id(),
        blinded_id: blinding.blinded_id(),
        active,
    })
}

/// Print the bot's account, unblinded and blinded IDs
pub fn execute(
    config_path: Option<String>,
    phrase_file: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = BotConfig::load(&config_path)?;
    let keys = load_key_material(phrase_file, Some(&config))?;
    let ids = identities(&keys, &config)?;

    println!("Account ID:   {}", ids.account_id);
    println!("Unblinded ID: {}", ids.unblinded_id);
    println!("Blinded ID:   {} ({})", ids.blinded_id, config.server.url);
    println!("Posting as:   {}", ids.active);

    Ok(())
}
