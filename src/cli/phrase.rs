//! Recovery phrase input and output
//!
//! The phrase is the bot's only long-term secret. It is read from, in order:
//! 1. `--phrase-file`
//! 2. `[identity] recovery_phrase_file`, if that file exists
//! 3. the `SOGS_BOT_MNEMONIC` environment variable (warned as insecure)
//! 4. an interactive masked prompt

use sogs_bot::config::BotConfig;
use sogs_bot::crypto::KeyMaterial;
use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Environment variable holding the recovery phrase
pub const PHRASE_ENV: &str = "SOGS_BOT_MNEMONIC";

/// Where the recovery phrase comes from
#[derive(Debug, PartialEq, Eq)]
pub enum PhraseSource {
    /// From a file (flag or config)
    File(PathBuf),
    /// From stdin prompt (interactive, masked input)
    Stdin,
    /// From SOGS_BOT_MNEMONIC env var
    EnvVar,
}

/// Pick a phrase source from the flag, the config and the environment
pub fn determine_phrase_source(flag: Option<String>, config: Option<&BotConfig>) -> PhraseSource {
    let configured = config.and_then(|c| c.identity.recovery_phrase_file.as_deref());
    choose_source(flag, configured, std::env::var_os(PHRASE_ENV).is_some())
}

fn choose_source(flag: Option<String>, configured: Option<&Path>, env_set: bool) -> PhraseSource {
    if let Some(file) = flag {
        PhraseSource::File(PathBuf::from(file))
    } else if let Some(path) = configured.filter(|p| p.exists()) {
        PhraseSource::File(path.to_path_buf())
    } else if env_set {
        PhraseSource::EnvVar
    } else {
        PhraseSource::Stdin
    }
}

/// Read the recovery phrase from `source`
pub fn read_phrase(source: PhraseSource) -> Result<Zeroizing<String>, Box<dyn std::error::Error>> {
    let phrase = match source {
        PhraseSource::File(path) => {
            if !path.exists() {
                return Err(format!("Recovery phrase file not found: {}", path.display()).into());
            }
            let contents = Zeroizing::new(fs::read_to_string(&path).map_err(|e| {
                format!("Failed to read recovery phrase file '{}': {}", path.display(), e)
            })?);
            Zeroizing::new(contents.trim().to_string())
        }
        PhraseSource::Stdin => Zeroizing::new(
            rpassword::prompt_password("Enter recovery phrase: ")
                .map_err(|e| format!("Failed to read recovery phrase from stdin: {}", e))?,
        ),
        PhraseSource::EnvVar => {
            eprintln!("⚠️  WARNING: Using {} env var is insecure", PHRASE_ENV);
            eprintln!("   Consider using --phrase-file instead");
            eprintln!();

            Zeroizing::new(
                std::env::var(PHRASE_ENV).map_err(|_| format!("{} env var not set", PHRASE_ENV))?,
            )
        }
    };

    if phrase.trim().is_empty() {
        return Err("Recovery phrase is empty".into());
    }
    Ok(phrase)
}

/// Resolve the phrase source and derive the bot's keys
pub fn load_key_material(
    flag: Option<String>,
    config: Option<&BotConfig>,
) -> Result<KeyMaterial, Box<dyn std::error::Error>> {
    let phrase = read_phrase(determine_phrase_source(flag, config))?;
    Ok(KeyMaterial::from_recovery_phrase(&phrase)?)
}

/// Save the phrase to a file readable only by the owner (0600)
pub fn save_phrase_to_file(phrase: &str, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory '{}': {}", parent.display(), e))?;
    }

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| format!("Failed to create '{}': {}", path.display(), e))?;

    writeln!(file, "{}", phrase)
        .map_err(|e| format!("Failed to write recovery phrase to '{}': {}", path.display(), e))?;

    Ok(())
}

/// Show a freshly generated phrase on stderr
pub fn display_generated_phrase(phrase: &str, account_id: &str, saved_path: Option<&Path>) {
    const BOLD: &str = "\x1b[1m";
    const RESET: &str = "\x1b[0m";
    const BOX_WIDTH: usize = 79;

    eprintln!();
    eprintln!("{}", "═".repeat(BOX_WIDTH));
    eprintln!("🔑 {BOLD}Recovery phrase (SAVE THIS SECURELY){RESET}");
    eprintln!("{}", "═".repeat(BOX_WIDTH));
    eprintln!();
    eprintln!("  {BOLD}{phrase}{RESET}");
    eprintln!();
    eprintln!("  Account ID: {}", account_id);
    eprintln!();
    eprintln!("{}", "─".repeat(BOX_WIDTH));

    if let Some(path) = saved_path {
        eprintln!("📁 SAVED TO: {BOLD}{}{RESET} (mode 0600)", path.display());
        eprintln!("  • Back this file up; the bot's identity cannot be recovered without it");
    } else {
        eprintln!("⚠️  This phrase is shown ONCE - write it down now");
    }
    eprintln!("  • Anyone holding the phrase can post as this bot");
    eprintln!("{}", "═".repeat(BOX_WIDTH));
    eprintln!();

    let _ = io::stderr().flush();
}
