use super::phrase::{display_generated_phrase, save_phrase_to_file};
use sogs_bot::crypto::keys::generate_recovery_phrase;
use std::path::Path;

/// Generate a new 13-word recovery phrase, optionally saving it to `output`.
pub fn execute(output: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let (phrase, keys) = generate_recovery_phrase()?;

    match output.as_deref().map(Path::new) {
        Some(path) => {
            if path.exists() {
                return Err(format!("Refusing to overwrite '{}'", path.display()).into());
            }
            save_phrase_to_file(&phrase, path)?;
            display_generated_phrase(&phrase, &keys.account_id(), Some(path));
        }
        None => display_generated_phrase(&phrase, &keys.account_id(), None),
    }

    Ok(())
}
