//! `messages`: list template keys.

use std::path::Path;

use super::output;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::templates::Templates;

pub fn execute(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let templates = Templates::load(&config.data.messages)?;

    output::section("Messages");
    for (key, overridden) in templates.keys() {
        output::field(&key, if overridden { "override" } else { "default" });
    }
    Ok(())
}
