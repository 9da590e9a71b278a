//! `catalog`: print gift codes and bundles.

use std::path::Path;

use super::{check, output};
use crate::error::Result;
use crate::infrastructure::catalog::load_catalog;
use crate::infrastructure::config::settings::Config;

pub fn execute(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let catalog = load_catalog(&config.data)?;

    output::section("Gifts");
    for (code, gift) in catalog.gifts() {
        output::field(code, format!("{} - {}⭐", gift.title, gift.price));
    }

    output::section("Bundles");
    for (code, bundle) in catalog.bundles() {
        match catalog.resolve(code) {
            Ok(plan) => {
                let kind = if plan.is_choice() { "choice" } else { "fixed" };
                output::field(
                    code,
                    format!(
                        "{} [{kind}] {} - {}⭐",
                        bundle.title(),
                        check::describe(&plan),
                        plan.precheck_price()
                    ),
                );
            }
            Err(err) => output::warning(&format!("{code}: {err}")),
        }
    }
    Ok(())
}
