//! `check`: load every input file and report problems.

use std::path::Path;

use super::output;
use crate::domain::{Bundle, GiftPlan, MarkerParser};
use crate::error::Result;
use crate::infrastructure::catalog::load_catalog;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::templates::Templates;

/// Returns the number of problems found.
pub fn execute(config_path: &Path) -> Result<usize> {
    let config = Config::load(config_path)?;
    MarkerParser::new(&config.orders.marker_key)?;

    output::section("Configuration");
    output::field("Config", config_path.display());
    output::field("Sessions", format!("{:?}", config.sessions.sessions));
    output::field("Primary", &config.sessions.primary);
    output::field("Categories", format!("{:?}", config.orders.category_ids));
    output::field("Marker", &config.orders.marker_key);
    output::success("Configuration is valid");

    let mut problems = 0;
    if config.sessions.sessions.is_empty() {
        output::warning("No sessions configured");
        problems += 1;
    }

    output::section("Catalog");
    let catalog = load_catalog(&config.data)?;
    output::field("Gifts", catalog.gifts().count());
    output::field("Bundles", catalog.bundles().count());
    for (code, bundle) in catalog.bundles() {
        if let Err(err) = catalog.resolve(code) {
            output::warning(&format!("Bundle {code}: {err}"));
            problems += 1;
            continue;
        }
        if let Bundle::Choice { options, .. } = bundle {
            for option in options.iter().filter(|o| catalog.gift(o).is_none()) {
                output::warning(&format!("Bundle {code}: option {option} is not a gift"));
                problems += 1;
            }
        }
    }
    if let Some(code) = catalog
        .gifts()
        .find(|(_, gift)| gift.price == 0)
        .map(|(code, _)| code)
    {
        output::warning(&format!("Gift {code} has no price"));
        problems += 1;
    }

    output::section("Messages");
    let templates = Templates::load(&config.data.messages)?;
    let overridden = templates.keys().iter().filter(|(_, o)| *o).count();
    output::field("Overrides", overridden);
    for key in templates.unknown_overrides() {
        output::warning(&format!("Override '{key}' matches no message"));
        problems += 1;
    }

    if problems == 0 {
        output::success("No problems found");
    } else {
        output::warning(&format!("{problems} problem(s) found"));
    }
    Ok(problems)
}

/// Describe a resolved plan for listings.
pub(crate) fn describe(plan: &GiftPlan) -> String {
    match plan {
        GiftPlan::Fixed(fixed) => fixed
            .items
            .iter()
            .map(|(gift, qty)| format!("{} ×{qty}", gift.title))
            .collect::<Vec<_>>()
            .join(", "),
        GiftPlan::Choice(choice) => choice
            .options
            .iter()
            .map(|option| option.gift.title.clone())
            .collect::<Vec<_>>()
            .join(" | "),
    }
}
