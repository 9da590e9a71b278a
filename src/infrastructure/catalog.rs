//! Gift catalog and bundle files.
//!
//! `gifts.json` maps catalog codes to gifts; when it is missing the
//! built-in catalog is used. `gift_sets.json` holds bundles keyed by code:
//!
//! ```json
//! {
//!   "101": { "mode": "fixed", "title": "Duo", "items": [{ "gift_key": "1", "qty": 2 }] },
//!   "201": { "mode": "choice", "title": "Pick one", "options": ["1", { "gift_key": "5" }] }
//! }
//! ```
//!
//! A bundle without `mode` is fixed. A missing bundle file means no bundles.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::{Bundle, BundleItem, Catalog, Gift, GiftId};
use crate::error::StoreError;
use crate::infrastructure::config::settings::DataConfig;

const DEFAULT_GIFTS: &[(&str, u64, &str, u64)] = &[
    ("1", 5_170_145_012_310_081_615, "❤️ Heart", 15),
    ("2", 5_170_233_102_089_322_756, "🐻 Bear", 15),
    ("3", 5_170_250_947_678_437_525, "🎁 Gift", 25),
    ("4", 5_168_103_777_563_050_263, "🌹 Rose", 25),
    ("5", 5_170_144_170_496_491_616, "🎂 Cake", 50),
    ("6", 5_170_314_324_215_857_265, "💐 Bouquet", 50),
    ("7", 5_170_564_780_938_756_245, "🚀 Rocket", 50),
    ("8", 5_168_043_875_654_172_773, "🏆 Trophy", 100),
    ("9", 5_170_690_322_832_818_290, "💍 Ring", 100),
    ("10", 5_170_521_118_301_225_164, "💎 Diamond", 100),
    ("11", 6_028_601_630_662_853_006, "🍾 Champagne", 50),
    ("12", 5_922_558_454_332_916_696, "🎄 Christmas Tree", 50),
    ("13", 5_956_217_000_635_139_069, "🐻 New Year Bear", 50),
];

/// Built-in catalog used when no gift file exists.
#[must_use]
pub fn default_gifts() -> BTreeMap<String, Gift> {
    DEFAULT_GIFTS
        .iter()
        .map(|&(code, id, title, price)| {
            (
                code.to_string(),
                Gift {
                    id: GiftId::new(id),
                    title: title.to_string(),
                    price,
                },
            )
        })
        .collect()
}

/// A catalog code written either as a string or a bare number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodeRef {
    Text(String),
    Number(u64),
}

impl CodeRef {
    fn into_code(self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawItem {
    gift_key: CodeRef,
    #[serde(default = "default_qty")]
    qty: u32,
}

const fn default_qty() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOption {
    Code(CodeRef),
    Keyed { gift_key: CodeRef },
}

#[derive(Debug, Deserialize)]
struct RawBundle {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    items: Vec<RawItem>,
    #[serde(default)]
    options: Vec<RawOption>,
}

impl RawBundle {
    fn into_bundle(self, code: &str) -> Bundle {
        let title = self
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| format!("Set {code}"));
        let is_choice = self
            .mode
            .as_deref()
            .is_some_and(|mode| mode.trim().eq_ignore_ascii_case("choice"));
        if is_choice {
            let options = self
                .options
                .into_iter()
                .map(|option| match option {
                    RawOption::Code(code) | RawOption::Keyed { gift_key: code } => code.into_code(),
                })
                .filter(|code| !code.is_empty())
                .collect();
            Bundle::Choice { title, options }
        } else {
            let items = self
                .items
                .into_iter()
                .map(|item| BundleItem {
                    code: item.gift_key.into_code(),
                    qty: item.qty,
                })
                .collect();
            Bundle::Fixed { title, items }
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parse gift file content.
pub fn parse_gifts(content: &str, path: &Path) -> Result<BTreeMap<String, Gift>, StoreError> {
    let gifts: BTreeMap<String, Gift> =
        serde_json::from_str(content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(gifts
        .into_iter()
        .map(|(code, gift)| (code.trim().to_string(), gift))
        .collect())
}

/// Parse bundle file content.
pub fn parse_bundles(content: &str, path: &Path) -> Result<BTreeMap<String, Bundle>, StoreError> {
    let raw: BTreeMap<String, RawBundle> =
        serde_json::from_str(content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(raw
        .into_iter()
        .map(|(code, bundle)| {
            let code = code.trim().to_string();
            let bundle = bundle.into_bundle(&code);
            (code, bundle)
        })
        .collect())
}

/// Load gifts, falling back to the built-in catalog when the file is absent.
pub fn load_gifts(path: &Path) -> Result<BTreeMap<String, Gift>, StoreError> {
    match read_optional(path)? {
        Some(content) => parse_gifts(&content, path),
        None => {
            debug!(path = %path.display(), "Gift file not found, using built-in catalog");
            Ok(default_gifts())
        }
    }
}

/// Load bundles; an absent file means no bundles.
pub fn load_bundles(path: &Path) -> Result<BTreeMap<String, Bundle>, StoreError> {
    match read_optional(path)? {
        Some(content) => parse_bundles(&content, path),
        None => Ok(BTreeMap::new()),
    }
}

/// Load the full catalog from the configured data files.
pub fn load_catalog(data: &DataConfig) -> Result<Catalog, StoreError> {
    let gifts = load_gifts(&data.gifts)?;
    let bundles = load_bundles(&data.gift_sets)?;
    info!(gifts = gifts.len(), bundles = bundles.len(), "Catalog loaded");
    Ok(Catalog::new(gifts, bundles))
}
