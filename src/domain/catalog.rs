//! Gift catalog and the plans it resolves order codes into.
//!
//! A catalog code names either a single gift, a fixed bundle (a list of
//! gifts with quantities delivered together as one unit) or a choice bundle
//! (a list of gifts the buyer picks one from). Resolution turns the code
//! into a [`GiftPlan`] that stays immutable for the life of the order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::id::GiftId;
use crate::error::CatalogError;

/// A deliverable gift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gift {
    pub id: GiftId,
    pub title: String,
    /// Price in stars.
    pub price: u64,
}

/// One line of a fixed bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleItem {
    pub code: String,
    pub qty: u32,
}

/// Bundle definition as stored next to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bundle {
    Fixed {
        title: String,
        items: Vec<BundleItem>,
    },
    Choice {
        title: String,
        options: Vec<String>,
    },
}

impl Bundle {
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Fixed { title, .. } | Self::Choice { title, .. } => title,
        }
    }
}

/// Gift codes and bundle codes.
///
/// Bundle codes shadow gift codes with the same key.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    gifts: BTreeMap<String, Gift>,
    bundles: BTreeMap<String, Bundle>,
}

impl Catalog {
    pub fn new(gifts: BTreeMap<String, Gift>, bundles: BTreeMap<String, Bundle>) -> Self {
        Self { gifts, bundles }
    }

    #[must_use]
    pub fn gift(&self, code: &str) -> Option<&Gift> {
        self.gifts.get(code)
    }

    pub fn gifts(&self) -> impl Iterator<Item = (&str, &Gift)> {
        self.gifts.iter().map(|(code, gift)| (code.as_str(), gift))
    }

    pub fn bundles(&self) -> impl Iterator<Item = (&str, &Bundle)> {
        self.bundles.iter().map(|(code, bundle)| (code.as_str(), bundle))
    }

    /// Resolve a catalog code into a delivery plan.
    pub fn resolve(&self, code: &str) -> Result<GiftPlan, CatalogError> {
        let code = code.trim();
        match self.bundles.get(code) {
            Some(Bundle::Fixed { title, items }) => {
                let mut lines = Vec::with_capacity(items.len());
                for item in items {
                    let gift = self
                        .gifts
                        .get(&item.code)
                        .ok_or_else(|| CatalogError::UnknownCode(item.code.clone()))?;
                    if gift.price == 0 {
                        return Err(CatalogError::Unpriced(item.code.clone()));
                    }
                    lines.push((gift.clone(), item.qty));
                }
                if lines.iter().all(|(_, qty)| *qty == 0) {
                    return Err(CatalogError::UnknownCode(code.to_string()));
                }
                Ok(GiftPlan::Fixed(FixedPlan {
                    code: code.to_string(),
                    title: title.clone(),
                    items: lines,
                }))
            }
            Some(Bundle::Choice { title, options }) => {
                // Options pointing at missing or unpriced gifts are dropped.
                let options: Vec<ChoiceOption> = options
                    .iter()
                    .filter_map(|option| {
                        self.gifts
                            .get(option)
                            .filter(|gift| gift.price > 0)
                            .map(|gift| ChoiceOption {
                                code: option.clone(),
                                gift: gift.clone(),
                            })
                    })
                    .collect();
                if options.is_empty() {
                    return Err(CatalogError::EmptyChoice(code.to_string()));
                }
                Ok(GiftPlan::Choice(ChoicePlan {
                    code: code.to_string(),
                    title: title.clone(),
                    options,
                }))
            }
            None => {
                let gift = self
                    .gifts
                    .get(code)
                    .ok_or_else(|| CatalogError::UnknownCode(code.to_string()))?;
                if gift.price == 0 {
                    return Err(CatalogError::Unpriced(code.to_string()));
                }
                Ok(GiftPlan::Fixed(FixedPlan {
                    code: code.to_string(),
                    title: gift.title.clone(),
                    items: vec![(gift.clone(), 1)],
                }))
            }
        }
    }
}

/// Resolved delivery plan for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiftPlan {
    Fixed(FixedPlan),
    Choice(ChoicePlan),
}

impl GiftPlan {
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Fixed(plan) => &plan.code,
            Self::Choice(plan) => &plan.code,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Fixed(plan) => &plan.title,
            Self::Choice(plan) => &plan.title,
        }
    }

    /// Stars needed per ordered unit for an advance balance check.
    ///
    /// Choice bundles use the most expensive option since the buyer's pick
    /// is not known yet.
    #[must_use]
    pub fn precheck_price(&self) -> u64 {
        match self {
            Self::Fixed(plan) => plan.unit_price(),
            Self::Choice(plan) => plan.worst_case_price(),
        }
    }

    #[must_use]
    pub const fn is_choice(&self) -> bool {
        matches!(self, Self::Choice(_))
    }
}

/// A single gift or a fixed bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPlan {
    pub code: String,
    pub title: String,
    pub items: Vec<(Gift, u32)>,
}

impl FixedPlan {
    #[must_use]
    pub fn unit_price(&self) -> u64 {
        self.items
            .iter()
            .map(|(gift, qty)| gift.price * u64::from(*qty))
            .sum()
    }

    /// Flat list of gifts sent for one ordered unit, in bundle order.
    #[must_use]
    pub fn expand(&self) -> Vec<&Gift> {
        self.items
            .iter()
            .flat_map(|(gift, qty)| std::iter::repeat(gift).take(*qty as usize))
            .collect()
    }
}

/// A choice bundle awaiting the buyer's pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoicePlan {
    pub code: String,
    pub title: String,
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub code: String,
    pub gift: Gift,
}

impl ChoicePlan {
    #[must_use]
    pub fn worst_case_price(&self) -> u64 {
        self.options
            .iter()
            .map(|option| option.gift.price)
            .max()
            .unwrap_or(0)
    }

    /// Option by 1-based menu number.
    #[must_use]
    pub fn pick(&self, number: usize) -> Option<&ChoiceOption> {
        number.checked_sub(1).and_then(|idx| self.options.get(idx))
    }

    /// Numbered menu lines: `1) Title - 15⭐`.
    #[must_use]
    pub fn menu(&self) -> String {
        self.options
            .iter()
            .enumerate()
            .map(|(idx, option)| {
                format!("{}) {} - {}⭐", idx + 1, option.gift.title, option.gift.price)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gift(id: u64, title: &str, price: u64) -> Gift {
        Gift {
            id: GiftId::new(id),
            title: title.to_string(),
            price,
        }
    }

    fn catalog() -> Catalog {
        let mut gifts = BTreeMap::new();
        gifts.insert("1".to_string(), gift(101, "Heart", 15));
        gifts.insert("2".to_string(), gift(102, "Bear", 15));
        gifts.insert("5".to_string(), gift(105, "Cake", 50));
        gifts.insert("9".to_string(), gift(109, "Ring", 100));
        gifts.insert("0".to_string(), gift(100, "Broken", 0));

        let mut bundles = BTreeMap::new();
        bundles.insert(
            "20".to_string(),
            Bundle::Fixed {
                title: "Sweet pair".to_string(),
                items: vec![
                    BundleItem {
                        code: "1".to_string(),
                        qty: 2,
                    },
                    BundleItem {
                        code: "5".to_string(),
                        qty: 1,
                    },
                ],
            },
        );
        bundles.insert(
            "21".to_string(),
            Bundle::Choice {
                title: "Pick one".to_string(),
                options: vec!["1".to_string(), "9".to_string(), "404".to_string()],
            },
        );
        bundles.insert(
            "22".to_string(),
            Bundle::Choice {
                title: "Nothing".to_string(),
                options: vec!["404".to_string()],
            },
        );
        Catalog::new(gifts, bundles)
    }

    #[test]
    fn test_resolve_single_gift() {
        let plan = catalog().resolve("1").unwrap();
        let GiftPlan::Fixed(fixed) = &plan else {
            panic!("expected fixed plan");
        };
        let ids: Vec<GiftId> = fixed.expand().iter().map(|gift| gift.id).collect();
        assert_eq!(ids, vec![GiftId::new(101)]);
        assert_eq!(plan.precheck_price(), 15);
        assert_eq!(plan.title(), "Heart");
    }

    #[test]
    fn test_fixed_bundle_expansion_is_deterministic() {
        let catalog = catalog();
        let first = match catalog.resolve("20").unwrap() {
            GiftPlan::Fixed(plan) => plan.expand().iter().map(|gift| gift.id).collect::<Vec<_>>(),
            GiftPlan::Choice(_) => panic!("expected fixed plan"),
        };
        let second = match catalog.resolve("20").unwrap() {
            GiftPlan::Fixed(plan) => plan.expand().iter().map(|gift| gift.id).collect::<Vec<_>>(),
            GiftPlan::Choice(_) => panic!("expected fixed plan"),
        };
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![GiftId::new(101), GiftId::new(101), GiftId::new(105)]
        );
    }

    #[test]
    fn test_fixed_bundle_price_sums_items() {
        let plan = catalog().resolve("20").unwrap();
        assert_eq!(plan.precheck_price(), 15 * 2 + 50);
    }

    #[test]
    fn test_choice_bundle_uses_worst_case_price() {
        let plan = catalog().resolve("21").unwrap();
        assert!(plan.is_choice());
        assert_eq!(plan.precheck_price(), 100);
        let GiftPlan::Choice(choice) = plan else {
            panic!("expected choice plan");
        };
        assert_eq!(choice.options.len(), 2);
        assert_eq!(choice.pick(2).map(|o| o.code.as_str()), Some("9"));
        assert!(choice.pick(0).is_none());
        assert!(choice.pick(3).is_none());
        assert_eq!(choice.menu(), "1) Heart - 15⭐\n2) Ring - 100⭐");
    }

    #[test]
    fn test_resolve_errors() {
        let catalog = catalog();
        assert_eq!(
            catalog.resolve("77"),
            Err(CatalogError::UnknownCode("77".to_string()))
        );
        assert_eq!(
            catalog.resolve("22"),
            Err(CatalogError::EmptyChoice("22".to_string()))
        );
        assert_eq!(
            catalog.resolve("0"),
            Err(CatalogError::Unpriced("0".to_string()))
        );
    }
}
