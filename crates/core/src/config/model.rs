//! Shared configuration document and typed views over it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::records::OwnerTag;

const DEFAULT_NAME_1: &str = "Yo";
const DEFAULT_NAME_2: &str = "Ella";

/// Free-form configuration shared by both partners (names, targets,
/// thresholds). No schema is enforced; the accessors fall back to defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedConfig(Map<String, Value>);

impl SharedConfig {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn merge(&mut self, patch: &Map<String, Value>) {
        merge_json(&mut self.0, patch);
    }

    pub fn partner_names(&self) -> PartnerNames {
        let names = self.0.get("nombres");
        let pick = |key: &str, default: &str| {
            names
                .and_then(|n| n.get(key))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };
        PartnerNames {
            persona1: pick("persona1", DEFAULT_NAME_1),
            persona2: pick("persona2", DEFAULT_NAME_2),
        }
    }

    /// Weekly expense budget.
    pub fn weekly_budget(&self) -> Decimal {
        decimal_at(&self.0, &["presupuesto"]).unwrap_or(Decimal::new(1500, 0))
    }

    pub fn savings(&self) -> SavingsConfig {
        let defaults = SavingsConfig::default();
        let root = &self.0;
        SavingsConfig {
            monthly_target: decimal_at(root, &["ahorroConfig", "metaMensual"])
                .unwrap_or(defaults.monthly_target),
            yearly_target: decimal_at(root, &["ahorroConfig", "metaAnual"])
                .unwrap_or(defaults.yearly_target),
            option_amounts: [
                decimal_at(root, &["ahorroConfig", "montosOpciones", "opcion1"])
                    .unwrap_or(defaults.option_amounts[0]),
                decimal_at(root, &["ahorroConfig", "montosOpciones", "opcion2"])
                    .unwrap_or(defaults.option_amounts[1]),
                decimal_at(root, &["ahorroConfig", "montosOpciones", "opcion3"])
                    .unwrap_or(defaults.option_amounts[2]),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerNames {
    pub persona1: String,
    pub persona2: String,
}

impl PartnerNames {
    pub fn name_for(&self, owner: OwnerTag) -> &str {
        match owner {
            OwnerTag::Persona1 => &self.persona1,
            OwnerTag::Persona2 => &self.persona2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsConfig {
    pub monthly_target: Decimal,
    pub yearly_target: Decimal,
    /// Amounts behind preset slots 1..=3.
    pub option_amounts: [Decimal; 3],
}

impl Default for SavingsConfig {
    fn default() -> Self {
        Self {
            monthly_target: Decimal::new(500, 0),
            yearly_target: Decimal::new(6000, 0),
            option_amounts: [Decimal::new(4, 0), Decimal::new(5, 0), Decimal::new(6, 0)],
        }
    }
}

impl SavingsConfig {
    pub fn amount_for_option(&self, slot: u8) -> Option<Decimal> {
        match slot {
            1..=3 => Some(self.option_amounts[usize::from(slot - 1)]),
            _ => None,
        }
    }
}

/// Deep-merge `patch` into `target`: nested objects merge key by key, every
/// other value replaces what was there. Keys absent from `patch` are kept.
pub fn merge_json(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_json(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn decimal_at(root: &Map<String, Value>, path: &[&str]) -> Option<Decimal> {
    let (first, rest) = path.split_first()?;
    let mut current = root.get(*first)?;
    for key in rest {
        current = current.get(*key)?;
    }
    match current {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}
