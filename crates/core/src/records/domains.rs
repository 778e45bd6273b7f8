//! The four record shapes tracked by the app and their collection specs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::model::{CollectionSpec, Record, RecordBody, RecordOrdering};

pub const EXPENSES: CollectionSpec = CollectionSpec {
    name: "gastos",
    backup_key: "nuestros_gastos",
    ordering: RecordOrdering::CreatedDesc,
};

pub const SAVINGS: CollectionSpec = CollectionSpec {
    name: "ahorros",
    backup_key: "nuestros_ahorros",
    ordering: RecordOrdering::CreatedDesc,
};

pub const LIMITS: CollectionSpec = CollectionSpec {
    name: "limites",
    backup_key: "limites_registros",
    ordering: RecordOrdering::CreatedDesc,
};

pub const SPECIAL_DATES: CollectionSpec = CollectionSpec {
    name: "dias_especiales",
    backup_key: "dias_especiales",
    ordering: RecordOrdering::EffectiveDateAsc,
};

/// Collection name of the shared configuration documents.
pub const CONFIG_COLLECTION: &str = "config";

/// Quick-pick categories offered when logging an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExpenseCategory {
    #[serde(rename = "comida")]
    Food,
    #[serde(rename = "transporte")]
    Transport,
    #[serde(rename = "entretenimiento")]
    Entertainment,
    #[serde(rename = "compras")]
    Shopping,
    #[default]
    #[serde(rename = "otros")]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseBody {
    pub amount: Decimal,
    pub description: String,
    #[serde(default)]
    pub category: ExpenseCategory,
}

impl RecordBody for ExpenseBody {
    const COLLECTION: CollectionSpec = EXPENSES;

    fn describe(&self) -> String {
        format!("${:.2} {}", self.amount, self.description)
    }
}

/// A saved amount, picked from one of the three preset slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingBody {
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
    /// Preset slot (1..=3) the amount came from.
    pub option: u8,
}

impl RecordBody for SavingBody {
    const COLLECTION: CollectionSpec = SAVINGS;

    fn describe(&self) -> String {
        format!("${:.2} saved", self.amount)
    }
}

/// Outcome of one daily spending-limit challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitBody {
    pub spent: Decimal,
    /// Zero means "no limit": everything spent is split as forced savings.
    pub limit: Decimal,
    pub excess: Decimal,
    pub saved_total: Decimal,
    pub saved_per_person: Decimal,
    pub within_limit: bool,
    #[serde(default)]
    pub description: String,
}

impl RecordBody for LimitBody {
    const COLLECTION: CollectionSpec = LIMITS;

    fn describe(&self) -> String {
        if self.within_limit {
            "Limit kept".to_string()
        } else {
            format!("Forced saving ${:.2}", self.saved_total)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialDateBody {
    pub name: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default)]
    pub notify: bool,
}

fn default_icon() -> String {
    "❤️".to_string()
}

impl RecordBody for SpecialDateBody {
    const COLLECTION: CollectionSpec = SPECIAL_DATES;

    fn describe(&self) -> String {
        format!("\"{}\"", self.name)
    }
}

pub type Expense = Record<ExpenseBody>;
pub type Saving = Record<SavingBody>;
pub type LimitCheck = Record<LimitBody>;
pub type SpecialDate = Record<SpecialDateBody>;
