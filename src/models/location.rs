use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Location {
    pub id: String,
    pub host_id: String,
    pub name: String,
    pub base_price_per_hour: i64,
    /// Charged for every guest beyond the first.
    pub incremental_rate_per_guest: i64,
    /// Instant-book locations skip host approval and start in `payment_pending`.
    pub instant_book: bool,
    pub addons: Vec<Addon>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Addon {
    pub id: String,
    pub location_id: String,
    pub name: String,
    pub price: i64,
    pub price_unit: PriceUnit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceUnit {
    #[default]
    Flat,
    PerHour,
}

impl PriceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceUnit::Flat => "flat",
            PriceUnit::PerHour => "per_hour",
        }
    }
}

impl FromStr for PriceUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(PriceUnit::Flat),
            "per_hour" | "hour" => Ok(PriceUnit::PerHour),
            _ => Err(format!("invalid price unit: {s}")),
        }
    }
}

impl fmt::Display for PriceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
