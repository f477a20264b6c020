use serde::{Deserialize, Serialize};

use super::ids::InstrumentId;

/// Instrument metadata needed to value positions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub id: InstrumentId,
    pub symbol: String,
    pub asset_class: AssetClass,
    /// Contract multiplier (100 for a standard equity option).
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// ISO currency code the instrument is quoted in.
    pub currency: String,
    #[serde(default)]
    pub underlying_symbol: Option<String>,
}

fn default_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AssetClass {
    Stock,
    Option,
    Future,
    FutureOption,
    Forex,
    Bond,
    Cfd,
    Index,
    Other,
}

impl AssetClass {
    /// Options carry leverage, so their gross value is scaled when counting capital.
    pub fn is_option(self) -> bool {
        matches!(self, AssetClass::Option | AssetClass::FutureOption)
    }
}

impl Instrument {
    pub fn new(id: InstrumentId, symbol: impl Into<String>, asset_class: AssetClass) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            asset_class,
            multiplier: 1.0,
            currency: "USD".into(),
            underlying_symbol: None,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_classes_are_flagged() {
        assert!(AssetClass::Option.is_option());
        assert!(AssetClass::FutureOption.is_option());
        assert!(!AssetClass::Stock.is_option());
        assert!(!AssetClass::Future.is_option());
    }

    #[test]
    fn multiplier_defaults_to_one_when_missing() {
        let json = r#"{"id":1,"symbol":"SPY","asset_class":"Stock","currency":"USD"}"#;
        let inst: Instrument = serde_json::from_str(json).unwrap();
        assert_eq!(inst.multiplier, 1.0);
        assert_eq!(inst.underlying_symbol, None);
    }

    #[test]
    fn builder_sets_fields() {
        let inst = Instrument::new(InstrumentId(3), "SPY 240119C00470000", AssetClass::Option)
            .with_multiplier(100.0)
            .with_currency("EUR");
        assert_eq!(inst.multiplier, 100.0);
        assert_eq!(inst.currency, "EUR");
    }
}
