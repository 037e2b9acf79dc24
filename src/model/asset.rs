use std::{fmt, rc::Rc};

/// Fiat currencies recognized by the engine, in canonical form.
///
/// Disposal proceeds in any of these classify as a cash sale; everything else
/// is treated as a crypto asset.
const FIAT: [&str; 3] = ["BRL", "EUR", "USD"];

/// An asset symbol, e.g. `BTC` or `BRL`.
///
/// The statement format carries arbitrary tickers, so this is an interned
/// string rather than a closed enum. Fiat spellings are canonicalized on
/// construction ("Real Brasileiro" parses as `BRL`).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AssetName(Rc<str>);

impl AssetName {
    pub fn new(symbol: &str) -> Self {
        let symbol = symbol.trim();
        let canonical = match symbol {
            "Real Brasileiro" | "Real" => "BRL",
            "Euro" => "EUR",
            "US Dollar" | "Dólar Americano" => "USD",
            other => other,
        };

        Self(Rc::from(canonical))
    }

    pub fn is_fiat(&self) -> bool {
        FIAT.contains(&&*self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetName {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_fiat_spellings() {
        assert_eq!(AssetName::new("Real Brasileiro"), AssetName::new("BRL"));
        assert_eq!(AssetName::new(" Euro "), AssetName::new("EUR"));
        assert_eq!(AssetName::new("US Dollar").as_str(), "USD");
    }

    #[test]
    fn fiat_recognition() {
        assert!(AssetName::new("BRL").is_fiat());
        assert!(AssetName::new("Real Brasileiro").is_fiat());
        assert!(AssetName::new("EUR").is_fiat());
        assert!(!AssetName::new("BTC").is_fiat());
        assert!(!AssetName::new("USDT").is_fiat());
    }
}
