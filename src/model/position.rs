use crate::cacheable::Cacheable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Security identifiers positions are drawn from.
pub const SEC_IDS: [&str; 10] = [
    "SUN", "IBM", "YHOO", "GOOG", "MSFT", "AOL", "APPL", "ORCL", "SAP", "DELL",
];

/// A holding inside a [`Portfolio`](super::Portfolio).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "secId")]
    pub sec_id: String,
    #[serde(rename = "sharesOutstanding")]
    pub shares_outstanding: i64,
    pub qty: f64,
    #[serde(rename = "mktValue")]
    pub mkt_value: f64,
}

impl Position {
    pub fn new(sec_id: &str, shares_outstanding: i64) -> Self {
        let qty = (shares_outstanding - 100) as f64;
        Position {
            sec_id: sec_id.to_string(),
            shares_outstanding,
            qty,
            mkt_value: qty * 1.2345998,
        }
    }

    /// The `slot`-th position of portfolio `id`. Same inputs, same position.
    pub(crate) fn for_portfolio(id: i32, slot: i32) -> Self {
        let n = id.rem_euclid(1_000) * 2 + slot;
        let sec_id = SEC_IDS[n as usize % SEC_IDS.len()];
        Position::new(sec_id, i64::from(n) * 1000)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Position [secId={} sharesOutstanding={} qty={} mktValue={}]",
            self.sec_id, self.shares_outstanding, self.qty, self.mkt_value
        )
    }
}

impl Cacheable for Position {
    fn type_name() -> &'static str {
        "Position"
    }
}
