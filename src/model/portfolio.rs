use super::position::Position;
use crate::cacheable::Cacheable;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A portfolio of positions; the value type of the demo's `Portfolios` region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    #[serde(rename = "ID")]
    pub id: i32,
    pub pkid: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    #[serde(rename = "newVal")]
    pub new_val: Vec<u8>,
    pub position1: Option<Position>,
    pub position2: Option<Position>,
    /// Positions keyed by security ID.
    pub positions: BTreeMap<String, Position>,
}

impl Portfolio {
    /// Portfolio `id` carrying `size` bytes of payload.
    ///
    /// Even IDs are `"active"`, odd IDs `"inactive"`. Only odd IDs hold a
    /// second position.
    pub fn new(id: i32, size: usize) -> Self {
        let position1 = Position::for_portfolio(id, 0);
        let position2 = (id % 2 != 0).then(|| Position::for_portfolio(id, 1));

        let positions = std::iter::once(&position1)
            .chain(position2.as_ref())
            .map(|p| (p.sec_id.clone(), p.clone()))
            .collect();

        Portfolio {
            id,
            pkid: id.to_string(),
            kind: format!("type{}", id.rem_euclid(3)),
            status: if id % 2 == 0 { "active" } else { "inactive" }.to_string(),
            new_val: vec![b'B'; size],
            position1: Some(position1),
            position2,
            positions,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

impl fmt::Display for Portfolio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Portfolio [ID={} status={} type={} pkid={}]",
            self.id, self.status, self.kind, self.pkid
        )?;
        if let Some(p) = &self.position1 {
            write!(f, "\n P1: {}", p)?;
        }
        if let Some(p) = &self.position2 {
            write!(f, "\n P2: {}", p)?;
        }
        Ok(())
    }
}

impl Cacheable for Portfolio {
    fn type_name() -> &'static str {
        "Portfolio"
    }

    fn validate(&self) -> Result<()> {
        if self.pkid != self.id.to_string() {
            return Err(Error::ValidationError(format!(
                "Portfolio {} has pkid {}",
                self.id, self.pkid
            )));
        }
        Ok(())
    }
}
