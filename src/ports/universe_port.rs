//! Ticker universe source port.

use crate::domain::error::SiegfriedError;

pub trait UniversePort {
    fn list_universe(&self) -> Result<Vec<String>, SiegfriedError>;
}
