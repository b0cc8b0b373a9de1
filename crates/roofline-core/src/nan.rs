//! Serde support for floating point values that may hold NaN.
//!
//! `serde_json` writes non-finite floats as `null`; reading them back needs
//! the reverse mapping.

use serde::{Deserialize, Deserializer};

pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// An `f64` that reads `null` as NaN, for values nested in containers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Float(pub f64);

impl<'de> Deserialize<'de> for Float {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize(deserializer).map(Float)
    }
}
