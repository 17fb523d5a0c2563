//! Lenient field deserialisation.
//!
//! Clinical resources other than Patient must never fail to map. Fields annotated with
//! `#[serde(default, deserialize_with = "lenient")]` fall back to `T::default()` when the wire
//! value has an unexpected shape instead of failing the whole resource.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}
