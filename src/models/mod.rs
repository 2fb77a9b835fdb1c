pub mod analytics;
pub mod audit;
pub mod auth;
pub mod billing;
pub mod chat;
pub mod chatbot;
pub mod document;
pub mod message;
pub mod rbac;
pub mod team;
pub mod training;

use serde::{Deserialize, Deserializer};

/// Keeps an explicit `null` apart from an absent field in partial updates:
/// absent is `None`, `null` is `Some(None)`. Pair with `#[serde(default)]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
