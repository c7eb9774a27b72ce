use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Compact visual summary. Flat strings only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub title: String,
    /// Primary stat, pre-formatted (`25:14`, `412`, `Dec 31, 1995`).
    pub stat: String,
    pub subtitle: String,
    /// Comparison or warning line; absent when there is nothing to compare against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer: String,
    /// Substring of `answer` to emphasize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
    pub card: Card,
    #[serde(default)]
    pub related: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}
