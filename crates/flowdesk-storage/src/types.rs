//! Storage-layer record types.

use flowdesk_core::id::DiagramId;
use serde::{Deserialize, Serialize};

/// One row of `list_diagrams`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSummary {
    pub id: DiagramId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub node_count: usize,
    pub edge_count: usize,
    pub created_at: i64,
    pub updated_at: i64,
}
