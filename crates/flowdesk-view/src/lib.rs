//! Display layers for flowdesk diagrams.
//!
//! Persisted nodes are resolved against live tasks into domain nodes
//! ([`resolve`]), then adapted for the interactive canvas ([`runtime`]).
//! Nothing in this crate writes to storage.

pub mod error;
pub mod resolve;
pub mod runtime;
pub mod style;

pub use error::ViewError;
pub use resolve::{resolve, resolve_node, DomainNode, ResolvedTask, ResolverCache};
pub use runtime::{
    apply_hover, merge_edges, merge_nodes, render, to_runtime, truncate_label, Decoration,
    DisplayLabel, RenderFrame, RuntimeEdge, RuntimeNode, UiFlags, DEFAULT_LABEL_MAX,
};
pub use style::{base_style_for_status, contrast_ratio, neutral_style, Palette, Theme};
