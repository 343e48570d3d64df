pub mod clock;
pub mod cycle;
pub mod diagram;
pub mod edge;
pub mod engine;
pub mod error;
pub mod history;
pub mod id;
pub mod node;
pub mod patch;
pub mod task;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use cycle::{cycle_path, has_cycle, would_create_cycle};
pub use diagram::{DiagramDocument, DiagramMeta, DiagramSnapshot, NewDiagram, Viewport};
pub use edge::{connection_hash, EdgeStyle, PersistedEdge, DEFAULT_EDGE_KIND};
pub use engine::{apply, apply_recording, invert, invert_batch, snapshot_of, Before, PriorState};
pub use error::CoreError;
pub use history::{HistoryManager, DEFAULT_HISTORY_LIMIT};
pub use id::{DiagramId, EdgeId, NodeId, TaskId};
pub use node::{NodeData, NodeStyle, PersistedNode, Position, DEFAULT_NODE_KIND, TASK_NODE_KIND};
pub use patch::{EdgeChanges, EdgeRemoval, MetadataChanges, NodeChanges, NodeRemoval, Patch, PatchTarget};
pub use task::{Priority, Task, TaskStatus};
