//! Diff phase: bounded, all-or-nothing batches of workflow edits.

pub mod engine;
pub mod operation;

pub use engine::{DEFAULT_MAX_OPERATIONS, DiffConfig, DiffEngine, MAX_PORT_INDEX, plan};
pub use operation::{
    AddNode, ConnectionChanges, ConnectionSpec, DiffError, DiffOperation, DiffRequest, DiffResult,
    MoveNode, NodeSpec, NodeTarget, OperationError, Phase, RawDiffRequest, TagChange,
    UpdateConnection, UpdateName, UpdateNode, UpdateSettings,
};
