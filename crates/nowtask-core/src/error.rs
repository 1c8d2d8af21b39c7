use thiserror::Error;

use crate::task::TaskId;

/// Caller mistakes: the input references tasks that do not exist or is
/// internally inconsistent. Distinct from [`Rejection`], which is a normal
/// policy outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("task not found: {0}")]
    UnknownTask(TaskId),

    #[error("moved task {0} is missing from the ordering")]
    NotInOrdering(TaskId),

    #[error("task {0} appears more than once in the ordering")]
    DuplicateEntry(TaskId),
}

/// Why a proposed parent assignment was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("a task cannot be its own parent")]
    SelfParent,

    #[error("the new parent is a descendant of the task")]
    Cycle,

    #[error("subtree would reach depth {required} under a parent at depth {parent_depth} (max {max})")]
    DepthExceeded {
        parent_depth: usize,
        required: usize,
        max: usize,
    },
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::SelfParent => "self-parent",
            Rejection::Cycle => "cycle",
            Rejection::DepthExceeded { .. } => "depth-exceeded",
        }
    }
}
