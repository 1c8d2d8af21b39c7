use tracing::debug;

use crate::error::{EngineError, Rejection};
use crate::forest::Forest;
use crate::task::{MAX_DEPTH, TaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected(reason) => Some(reason),
        }
    }
}

/// Checks whether `task_id` may hang under `candidate` without creating a
/// cycle or pushing any of its existing descendants past [`MAX_DEPTH`].
///
/// Purely advisory: nothing is mutated.
#[tracing::instrument(skip(forest), fields(task = %task_id))]
pub fn validate_reparent(
    forest: &Forest<'_>,
    task_id: &TaskId,
    candidate: Option<&TaskId>,
) -> Result<Verdict, EngineError> {
    forest.require(task_id)?;

    let Some(candidate) = candidate else {
        return Ok(Verdict::Accepted);
    };

    if candidate == task_id {
        return Ok(Verdict::Rejected(Rejection::SelfParent));
    }

    forest.require(candidate)?;

    if forest.is_descendant_of(candidate, task_id) {
        return Ok(Verdict::Rejected(Rejection::Cycle));
    }

    let parent_depth = forest.depth_of(candidate);
    let subtree = forest.max_subtree_depth(task_id);
    let required = parent_depth + 1 + subtree;
    debug!(
        candidate = %candidate,
        parent_depth,
        subtree,
        required,
        "checked depth budget"
    );
    if required > MAX_DEPTH {
        return Ok(Verdict::Rejected(Rejection::DepthExceeded {
            parent_depth,
            required,
            max: MAX_DEPTH,
        }));
    }

    Ok(Verdict::Accepted)
}

pub fn can_have_subtask(forest: &Forest<'_>, id: &TaskId) -> Result<bool, EngineError> {
    forest.require(id)?;
    Ok(forest.depth_of(id) < MAX_DEPTH)
}
