//! Arena view over a task collection.
//!
//! Tasks stay owned by the slice; the forest only indexes them by id and
//! follows `parent_id` links as relations.

use std::collections::{HashMap, HashSet};

use crate::error::EngineError;
use crate::task::{Task, TaskId};

/// One row of the flattened, leveled display ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub id: TaskId,
    pub level: usize,
}

impl Placement {
    pub fn new(id: impl Into<TaskId>, level: usize) -> Self {
        Self {
            id: id.into(),
            level,
        }
    }
}

#[derive(Debug)]
pub struct Forest<'a> {
    tasks: &'a [Task],
    index: HashMap<&'a TaskId, usize>,
    children: HashMap<&'a TaskId, Vec<usize>>,
}

impl<'a> Forest<'a> {
    pub fn new(tasks: &'a [Task]) -> Self {
        let mut index = HashMap::with_capacity(tasks.len());
        for (pos, task) in tasks.iter().enumerate() {
            index.entry(&task.id).or_insert(pos);
        }

        let mut children: HashMap<&'a TaskId, Vec<usize>> = HashMap::new();
        for (pos, task) in tasks.iter().enumerate() {
            if let Some(parent) = task.parent_id.as_ref() {
                children.entry(parent).or_default().push(pos);
            }
        }
        for positions in children.values_mut() {
            positions.sort_by_key(|&pos| tasks[pos].custom_order);
        }

        Self {
            tasks,
            index,
            children,
        }
    }

    pub fn tasks(&self) -> &'a [Task] {
        self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&'a Task> {
        self.index.get(id).map(|&pos| &self.tasks[pos])
    }

    pub fn require(&self, id: &TaskId) -> Result<&'a Task, EngineError> {
        self.get(id)
            .ok_or_else(|| EngineError::UnknownTask(id.clone()))
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    pub fn parent_of(&self, id: &TaskId) -> Option<&'a TaskId> {
        self.get(id).and_then(|task| task.parent_id.as_ref())
    }

    /// Direct subtasks in `custom_order`, ties in collection order.
    pub fn children(&self, id: &TaskId) -> impl Iterator<Item = &'a Task> + '_ {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .map(|&pos| &self.tasks[pos])
    }

    /// Parent chain from the direct parent up to the root.
    ///
    /// Dangling parent ids end the chain. The walk is capped at the size of
    /// the collection so corrupted data with a loop cannot hang the caller.
    pub fn ancestors(&self, id: &TaskId) -> Vec<&'a TaskId> {
        let mut out = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            if out.len() > self.tasks.len() || !self.contains(parent) {
                break;
            }
            out.push(parent);
            current = self.parent_of(parent);
        }
        out
    }

    pub fn depth_of(&self, id: &TaskId) -> usize {
        self.ancestors(id).len()
    }

    pub fn is_descendant_of(&self, candidate: &TaskId, ancestor: &TaskId) -> bool {
        self.ancestors(candidate)
            .into_iter()
            .any(|id| id == ancestor)
    }

    /// Length of the longest chain of existing descendants below `id`.
    pub fn max_subtree_depth(&self, id: &TaskId) -> usize {
        let mut deepest = 0;
        let mut seen: HashSet<&TaskId> = HashSet::new();
        let mut stack: Vec<(&TaskId, usize)> = vec![(id, 0)];

        while let Some((current, depth)) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            deepest = deepest.max(depth);
            for child in self.children(current) {
                stack.push((&child.id, depth + 1));
            }
        }

        deepest
    }

    pub fn is_open_or_leads_to_open(&self, task: &Task) -> bool {
        !task.is_completed || self.descendants(&task.id).iter().any(|t| !t.is_completed)
    }

    /// All descendants of `id`, depth-first.
    pub fn descendants(&self, id: &TaskId) -> Vec<&'a Task> {
        let mut out = Vec::new();
        let mut seen: HashSet<&TaskId> = HashSet::from([id]);
        let mut stack: Vec<&'a Task> = self.children(id).collect();
        stack.reverse();

        while let Some(task) = stack.pop() {
            if !seen.insert(&task.id) {
                continue;
            }
            out.push(task);
            let mut kids: Vec<&'a Task> = self.children(&task.id).collect();
            kids.reverse();
            stack.extend(kids);
        }

        out
    }

    /// Flattens the given roots and their incomplete descendants into the
    /// leveled display ordering the move flow works on. A completed task is
    /// kept only as the context row of an open task somewhere below it.
    pub fn visible_ordering<'r, I>(&self, roots: I) -> Vec<Placement>
    where
        I: IntoIterator<Item = &'r TaskId>,
    {
        let mut out = Vec::new();
        let mut seen: HashSet<&TaskId> = HashSet::new();
        for root in roots {
            if let Some(task) = self.get(root) {
                self.push_visible(task, 0, &mut out, &mut seen);
            }
        }
        out
    }

    fn push_visible(
        &self,
        task: &'a Task,
        level: usize,
        out: &mut Vec<Placement>,
        seen: &mut HashSet<&'a TaskId>,
    ) {
        if !seen.insert(&task.id) {
            return;
        }
        out.push(Placement::new(task.id.clone(), level));
        for child in self.children(&task.id) {
            if self.is_open_or_leads_to_open(child) {
                self.push_visible(child, level + 1, out, seen);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{chain, task};
    use super::{Forest, Placement};
    use crate::task::TaskId;

    #[test]
    fn depth_and_ancestors_follow_parent_links() {
        let tasks = chain();
        let forest = Forest::new(&tasks);

        assert_eq!(forest.depth_of(&"a".into()), 0);
        assert_eq!(forest.depth_of(&"e".into()), 4);
        let ancestors: Vec<&str> = forest
            .ancestors(&"c".into())
            .into_iter()
            .map(TaskId::as_str)
            .collect();
        assert_eq!(ancestors, vec!["b", "a"]);
        assert!(forest.is_descendant_of(&"e".into(), &"b".into()));
        assert!(!forest.is_descendant_of(&"b".into(), &"e".into()));
    }

    #[test]
    fn subtree_depth_counts_longest_chain() {
        let mut tasks = chain();
        tasks.push(task("x", Some("a")));
        let forest = Forest::new(&tasks);

        assert_eq!(forest.max_subtree_depth(&"a".into()), 4);
        assert_eq!(forest.max_subtree_depth(&"c".into()), 2);
        assert_eq!(forest.max_subtree_depth(&"f".into()), 0);
        assert_eq!(forest.descendants(&"b".into()).len(), 3);
    }

    #[test]
    fn corrupted_loop_does_not_hang() {
        let tasks = vec![task("p", Some("q")), task("q", Some("p"))];
        let forest = Forest::new(&tasks);

        assert!(forest.depth_of(&"p".into()) <= tasks.len() + 1);
        assert_eq!(forest.max_subtree_depth(&"p".into()), 1);
    }

    #[test]
    fn visible_ordering_skips_completed_subtasks() {
        let mut tasks = vec![
            task("r", None),
            task("s1", Some("r")),
            task("s2", Some("r")),
            task("g", Some("s1")),
        ];
        tasks[2].is_completed = true;
        tasks[1].custom_order = 5;
        tasks[3].custom_order = 1;
        let forest = Forest::new(&tasks);

        let ordering = forest.visible_ordering([&TaskId::from("r")]);
        assert_eq!(
            ordering,
            vec![
                Placement::new("r", 0),
                Placement::new("s1", 1),
                Placement::new("g", 2),
            ]
        );
    }

    #[test]
    fn completed_subtask_stays_as_context_for_open_grandchild() {
        let mut tasks = vec![task("r", None), task("s", Some("r")), task("g", Some("s"))];
        tasks[1].is_completed = true;
        let forest = Forest::new(&tasks);

        let ordering = forest.visible_ordering([&TaskId::from("r")]);
        assert_eq!(
            ordering,
            vec![
                Placement::new("r", 0),
                Placement::new("s", 1),
                Placement::new("g", 2),
            ]
        );

        tasks[2].is_completed = true;
        let forest = Forest::new(&tasks);
        assert_eq!(
            forest.visible_ordering([&TaskId::from("r")]),
            vec![Placement::new("r", 0)]
        );
    }
}
