//! Dynamic text groups
//!
//! Every panel in the UI is a [`GroupState`] kept in a per-session
//! [`GroupArena`]. Ids are handed out monotonically and never reused, so a
//! chat answer that arrives after its panel was removed can be dropped
//! instead of landing in whichever panel now occupies the same position.

use serde::Serialize;

use crate::texts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupState {
    pub id: GroupId,
    pub header: String,
    pub input: String,
    /// Empty until the panel has been submitted.
    pub output: String,
    pub collapsed: bool,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GroupError {
    #[error("Maximum {0} groups reached!")]
    LimitReached(usize),

    #[error("group {0} does not exist")]
    Unknown(GroupId),
}

#[derive(Debug, Clone)]
pub struct GroupArena {
    groups: Vec<GroupState>,
    next_id: u64,
    max_groups: usize,
}

impl GroupArena {
    pub fn new(max_groups: usize) -> Self {
        Self {
            groups: Vec::new(),
            next_id: 0,
            max_groups: max_groups.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn max_groups(&self) -> usize {
        self.max_groups
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupState> {
        self.groups.iter()
    }

    pub fn get(&self, id: GroupId) -> Option<&GroupState> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn get_mut(&mut self, id: GroupId) -> Option<&mut GroupState> {
        self.groups.iter_mut().find(|g| g.id == id)
    }

    fn allocate(&mut self, header: String, input: String) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id += 1;
        self.groups.push(GroupState {
            id,
            header,
            input,
            output: String::new(),
            collapsed: false,
        });
        id
    }

    /// Replace all groups with ones pre-filled from table columns.
    ///
    /// The count is `min(titles.len(), max_groups)`; inputs missing for a
    /// title fall back to an empty string.
    pub fn seed(&mut self, titles: &[String], inputs: &[String]) {
        self.groups.clear();
        let count = titles.len().min(self.max_groups);
        for idx in 0..count {
            let input = inputs.get(idx).cloned().unwrap_or_default();
            self.allocate(titles[idx].clone(), input);
        }
    }

    pub fn add(&mut self) -> Result<GroupId, GroupError> {
        if self.groups.len() >= self.max_groups {
            return Err(GroupError::LimitReached(self.max_groups));
        }
        Ok(self.allocate(texts::GROUP_DEFAULT_TITLE.to_string(), String::new()))
    }

    /// Drop the last group, always leaving at least one.
    pub fn remove_last(&mut self) -> usize {
        if self.groups.len() > 1 {
            self.groups.pop();
        } else if self.groups.is_empty() {
            self.allocate(texts::GROUP_DEFAULT_TITLE.to_string(), String::new());
        }
        self.groups.len()
    }

    /// Grow with default groups or shrink, discarding state beyond `count`.
    pub fn resize(&mut self, count: usize) {
        let count = count.min(self.max_groups);
        self.groups.truncate(count);
        while self.groups.len() < count {
            self.allocate(texts::GROUP_DEFAULT_TITLE.to_string(), String::new());
        }
    }

    pub fn toggle_collapse(&mut self, id: GroupId) -> Result<bool, GroupError> {
        let group = self.get_mut(id).ok_or(GroupError::Unknown(id))?;
        group.collapsed = !group.collapsed;
        Ok(group.collapsed)
    }

    /// Store a chat answer; returns `false` if the group no longer exists.
    pub fn set_output(&mut self, id: GroupId, output: String) -> bool {
        match self.get_mut(id) {
            Some(group) => {
                group.output = output;
                true
            }
            None => false,
        }
    }

    pub fn headers(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.header.clone()).collect()
    }

    pub fn inputs(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.input.clone()).collect()
    }

    pub fn outputs(&self) -> Vec<String> {
        self.groups.iter().map(|g| g.output.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_seed_caps_at_max_groups() {
        let mut arena = GroupArena::new(2);
        arena.seed(&strings(&["a", "b", "c"]), &strings(&["1", "2", "3"]));
        assert_eq!(arena.headers(), strings(&["a", "b"]));
        assert_eq!(arena.inputs(), strings(&["1", "2"]));
        assert!(arena.outputs().iter().all(|o| o.is_empty()));
    }

    #[test]
    fn test_seed_with_short_inputs() {
        let mut arena = GroupArena::new(10);
        arena.seed(&strings(&["a", "b"]), &strings(&["1"]));
        assert_eq!(arena.inputs(), strings(&["1", ""]));
    }

    #[test]
    fn test_add_respects_limit() {
        let mut arena = GroupArena::new(2);
        arena.add().unwrap();
        arena.add().unwrap();
        assert_eq!(arena.add(), Err(GroupError::LimitReached(2)));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.headers()[0], texts::GROUP_DEFAULT_TITLE);
    }

    #[test]
    fn test_remove_last_keeps_one() {
        let mut arena = GroupArena::new(5);
        arena.resize(2);
        assert_eq!(arena.remove_last(), 1);
        assert_eq!(arena.remove_last(), 1);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut arena = GroupArena::new(5);
        let first = arena.add().unwrap();
        let second = arena.add().unwrap();
        arena.remove_last();
        let third = arena.add().unwrap();
        assert_ne!(second, third);
        assert!(first < third);
        // late answer for a removed panel is dropped
        assert!(!arena.set_output(second, "late".into()));
        assert!(arena.set_output(third, "fresh".into()));
        assert_eq!(arena.get(third).unwrap().output, "fresh");
    }

    #[test]
    fn test_resize_discards_tail_state() {
        let mut arena = GroupArena::new(5);
        arena.seed(&strings(&["a", "b", "c"]), &strings(&["1", "2", "3"]));
        arena.resize(1);
        arena.resize(3);
        assert_eq!(arena.headers(), strings(&["a", GROUP_TITLE, GROUP_TITLE]));
        assert_eq!(arena.inputs(), strings(&["1", "", ""]));
    }

    const GROUP_TITLE: &str = texts::GROUP_DEFAULT_TITLE;

    #[test]
    fn test_toggle_collapse() {
        let mut arena = GroupArena::new(5);
        let id = arena.add().unwrap();
        assert_eq!(arena.toggle_collapse(id), Ok(true));
        assert_eq!(arena.toggle_collapse(id), Ok(false));
        assert_eq!(arena.toggle_collapse(GroupId(99)), Err(GroupError::Unknown(GroupId(99))));
    }
}
