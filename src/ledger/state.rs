//! Top-level application state: every child profile plus the active selection.
use serde::{Deserialize, Serialize};

use super::types::{ChildId, ChildProfile};

/// Children in insertion order and the currently selected child, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    #[serde(default)]
    children: Vec<ChildProfile>,
    #[serde(default)]
    selected_child_id: Option<ChildId>,
}

impl AppState {
    pub fn children(&self) -> &[ChildProfile] {
        &self.children
    }

    pub fn selected_child_id(&self) -> Option<&ChildId> {
        self.selected_child_id.as_ref()
    }

    pub fn selected_child(&self) -> Option<&ChildProfile> {
        self.selected_child_id
            .as_ref()
            .and_then(|id| self.child(id))
    }

    pub fn child(&self, id: &ChildId) -> Option<&ChildProfile> {
        self.children.iter().find(|child| child.id() == id)
    }

    /// Resolves an exact id first, then a case-insensitive name.
    pub fn find_child(&self, query: &str) -> Option<&ChildProfile> {
        let query = query.trim();
        self.children
            .iter()
            .find(|child| child.id().as_str() == query)
            .or_else(|| {
                self.children
                    .iter()
                    .find(|child| child.name().eq_ignore_ascii_case(query))
            })
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn with_child_added(&self, child: ChildProfile) -> Self {
        let selected_child_id = self
            .selected_child_id
            .clone()
            .or_else(|| Some(child.id().clone()));
        let mut children = self.children.clone();
        children.push(child);
        Self {
            children,
            selected_child_id,
        }
    }

    /// Swaps in `updated` for the child with the same id.
    pub(crate) fn with_child_replaced(&self, updated: ChildProfile) -> Self {
        let children = self
            .children
            .iter()
            .map(|child| {
                if child.id() == updated.id() {
                    updated.clone()
                } else {
                    child.clone()
                }
            })
            .collect();
        Self {
            children,
            selected_child_id: self.selected_child_id.clone(),
        }
    }

    pub(crate) fn with_selection(&self, selected: Option<ChildId>) -> Self {
        Self {
            children: self.children.clone(),
            selected_child_id: selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(id: &str, name: &str) -> ChildProfile {
        ChildProfile::new(ChildId::new(id), name, 8, "avatar").unwrap()
    }

    #[test]
    fn first_added_child_becomes_selected() {
        let state = AppState::default()
            .with_child_added(child("a", "Maya"))
            .with_child_added(child("b", "Leo"));

        assert_eq!(state.len(), 2);
        assert_eq!(state.selected_child_id(), Some(&ChildId::new("a")));
        assert_eq!(state.selected_child().map(ChildProfile::name), Some("Maya"));
    }

    #[test]
    fn find_child_prefers_id_then_name() {
        let state = AppState::default()
            .with_child_added(child("leo", "Maya"))
            .with_child_added(child("b", "Leo"));

        assert_eq!(state.find_child("leo").map(ChildProfile::name), Some("Maya"));
        assert_eq!(state.find_child("LEO ").map(ChildProfile::name), Some("Leo"));
        assert_eq!(state.find_child("b").map(ChildProfile::name), Some("Leo"));
        assert!(state.find_child("nobody").is_none());
    }

    #[test]
    fn missing_fields_default_when_deserializing() {
        let state: AppState = serde_json::from_str("{}").expect("empty document should parse");
        assert!(state.is_empty());
        assert!(state.selected_child_id().is_none());
    }
}
