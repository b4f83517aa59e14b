//! Suggestion reconciler.
//!
//! Holds the suggestion groups derived from the catalog, filtered against what the user has
//! already filed, and a pointer at the first suggestion that still has diagnoses left.
//! Suggestion groups are never removed once derived: resolving one empties its diagnoses, so
//! positions stay stable while the user works through the list.

use crate::model::{Diagnosis, SessionState, SuggestionGroup};
use crate::tree;
use std::collections::HashSet;

/// Index of the first suggestion with diagnoses left, or `groups.len()` when all are resolved.
pub fn first_unresolved_index(groups: &[SuggestionGroup]) -> usize {
    groups
        .iter()
        .position(|g| !g.is_resolved())
        .unwrap_or(groups.len())
}

#[derive(Debug, Clone, Default)]
pub struct SuggestionReconciler {
    catalog: Vec<SuggestionGroup>,
    suggested: Vec<SuggestionGroup>,
    current_index: usize,
}

impl SuggestionReconciler {
    /// Creates a reconciler over the raw catalog. Nothing is filtered until
    /// [`reconcile`](Self::reconcile) is called.
    pub fn new(catalog: Vec<SuggestionGroup>) -> Self {
        let suggested = catalog.clone();
        let current_index = first_unresolved_index(&suggested);
        Self {
            catalog,
            suggested,
            current_index,
        }
    }

    /// Re-derives the suggestions from the raw catalog, dropping every diagnosis already present
    /// in the confirmed tree or the unsorted list.
    pub fn reconcile(&mut self, state: &SessionState) {
        let mut filed = tree::diagnosis_ids(&state.confirmed_groups);
        filed.extend(state.unsorted_diagnoses.iter().map(|d| d.id.clone()));

        self.suggested = self
            .catalog
            .iter()
            .map(|group| SuggestionGroup {
                id: group.id.clone(),
                name: group.name.clone(),
                diagnoses: group
                    .diagnoses
                    .iter()
                    .filter(|d| !filed.contains(&d.id))
                    .cloned()
                    .collect(),
            })
            .collect();
        self.current_index = first_unresolved_index(&self.suggested);

        tracing::debug!(
            "reconciled {} suggestion groups, current index {}",
            self.suggested.len(),
            self.current_index
        );
    }

    /// Removes the given diagnosis ids from every suggestion group.
    pub fn drain(&mut self, ids: &HashSet<String>) {
        if ids.is_empty() {
            return;
        }
        for group in &mut self.suggested {
            group.diagnoses.retain(|d| !ids.contains(&d.id));
        }
        self.current_index = first_unresolved_index(&self.suggested);
    }

    /// Empties the current suggestion and returns it as it was.
    ///
    /// The same diagnoses are drained from every other suggestion too. Returns `None` once all
    /// suggestions are resolved.
    pub fn take_current(&mut self) -> Option<SuggestionGroup> {
        let taken = self.current()?.clone();
        let ids: HashSet<String> = taken.diagnoses.iter().map(|d| d.id.clone()).collect();
        self.drain(&ids);
        Some(taken)
    }

    pub fn current(&self) -> Option<&SuggestionGroup> {
        self.suggested.get(self.current_index)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn suggested_groups(&self) -> &[SuggestionGroup] {
        &self.suggested
    }

    pub fn is_complete(&self) -> bool {
        self.current_index == self.suggested.len()
    }

    /// Number of suggestion groups with diagnoses left.
    pub fn remaining(&self) -> usize {
        self.suggested.iter().filter(|g| !g.is_resolved()).count()
    }

    /// Looks a diagnosis up across the visible suggestions.
    pub fn find_diagnosis(&self, diagnosis_id: &str) -> Option<&Diagnosis> {
        self.suggested
            .iter()
            .flat_map(|g| g.diagnoses.iter())
            .find(|d| d.id == diagnosis_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Group;
    use dxg_types::NonEmptyText;
    use std::sync::Arc;

    fn dx(id: &str) -> Diagnosis {
        Diagnosis::new(id, id.to_lowercase())
    }

    fn suggestion(id: &str, ids: &[&str]) -> SuggestionGroup {
        SuggestionGroup {
            id: id.to_string(),
            name: id.to_string(),
            diagnoses: ids.iter().map(|d| dx(d)).collect(),
        }
    }

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pointer_skips_resolved_groups() {
        let groups = vec![suggestion("a", &[]), suggestion("b", &["D1"]), suggestion("c", &[])];
        assert_eq!(first_unresolved_index(&groups), 1);

        let mut reconciler = SuggestionReconciler::new(groups);
        assert_eq!(reconciler.current_index(), 1);

        reconciler.drain(&ids(&["D1"]));
        assert_eq!(reconciler.current_index(), 3);
        assert!(reconciler.is_complete());
        assert!(reconciler.current().is_none());
        assert_eq!(reconciler.suggested_groups().len(), 3);
    }

    #[test]
    fn test_reconcile_filters_confirmed_and_unsorted() {
        let mut reconciler = SuggestionReconciler::new(vec![
            suggestion("Diabetes", &["E11", "E10"]),
            suggestion("Eye", &["H40"]),
        ]);

        let name = NonEmptyText::new("Filed").unwrap();
        let state = SessionState {
            confirmed_groups: vec![Arc::new(Group::with_diagnoses(&name, vec![dx("E11")]))],
            unsorted_diagnoses: vec![dx("E10")],
        };
        reconciler.reconcile(&state);

        assert!(reconciler.suggested_groups()[0].is_resolved());
        assert_eq!(reconciler.current().unwrap().name, "Eye");
        assert_eq!(reconciler.remaining(), 1);
    }

    #[test]
    fn test_reconcile_restores_after_undo() {
        let mut reconciler = SuggestionReconciler::new(vec![suggestion("Eye", &["H40"])]);
        reconciler.drain(&ids(&["H40"]));
        assert!(reconciler.is_complete());

        reconciler.reconcile(&SessionState::default());
        assert_eq!(reconciler.current_index(), 0);
        assert!(reconciler.find_diagnosis("H40").is_some());
    }

    #[test]
    fn test_take_current_drains_shared_ids() {
        let mut reconciler = SuggestionReconciler::new(vec![
            suggestion("a", &["X", "Y"]),
            suggestion("b", &["Y"]),
            suggestion("c", &["Z"]),
        ]);

        let taken = reconciler.take_current().unwrap();
        assert_eq!(taken.diagnoses.len(), 2);
        assert_eq!(reconciler.current().unwrap().id, "c");

        reconciler.take_current().unwrap();
        assert!(reconciler.take_current().is_none());
    }

    #[test]
    fn test_empty_catalog_is_complete() {
        let reconciler = SuggestionReconciler::default();
        assert!(reconciler.is_complete());
        assert_eq!(reconciler.current_index(), 0);
    }
}
