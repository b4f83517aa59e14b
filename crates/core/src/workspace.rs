//! One user's editing session.
//!
//! [`Workspace`] owns the session state together with the suggestion reconciler and the undo
//! history, and resolves diagnoses by id so callers only deal in identifiers. Every mutating
//! operation snapshots the state first and tells the caller how the change should be persisted
//! through a [`SaveHint`]; the workspace itself never performs I/O.

use crate::model::{Diagnosis, Forest, SessionState, SuggestionGroup};
use crate::suggestions::SuggestionReconciler;
use crate::tree;
use crate::undo::UndoStack;
use crate::{GroupId, GroupingError, GroupingResult};
use chrono::{DateTime, Utc};
use dxg_types::NonEmptyText;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// How a change should reach storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveHint {
    /// Nothing to persist.
    None,
    /// Persist after the quiet period.
    Debounced,
    /// Persist now.
    Immediate,
}

/// Progress report shown when the user is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSummary {
    pub user_id: String,
    pub group_count: usize,
    pub subgroup_count: usize,
    pub confirmed_diagnosis_count: usize,
    pub unsorted_count: usize,
    pub suggestions_remaining: usize,
    pub complete: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    user_id: String,
    state: SessionState,
    suggestions: SuggestionReconciler,
    undo: UndoStack,
}

impl Workspace {
    /// Opens a workspace on a loaded session and the raw suggestion catalog.
    pub fn new(
        user_id: impl Into<String>,
        state: SessionState,
        catalog: Vec<SuggestionGroup>,
        undo_capacity: usize,
    ) -> Self {
        let mut suggestions = SuggestionReconciler::new(catalog);
        suggestions.reconcile(&state);

        Self {
            user_id: user_id.into(),
            state,
            suggestions,
            undo: UndoStack::new(undo_capacity),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn suggestions(&self) -> &SuggestionReconciler {
        &self.suggestions
    }

    pub fn current_suggestion(&self) -> Option<&SuggestionGroup> {
        self.suggestions.current()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Moves a diagnosis into `target_group_id`, wherever it currently sits.
    ///
    /// # Errors
    ///
    /// - `GroupNotFound` if the target does not exist
    /// - `DiagnosisNotFound` if the diagnosis is not in the tree, the unsorted list or any
    ///   suggestion
    pub fn move_diagnosis(
        &mut self,
        diagnosis_id: &str,
        target_group_id: &GroupId,
    ) -> GroupingResult<SaveHint> {
        let target = tree::find_group(&self.state.confirmed_groups, target_group_id)
            .ok_or_else(|| GroupingError::GroupNotFound(target_group_id.to_string()))?;
        if target.holds(diagnosis_id) {
            return Ok(SaveHint::None);
        }

        let diagnosis = self.resolve_diagnosis(diagnosis_id)?;

        self.snapshot();
        self.state
            .unsorted_diagnoses
            .retain(|d| d.id != diagnosis.id);
        self.state.confirmed_groups =
            tree::move_diagnosis(&self.state.confirmed_groups, target_group_id, &diagnosis);
        self.suggestions.drain(&HashSet::from([diagnosis.id]));

        Ok(SaveHint::Debounced)
    }

    /// Files the given diagnoses under the top-level group `name`, creating it if no group of
    /// that name (case-insensitive) exists.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `name` is blank
    /// - `DiagnosisNotFound` if any id cannot be resolved; nothing changes in that case
    ///
    /// Merging only diagnoses the group already holds is a no-op: no snapshot, no save.
    pub fn create_or_merge_group(
        &mut self,
        name: &str,
        diagnosis_ids: &[String],
    ) -> GroupingResult<SaveHint> {
        let name = group_name(name)?;

        let mut seen = HashSet::new();
        let mut diagnoses = Vec::new();
        for id in diagnosis_ids {
            if seen.insert(id.clone()) {
                diagnoses.push(self.resolve_diagnosis(id)?);
            }
        }

        let unchanged = self
            .state
            .confirmed_groups
            .iter()
            .find(|g| name.eq_ignore_case(&g.name))
            .is_some_and(|existing| diagnoses.iter().all(|d| existing.holds(&d.id)));
        if unchanged {
            return Ok(SaveHint::None);
        }

        self.snapshot();
        self.file_into_group(&name, diagnoses);
        Ok(SaveHint::Debounced)
    }

    /// # Errors
    ///
    /// - `InvalidInput` if `name` is blank
    /// - `DuplicateName` if a top-level group of that name exists
    pub fn create_empty_group(&mut self, name: &str) -> GroupingResult<SaveHint> {
        let name = group_name(name)?;
        let forest = tree::create_empty_group(&self.state.confirmed_groups, &name)?;

        self.snapshot();
        self.state.confirmed_groups = forest;
        Ok(SaveHint::Debounced)
    }

    /// Adds an empty subgroup under `parent_group_id` and returns the new group's id.
    pub fn add_subgroup(
        &mut self,
        parent_group_id: &GroupId,
        name: &str,
    ) -> GroupingResult<(GroupId, SaveHint)> {
        let name = group_name(name)?;
        let subgroup = crate::model::Group::new(&name);
        let subgroup_id = subgroup.id.clone();

        let forest =
            tree::insert_subgroup(&self.state.confirmed_groups, parent_group_id, subgroup)
                .ok_or_else(|| GroupingError::GroupNotFound(parent_group_id.to_string()))?;

        self.snapshot();
        self.state.confirmed_groups = forest;
        Ok((subgroup_id, SaveHint::Debounced))
    }

    /// Reorders the children of `parent_group_id` to follow `ordered_child_ids`.
    ///
    /// # Errors
    ///
    /// - `GroupNotFound` if the parent does not exist
    /// - `InvalidInput` if `ordered_child_ids` is not a permutation of the current children
    pub fn reorder_subgroups(
        &mut self,
        parent_group_id: &GroupId,
        ordered_child_ids: &[GroupId],
    ) -> GroupingResult<SaveHint> {
        let parent = tree::find_group(&self.state.confirmed_groups, parent_group_id)
            .ok_or_else(|| GroupingError::GroupNotFound(parent_group_id.to_string()))?;

        let new_order = ordered_child_ids
            .iter()
            .map(|id| {
                parent
                    .subgroups
                    .iter()
                    .find(|child| child.id == *id)
                    .map(Arc::clone)
                    .ok_or_else(|| {
                        GroupingError::InvalidInput(format!(
                            "{} is not a subgroup of {}",
                            id, parent_group_id
                        ))
                    })
            })
            .collect::<GroupingResult<Forest>>()?;

        let forest =
            tree::try_reorder_subgroups(&self.state.confirmed_groups, parent_group_id, new_order)?;

        self.snapshot();
        self.state.confirmed_groups = forest;
        Ok(SaveHint::Debounced)
    }

    /// Collapsed state is display-only: no snapshot, no save.
    pub fn toggle_collapse(&mut self, group_id: &GroupId) -> GroupingResult<SaveHint> {
        if !tree::contains_group(&self.state.confirmed_groups, group_id) {
            return Err(GroupingError::GroupNotFound(group_id.to_string()));
        }
        self.state.confirmed_groups = tree::toggle_collapse(&self.state.confirmed_groups, group_id);
        Ok(SaveHint::None)
    }

    /// Deletes a group and its subtree. Every diagnosis it held moves to the unsorted list.
    pub fn delete_group(&mut self, group_id: &GroupId) -> GroupingResult<SaveHint> {
        if !tree::contains_group(&self.state.confirmed_groups, group_id) {
            return Err(GroupingError::GroupNotFound(group_id.to_string()));
        }

        self.snapshot();
        let (forest, collected) = tree::delete_group(&self.state.confirmed_groups, group_id);
        tracing::debug!(
            "deleted group {} releasing {} diagnoses",
            group_id,
            collected.len()
        );
        self.state.confirmed_groups = forest;
        self.state.unsorted_diagnoses =
            tree::merge_unsorted(&self.state.unsorted_diagnoses, collected);
        Ok(SaveHint::Debounced)
    }

    /// Confirms the current suggestion as a top-level group, optionally under another name.
    ///
    /// A blank `name` keeps the suggestion's own name.
    pub fn accept_current_suggestion(&mut self, name: Option<&str>) -> GroupingResult<SaveHint> {
        let current = self
            .suggestions
            .current()
            .ok_or(GroupingError::NoCurrentSuggestion)?;

        let chosen = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(current.name.as_str());
        let chosen = group_name(chosen)?;

        self.snapshot();
        let Some(taken) = self.suggestions.take_current() else {
            return Err(GroupingError::NoCurrentSuggestion);
        };
        tracing::debug!("accepted suggestion '{}' as '{}'", taken.name, chosen);
        self.file_into_group(&chosen, taken.diagnoses);
        Ok(SaveHint::Debounced)
    }

    /// Rejects the current suggestion. Its diagnoses go to the unsorted list so they can still
    /// be filed by hand.
    pub fn dismiss_current_suggestion(&mut self) -> GroupingResult<SaveHint> {
        if self.suggestions.current().is_none() {
            return Err(GroupingError::NoCurrentSuggestion);
        }

        self.snapshot();
        let Some(taken) = self.suggestions.take_current() else {
            return Err(GroupingError::NoCurrentSuggestion);
        };
        tracing::debug!("dismissed suggestion '{}'", taken.name);
        self.state.unsorted_diagnoses =
            tree::merge_unsorted(&self.state.unsorted_diagnoses, taken.diagnoses);
        Ok(SaveHint::Debounced)
    }

    /// Explicit save: records an undo point and asks for an immediate write.
    pub fn mark_saved(&mut self) -> SaveHint {
        self.snapshot();
        SaveHint::Immediate
    }

    /// Restores the most recent snapshot. Returns `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<SaveHint> {
        let previous = self.undo.pop()?;
        self.state = previous;
        self.suggestions.reconcile(&self.state);
        Some(SaveHint::Debounced)
    }

    /// Starts over from an empty session. Undo history is discarded.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
        self.undo.clear();
        self.suggestions.reconcile(&self.state);
    }

    pub fn summary(&self) -> WorkspaceSummary {
        fn count_nodes(forest: &[Arc<crate::model::Group>]) -> usize {
            forest
                .iter()
                .map(|g| 1 + count_nodes(&g.subgroups))
                .sum()
        }

        let group_count = self.state.confirmed_groups.len();
        WorkspaceSummary {
            user_id: self.user_id.clone(),
            group_count,
            subgroup_count: count_nodes(&self.state.confirmed_groups) - group_count,
            confirmed_diagnosis_count: tree::diagnosis_ids(&self.state.confirmed_groups).len(),
            unsorted_count: self.state.unsorted_diagnoses.len(),
            suggestions_remaining: self.suggestions.remaining(),
            complete: self.suggestions.is_complete(),
            generated_at: Utc::now(),
        }
    }

    fn snapshot(&mut self) {
        self.undo.push(self.state.clone());
    }

    fn resolve_diagnosis(&self, diagnosis_id: &str) -> GroupingResult<Diagnosis> {
        tree::find_diagnosis(&self.state.confirmed_groups, diagnosis_id)
            .map(|(_, d)| d)
            .or_else(|| {
                self.state
                    .unsorted_diagnoses
                    .iter()
                    .find(|d| d.id == diagnosis_id)
            })
            .or_else(|| self.suggestions.find_diagnosis(diagnosis_id))
            .cloned()
            .ok_or_else(|| GroupingError::DiagnosisNotFound(diagnosis_id.to_string()))
    }

    /// Pulls `diagnoses` out of wherever they sit and files them under the top-level group
    /// `name`.
    fn file_into_group(&mut self, name: &NonEmptyText, diagnoses: Vec<Diagnosis>) {
        let ids: HashSet<String> = diagnoses.iter().map(|d| d.id.clone()).collect();

        let forest = tree::remove_diagnoses(&self.state.confirmed_groups, &ids);
        self.state.confirmed_groups = tree::create_or_merge_group(&forest, name, &diagnoses);
        self.state
            .unsorted_diagnoses
            .retain(|d| !ids.contains(&d.id));
        self.suggestions.drain(&ids);
    }
}

fn group_name(name: &str) -> GroupingResult<NonEmptyText> {
    NonEmptyText::new(name)
        .map_err(|_| GroupingError::InvalidInput("group name cannot be empty".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_catalog;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn workspace() -> Workspace {
        let catalog = parse_catalog(
            r#"{
                "Diabetes": [["E11", "H36"], ["Type 2 diabetes", "Diabetic retinopathy"]],
                "Eye": [["H40", "H25"], ["Glaucoma", "Cataract"]],
                "Cough": [["R05"], ["Cough"]]
            }"#,
        )
        .unwrap();
        Workspace::new("abc1de", SessionState::default(), catalog, 10)
    }

    fn group_id(ws: &Workspace, name: &str) -> GroupId {
        ws.state()
            .confirmed_groups
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.id.clone())
            .unwrap()
    }

    fn top_names(ws: &Workspace) -> Vec<String> {
        ws.state()
            .confirmed_groups
            .iter()
            .map(|g| g.name.clone())
            .collect()
    }

    #[test]
    fn test_accept_suggestion_creates_group_and_advances() {
        let mut ws = workspace();
        assert_eq!(ws.current_suggestion().unwrap().name, "Diabetes");

        let hint = ws.accept_current_suggestion(None).unwrap();
        assert_eq!(hint, SaveHint::Debounced);
        assert_eq!(top_names(&ws), vec!["Diabetes"]);
        assert_eq!(ws.state().confirmed_groups[0].diagnoses.len(), 2);
        assert_eq!(ws.current_suggestion().unwrap().name, "Eye");
    }

    #[test]
    fn test_accept_with_new_name_merges_into_existing_group() {
        let mut ws = workspace();
        ws.create_empty_group("Eye disease").unwrap();
        ws.accept_current_suggestion(Some("Metabolic")).unwrap();
        ws.accept_current_suggestion(Some("eye DISEASE")).unwrap();

        assert_eq!(top_names(&ws), vec!["Eye disease", "Metabolic"]);
        let eye = &ws.state().confirmed_groups[0];
        assert_eq!(eye.diagnoses.len(), 2);
    }

    #[test]
    fn test_dismiss_moves_diagnoses_to_unsorted() {
        let mut ws = workspace();
        ws.dismiss_current_suggestion().unwrap();

        let unsorted: Vec<&str> = ws
            .state()
            .unsorted_diagnoses
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(unsorted, vec!["E11", "H36"]);
        assert_eq!(ws.suggestions().current_index(), 1);
    }

    #[test]
    fn test_working_through_all_suggestions_completes() {
        let mut ws = workspace();
        ws.accept_current_suggestion(None).unwrap();
        ws.dismiss_current_suggestion().unwrap();
        ws.accept_current_suggestion(None).unwrap();

        assert!(ws.suggestions().is_complete());
        assert!(matches!(
            ws.accept_current_suggestion(None),
            Err(GroupingError::NoCurrentSuggestion)
        ));
        assert!(matches!(
            ws.dismiss_current_suggestion(),
            Err(GroupingError::NoCurrentSuggestion)
        ));

        let summary = ws.summary();
        assert!(summary.complete);
        assert_eq!(summary.group_count, 2);
        assert_eq!(summary.confirmed_diagnosis_count, 3);
        assert_eq!(summary.unsorted_count, 2);
        assert_eq!(summary.suggestions_remaining, 0);
    }

    #[test]
    fn test_create_group_from_suggestion_items_drains_them() {
        let mut ws = workspace();
        ws.create_or_merge_group("Retina", &ids(&["H36", "H40"]))
            .unwrap();

        let retina = &ws.state().confirmed_groups[0];
        assert_eq!(retina.diagnoses.len(), 2);

        let diabetes = &ws.suggestions().suggested_groups()[0];
        assert_eq!(diabetes.diagnoses.len(), 1);
        assert!(ws.suggestions().find_diagnosis("H40").is_none());
    }

    #[test]
    fn test_create_or_merge_keeps_uniqueness_across_tree() {
        let mut ws = workspace();
        ws.accept_current_suggestion(None).unwrap();
        let diabetes = group_id(&ws, "Diabetes");
        ws.add_subgroup(&diabetes, "Retinopathy").unwrap();

        ws.create_or_merge_group("Eye", &ids(&["H36"])).unwrap();

        let diabetes = tree::find_group(&ws.state().confirmed_groups, &diabetes).unwrap();
        assert!(!diabetes.holds("H36"));
        assert!(ws.state().confirmed_groups[1].holds("H36"));
    }

    #[test]
    fn test_merge_with_nothing_new_takes_no_snapshot() {
        let mut seeded = workspace();
        seeded.accept_current_suggestion(None).unwrap();
        let mut ws = Workspace::new(
            "abc1de",
            seeded.state().clone(),
            seeded.suggestions().suggested_groups().to_vec(),
            10,
        );
        assert!(!ws.can_undo());

        let before = ws.state().clone();
        assert_eq!(
            ws.create_or_merge_group("diabetes", &ids(&["E11"])).unwrap(),
            SaveHint::None
        );
        assert_eq!(
            ws.create_or_merge_group("DIABETES", &[]).unwrap(),
            SaveHint::None
        );
        assert_eq!(ws.state(), &before);
        assert!(!ws.can_undo());

        assert_eq!(
            ws.create_or_merge_group("Renal", &[]).unwrap(),
            SaveHint::Debounced
        );
        assert!(ws.can_undo());
    }

    #[test]
    fn test_create_or_merge_rejects_blank_and_unknown() {
        let mut ws = workspace();
        assert!(matches!(
            ws.create_or_merge_group("   ", &ids(&["E11"])),
            Err(GroupingError::InvalidInput(_))
        ));
        assert!(matches!(
            ws.create_or_merge_group("X", &ids(&["E11", "NOPE"])),
            Err(GroupingError::DiagnosisNotFound(_))
        ));
        assert!(ws.state().is_empty());
        assert!(!ws.can_undo());
    }

    #[test]
    fn test_create_empty_group_rejects_duplicates() {
        let mut ws = workspace();
        ws.create_empty_group("Cardiac").unwrap();
        assert!(matches!(
            ws.create_empty_group("CARDIAC"),
            Err(GroupingError::DuplicateName(_))
        ));
        assert!(matches!(
            ws.create_empty_group(""),
            Err(GroupingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_move_diagnosis_between_groups_and_from_unsorted() {
        let mut ws = workspace();
        ws.accept_current_suggestion(None).unwrap();
        ws.create_empty_group("Eye").unwrap();
        let eye = group_id(&ws, "Eye");

        assert_eq!(ws.move_diagnosis("H36", &eye).unwrap(), SaveHint::Debounced);
        assert!(ws.state().confirmed_groups[1].holds("H36"));
        assert!(!ws.state().confirmed_groups[0].holds("H36"));

        assert_eq!(ws.move_diagnosis("H36", &eye).unwrap(), SaveHint::None);

        ws.dismiss_current_suggestion().unwrap();
        ws.move_diagnosis("H25", &eye).unwrap();
        assert!(ws.state().unsorted_diagnoses.iter().all(|d| d.id != "H25"));
    }

    #[test]
    fn test_move_rejects_unknown_target_without_change() {
        let mut ws = workspace();
        ws.accept_current_suggestion(None).unwrap();
        let before = ws.state().clone();

        let missing = GroupId::parse("missing").unwrap();
        assert!(matches!(
            ws.move_diagnosis("E11", &missing),
            Err(GroupingError::GroupNotFound(_))
        ));
        let diabetes = group_id(&ws, "Diabetes");
        assert!(matches!(
            ws.move_diagnosis("ZZZ", &diabetes),
            Err(GroupingError::DiagnosisNotFound(_))
        ));
        assert_eq!(ws.state(), &before);
    }

    #[test]
    fn test_move_from_suggestion_drains_it() {
        let mut ws = workspace();
        ws.create_empty_group("Mixed").unwrap();
        let mixed = group_id(&ws, "Mixed");

        ws.move_diagnosis("R05", &mixed).unwrap();
        assert!(ws.suggestions().suggested_groups()[2].is_resolved());
    }

    #[test]
    fn test_reorder_subgroups_validates_permutation() {
        let mut ws = workspace();
        ws.create_empty_group("Diabetes").unwrap();
        let diabetes = group_id(&ws, "Diabetes");
        let (retinopathy, _) = ws.add_subgroup(&diabetes, "Retinopathy").unwrap();
        let (blindness, _) = ws.add_subgroup(&diabetes, "Blindness").unwrap();

        ws.reorder_subgroups(&diabetes, &[blindness.clone(), retinopathy.clone()])
            .unwrap();
        let names: Vec<String> = ws.state().confirmed_groups[0]
            .subgroups
            .iter()
            .map(|g| g.name.clone())
            .collect();
        assert_eq!(names, vec!["Blindness", "Retinopathy"]);

        assert!(matches!(
            ws.reorder_subgroups(&diabetes, &[blindness.clone()]),
            Err(GroupingError::InvalidInput(_))
        ));
        assert!(matches!(
            ws.reorder_subgroups(&diabetes, &[blindness.clone(), blindness]),
            Err(GroupingError::InvalidInput(_))
        ));
        assert!(matches!(
            ws.reorder_subgroups(&retinopathy, &[diabetes]),
            Err(GroupingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_add_subgroup_to_unknown_parent() {
        let mut ws = workspace();
        let missing = GroupId::parse("missing").unwrap();
        assert!(matches!(
            ws.add_subgroup(&missing, "Child"),
            Err(GroupingError::GroupNotFound(_))
        ));
    }

    #[test]
    fn test_toggle_collapse_takes_no_snapshot() {
        let mut ws = workspace();
        ws.create_empty_group("Eye").unwrap();
        let eye = group_id(&ws, "Eye");
        ws.mark_saved();
        let undo_depth = ws.undo.len();

        assert_eq!(ws.toggle_collapse(&eye).unwrap(), SaveHint::None);
        assert!(ws.state().confirmed_groups[0].collapsed);
        assert_eq!(ws.undo.len(), undo_depth);
    }

    #[test]
    fn test_delete_group_reflows_into_unsorted() {
        let mut ws = workspace();
        ws.accept_current_suggestion(None).unwrap();
        let diabetes = group_id(&ws, "Diabetes");
        let (sub, _) = ws.add_subgroup(&diabetes, "Retinopathy").unwrap();
        ws.move_diagnosis("H36", &sub).unwrap();

        ws.delete_group(&diabetes).unwrap();
        assert!(ws.state().confirmed_groups.is_empty());

        let unsorted: Vec<&str> = ws
            .state()
            .unsorted_diagnoses
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(unsorted, vec!["E11", "H36"]);
    }

    #[test]
    fn test_undo_restores_previous_state_and_suggestions() {
        let mut ws = workspace();
        let before = ws.state().clone();
        ws.accept_current_suggestion(None).unwrap();
        assert_eq!(ws.current_suggestion().unwrap().name, "Eye");

        assert_eq!(ws.undo(), Some(SaveHint::Debounced));
        assert_eq!(ws.state(), &before);
        assert_eq!(ws.current_suggestion().unwrap().name, "Diabetes");
        assert_eq!(ws.undo(), None);
    }

    #[test]
    fn test_undo_round_trip_for_each_mutation() {
        let mut ws = workspace();
        ws.accept_current_suggestion(None).unwrap();
        ws.create_empty_group("Eye").unwrap();
        let diabetes = group_id(&ws, "Diabetes");
        let eye = group_id(&ws, "Eye");
        let (first, _) = ws.add_subgroup(&diabetes, "Retinopathy").unwrap();
        let (second, _) = ws.add_subgroup(&diabetes, "Nephropathy").unwrap();

        let mutations: Vec<Box<dyn Fn(&mut Workspace)>> = vec![
            Box::new(move |ws: &mut Workspace| {
                ws.move_diagnosis("E11", &eye).unwrap();
            }),
            Box::new({
                let diabetes = diabetes.clone();
                move |ws: &mut Workspace| {
                    ws.add_subgroup(&diabetes, "Child").unwrap();
                }
            }),
            Box::new({
                let diabetes = diabetes.clone();
                move |ws: &mut Workspace| {
                    ws.reorder_subgroups(&diabetes, &[second.clone(), first.clone()])
                        .unwrap();
                }
            }),
            Box::new({
                let diabetes = diabetes.clone();
                move |ws: &mut Workspace| {
                    ws.delete_group(&diabetes).unwrap();
                }
            }),
            Box::new(|ws: &mut Workspace| {
                ws.create_or_merge_group("New", &ids(&["R05"])).unwrap();
            }),
            Box::new(|ws: &mut Workspace| {
                ws.create_empty_group("Renal").unwrap();
            }),
            Box::new(|ws: &mut Workspace| {
                ws.accept_current_suggestion(Some("Ophthalmic")).unwrap();
            }),
            Box::new(|ws: &mut Workspace| {
                ws.dismiss_current_suggestion().unwrap();
            }),
        ];

        for mutate in mutations {
            let before = ws.state().clone();
            let suggestion = ws.current_suggestion().cloned();
            mutate(&mut ws);
            assert_ne!(ws.state(), &before);
            assert_eq!(ws.undo(), Some(SaveHint::Debounced));
            assert_eq!(ws.state(), &before);
            assert_eq!(ws.current_suggestion().cloned(), suggestion);
        }

        let before = ws.state().clone();
        assert_eq!(ws.mark_saved(), SaveHint::Immediate);
        assert_eq!(ws.undo(), Some(SaveHint::Debounced));
        assert_eq!(ws.state(), &before);
    }

    #[test]
    fn test_undo_capacity_is_bounded() {
        let catalog = Vec::new();
        let mut ws = Workspace::new("u", SessionState::default(), catalog, 2);
        for name in ["A", "B", "C"] {
            ws.create_empty_group(name).unwrap();
        }

        assert!(ws.undo().is_some());
        assert!(ws.undo().is_some());
        assert!(ws.undo().is_none());
        assert_eq!(top_names(&ws), vec!["A"]);
    }

    #[test]
    fn test_loaded_state_filters_suggestions() {
        let catalog = parse_catalog(r#"{"Eye": [["H40", "H25"], ["Glaucoma", "Cataract"]]}"#)
            .unwrap();
        let state = SessionState::from_json(
            r#"{"confirmedGroups":[{"id":"g1","name":"Eye","diagnoses":[{"id":"H40","name":"Glaucoma"}]}],
                "unsortedDiagnoses":[{"id":"H25","name":"Cataract"}]}"#,
        )
        .unwrap();

        let ws = Workspace::new("u", state, catalog, 10);
        assert!(ws.suggestions().is_complete());
    }

    #[test]
    fn test_reset_clears_state_and_history() {
        let mut ws = workspace();
        ws.accept_current_suggestion(None).unwrap();
        ws.reset();

        assert!(ws.state().is_empty());
        assert!(!ws.can_undo());
        assert_eq!(ws.current_suggestion().unwrap().name, "Diabetes");
    }
}
