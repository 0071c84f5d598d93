//! Role and locality gated action-menu construction.
//!
//! A single pure function decides which actions the record page offers, so no
//! view component branches on role inline. The returned actions are tagged
//! with the menu group they render under.

use lgp_types::Role;

/// Menu group an action renders under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    /// Changes the stored record set.
    Update,
    /// Reads the stored record set.
    Download,
}

/// An action link the record page may offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordAction {
    /// Add scanned files to the record set.
    Upload,
    /// Remove a chosen subset of files.
    RemoveSelection,
    /// Permanently remove the whole record set.
    RemoveAll,
    /// Download the whole record set as a zip.
    DownloadAll,
    /// Download the whole record set, then remove it from storage.
    DownloadAndRemove,
}

/// A permitted action plus its presentation tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MenuAction {
    pub action: RecordAction,
    pub kind: ActionKind,

    /// The action must not proceed without an explicit confirmation step.
    pub requires_confirmation: bool,
}

impl MenuAction {
    /// Whether this action changes or destroys stored records.
    pub fn is_mutating(&self) -> bool {
        !matches!(self.action, RecordAction::DownloadAll)
    }
}

/// Builds the ordered list of permitted actions for the Lloyd George record
/// page.
///
/// Gating rules:
/// - `GP_CLINICAL` is excluded from every mutating or destructive action.
/// - Actions that operate on an existing record are hidden when none exists.
/// - The combined download-and-remove action only appears for `GP_ADMIN`
///   outside the local-office boundary, and always carries the two-step
///   confirmation requirement.
/// - `PCSE` never sees Lloyd-George-specific actions; the generic electronic
///   document flow applies to that role instead.
pub fn permitted_actions(role: Role, has_record: bool, is_bsol: bool) -> Vec<MenuAction> {
    let mut actions = Vec::new();

    if role == Role::Pcse {
        return actions;
    }

    if role == Role::GpAdmin {
        actions.push(MenuAction {
            action: RecordAction::Upload,
            kind: ActionKind::Update,
            requires_confirmation: false,
        });

        if has_record {
            actions.push(MenuAction {
                action: RecordAction::RemoveSelection,
                kind: ActionKind::Update,
                requires_confirmation: false,
            });
            actions.push(MenuAction {
                action: RecordAction::RemoveAll,
                kind: ActionKind::Update,
                requires_confirmation: true,
            });
        }
    }

    if has_record {
        actions.push(MenuAction {
            action: RecordAction::DownloadAll,
            kind: ActionKind::Download,
            requires_confirmation: false,
        });
    }

    if role == Role::GpAdmin && has_record && !is_bsol {
        actions.push(MenuAction {
            action: RecordAction::DownloadAndRemove,
            kind: ActionKind::Download,
            requires_confirmation: true,
        });
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action_list(role: Role, has_record: bool, is_bsol: bool) -> Vec<RecordAction> {
        permitted_actions(role, has_record, is_bsol)
            .into_iter()
            .map(|m| m.action)
            .collect()
    }

    #[test]
    fn gp_clinical_never_receives_a_mutating_action() {
        for has_record in [false, true] {
            for is_bsol in [false, true] {
                let actions = permitted_actions(Role::GpClinical, has_record, is_bsol);
                assert!(
                    actions.iter().all(|a| !a.is_mutating()),
                    "mutating action offered to GP_CLINICAL with record={has_record} bsol={is_bsol}"
                );
            }
        }
    }

    #[test]
    fn gp_clinical_can_download_an_existing_record() {
        assert_eq!(
            action_list(Role::GpClinical, true, true),
            vec![RecordAction::DownloadAll]
        );
        assert!(action_list(Role::GpClinical, false, true).is_empty());
    }

    #[test]
    fn pcse_sees_no_lloyd_george_actions() {
        for has_record in [false, true] {
            for is_bsol in [false, true] {
                assert!(action_list(Role::Pcse, has_record, is_bsol).is_empty());
            }
        }
    }

    #[test]
    fn gp_admin_inside_boundary_gets_no_combined_action() {
        let actions = action_list(Role::GpAdmin, true, true);
        assert_eq!(
            actions,
            vec![
                RecordAction::Upload,
                RecordAction::RemoveSelection,
                RecordAction::RemoveAll,
                RecordAction::DownloadAll,
            ]
        );
    }

    #[test]
    fn gp_admin_outside_boundary_gets_confirmed_combined_action() {
        let actions = permitted_actions(Role::GpAdmin, true, false);
        let combined = actions
            .iter()
            .find(|a| a.action == RecordAction::DownloadAndRemove)
            .expect("combined action present");
        assert!(combined.requires_confirmation);
        assert_eq!(combined.kind, ActionKind::Download);

        // The combined action renders last.
        assert_eq!(
            actions.last().map(|a| a.action),
            Some(RecordAction::DownloadAndRemove)
        );
    }

    #[test]
    fn record_dependent_actions_hide_without_a_record() {
        assert_eq!(
            action_list(Role::GpAdmin, false, false),
            vec![RecordAction::Upload]
        );
    }
}
