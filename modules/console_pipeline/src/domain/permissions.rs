//! Capability checks and pure updates over [`PermissionMatrix`].
//!
//! Invariant kept by every update: any write capability implies `read`.

use crate::contract::model::{Action, PermissionMatrix, PermissionSet, ResourceName, Role, User};

/// Absent resource entry denies every action.
pub fn has_permission(user: &User, resource: ResourceName, action: Action) -> bool {
    user.permissions
        .get(resource)
        .is_some_and(|set| set.allows(action))
}

/// Returns a new matrix with one capability changed.
///
/// Revoking `read` clears every write capability and drops the entry if nothing remains.
/// Granting a write capability also grants `read`.
pub fn set_permission(
    matrix: &PermissionMatrix,
    resource: ResourceName,
    action: Action,
    value: bool,
) -> PermissionMatrix {
    let current = matrix.get(resource).copied().unwrap_or_default();

    let next = match (action, value) {
        (Action::Read, false) => PermissionSet::default(),
        (a, true) if a.is_write() => current.with_flag(a, true).with_flag(Action::Read, true),
        (a, v) => current.with_flag(a, v),
    };

    if next.is_empty() {
        matrix.without_entry(resource)
    } else {
        matrix.with_entry(resource, next)
    }
}

/// All four capabilities on (`true`) or the entry removed (`false`).
pub fn set_full_access(
    matrix: &PermissionMatrix,
    resource: ResourceName,
    value: bool,
) -> PermissionMatrix {
    if value {
        matrix.with_entry(resource, PermissionSet::full())
    } else {
        matrix.without_entry(resource)
    }
}

const EMPLOYEE_FULL: [ResourceName; 5] = [
    ResourceName::Contacts,
    ResourceName::Crm,
    ResourceName::Visitors,
    ResourceName::Calendar,
    ResourceName::Tasks,
];

const EMPLOYEE_READ_ONLY: [ResourceName; 3] = [
    ResourceName::Dashboard,
    ResourceName::Accounting,
    ResourceName::Reports,
];

/// Seed matrix for a newly created user of `role`.
pub fn default_matrix_for(role: Role) -> PermissionMatrix {
    match role {
        Role::Admin => ResourceName::ALL
            .into_iter()
            .map(|r| (r, PermissionSet::full()))
            .collect(),
        Role::Employee => EMPLOYEE_FULL
            .into_iter()
            .map(|r| (r, PermissionSet::full()))
            .chain(
                EMPLOYEE_READ_ONLY
                    .into_iter()
                    .map(|r| (r, PermissionSet::read_only())),
            )
            .collect(),
        Role::Student => [(ResourceName::Lms, PermissionSet::read_only())]
            .into_iter()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user_with(matrix: PermissionMatrix) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Eve Employee".into(),
            email: "eve@example.com".into(),
            role: Role::Employee,
            permissions: matrix,
            must_reset_password: false,
        }
    }

    fn write_implies_read(m: &PermissionMatrix) -> bool {
        m.iter()
            .all(|(_, s)| !(s.create || s.update || s.delete) || s.read)
    }

    #[test]
    fn absent_entry_denies_everything() {
        let user = user_with(PermissionMatrix::new());
        for r in ResourceName::ALL {
            for a in Action::ALL {
                assert!(!has_permission(&user, r, a));
            }
        }
    }

    #[test]
    fn has_permission_matches_flag_for_every_combination() {
        let m = set_permission(&PermissionMatrix::new(), ResourceName::Crm, Action::Update, true);
        let user = user_with(m.clone());
        for r in ResourceName::ALL {
            for a in Action::ALL {
                let expected = m.get(r).is_some_and(|s| s.allows(a));
                assert_eq!(has_permission(&user, r, a), expected, "{r} {a}");
            }
        }
        assert!(has_permission(&user, ResourceName::Crm, Action::Read));
        assert!(!has_permission(&user, ResourceName::Crm, Action::Create));
    }

    #[test]
    fn granting_write_forces_read() {
        for a in [Action::Create, Action::Update, Action::Delete] {
            let m = set_permission(&PermissionMatrix::new(), ResourceName::Contacts, a, true);
            let set = m.get(ResourceName::Contacts).unwrap();
            assert!(set.read);
            assert!(set.allows(a));
        }
    }

    #[test]
    fn revoking_read_clears_writes_and_removes_entry() {
        let m = set_full_access(&PermissionMatrix::new(), ResourceName::Accounting, true);
        let m = set_permission(&m, ResourceName::Accounting, Action::Read, false);
        assert!(!m.contains(ResourceName::Accounting));
    }

    #[test]
    fn revoking_last_write_keeps_read_entry() {
        let m = set_permission(&PermissionMatrix::new(), ResourceName::Tasks, Action::Delete, true);
        let m = set_permission(&m, ResourceName::Tasks, Action::Delete, false);
        assert_eq!(m.get(ResourceName::Tasks), Some(&PermissionSet::read_only()));
    }

    #[test]
    fn revoking_only_flag_drops_entry() {
        let m = set_permission(&PermissionMatrix::new(), ResourceName::Tasks, Action::Read, true);
        let m = set_permission(&m, ResourceName::Tasks, Action::Read, false);
        assert!(m.is_empty());
    }

    #[test]
    fn updates_never_touch_the_input() {
        let original = default_matrix_for(Role::Employee);
        let snapshot = original.clone();

        let _ = set_permission(&original, ResourceName::Crm, Action::Read, false);
        let _ = set_full_access(&original, ResourceName::Settings, true);

        assert_eq!(original, snapshot);
    }

    #[test]
    fn sequences_of_updates_preserve_write_implies_read() {
        let mut m = PermissionMatrix::new();
        let steps = [
            (ResourceName::Crm, Action::Create, true),
            (ResourceName::Crm, Action::Read, false),
            (ResourceName::Crm, Action::Delete, true),
            (ResourceName::Contacts, Action::Read, true),
            (ResourceName::Contacts, Action::Update, true),
            (ResourceName::Contacts, Action::Read, false),
            (ResourceName::Crm, Action::Update, false),
        ];
        for (r, a, v) in steps {
            m = set_permission(&m, r, a, v);
            assert!(write_implies_read(&m));
        }
        assert_eq!(
            m.get(ResourceName::Crm),
            Some(&PermissionSet {
                read: true,
                create: false,
                update: false,
                delete: true
            })
        );
        assert!(!m.contains(ResourceName::Contacts));
    }

    #[test]
    fn full_access_round_trip_removes_resource() {
        let base = default_matrix_for(Role::Student);
        let on = set_full_access(&base, ResourceName::Contacts, true);
        assert_eq!(on.get(ResourceName::Contacts), Some(&PermissionSet::full()));

        let off = set_full_access(&on, ResourceName::Contacts, false);
        assert!(!off.contains(ResourceName::Contacts));
        assert_eq!(off, base);
    }

    #[test]
    fn admin_default_is_full_everywhere() {
        let m = default_matrix_for(Role::Admin);
        assert_eq!(m.len(), ResourceName::ALL.len());
        assert!(m.iter().all(|(_, s)| s.is_full()));
    }

    #[test]
    fn employee_default_splits_full_read_only_and_none() {
        let m = default_matrix_for(Role::Employee);
        for r in EMPLOYEE_FULL {
            assert!(m.get(r).unwrap().is_full(), "{r}");
        }
        for r in EMPLOYEE_READ_ONLY {
            assert_eq!(m.get(r), Some(&PermissionSet::read_only()), "{r}");
        }
        for r in [ResourceName::Lms, ResourceName::Settings, ResourceName::AccessControl] {
            assert!(!m.contains(r), "{r}");
        }
    }

    #[test]
    fn student_default_reads_only_lms() {
        let m = default_matrix_for(Role::Student);
        assert_eq!(m.len(), 1);
        assert_eq!(m.get(ResourceName::Lms), Some(&PermissionSet::read_only()));
    }
}
