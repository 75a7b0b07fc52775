use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
/// Opaque entity id as issued by the remote data API.
pub type EntityId = String;
/// One entity of a canonical collection; the pipeline never looks inside.
pub type Entity = serde_json::Value;
/// The complete, authoritative list of entities of one resource.
pub type Collection = Vec<Entity>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Employee,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Employee => "Employee",
            Role::Student => "Student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gated capability area. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceName {
    Dashboard,
    Contacts,
    #[serde(rename = "CRM")]
    Crm,
    Accounting,
    Visitors,
    Calendar,
    Tasks,
    #[serde(rename = "LMS")]
    Lms,
    Reports,
    Settings,
    #[serde(rename = "Access Control")]
    AccessControl,
}

impl ResourceName {
    pub const ALL: [ResourceName; 11] = [
        ResourceName::Dashboard,
        ResourceName::Contacts,
        ResourceName::Crm,
        ResourceName::Accounting,
        ResourceName::Visitors,
        ResourceName::Calendar,
        ResourceName::Tasks,
        ResourceName::Lms,
        ResourceName::Reports,
        ResourceName::Settings,
        ResourceName::AccessControl,
    ];

    /// Display name, identical to the serialized tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceName::Dashboard => "Dashboard",
            ResourceName::Contacts => "Contacts",
            ResourceName::Crm => "CRM",
            ResourceName::Accounting => "Accounting",
            ResourceName::Visitors => "Visitors",
            ResourceName::Calendar => "Calendar",
            ResourceName::Tasks => "Tasks",
            ResourceName::Lms => "LMS",
            ResourceName::Reports => "Reports",
            ResourceName::Settings => "Settings",
            ResourceName::AccessControl => "Access Control",
        }
    }

    /// URL path segment used by the remote data API.
    pub fn slug(&self) -> &'static str {
        match self {
            ResourceName::Dashboard => "dashboard",
            ResourceName::Contacts => "contacts",
            ResourceName::Crm => "crm",
            ResourceName::Accounting => "accounting",
            ResourceName::Visitors => "visitors",
            ResourceName::Calendar => "calendar",
            ResourceName::Tasks => "tasks",
            ResourceName::Lms => "lms",
            ResourceName::Reports => "reports",
            ResourceName::Settings => "settings",
            ResourceName::AccessControl => "access-control",
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource '{0}'")]
pub struct UnknownResource(pub String);

impl FromStr for ResourceName {
    type Err = UnknownResource;

    /// Accepts the display name or the slug, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        ResourceName::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(needle) || r.slug().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownResource(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Read, Action::Create, Action::Update, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Action::Read)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Four capabilities on one resource. Any write capability implies `read`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "PermissionFlags")]
pub struct PermissionSet {
    pub read: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

/// Wire form of [`PermissionSet`]; missing flags are false.
#[derive(Deserialize)]
struct PermissionFlags {
    #[serde(default)]
    read: bool,
    #[serde(default)]
    create: bool,
    #[serde(default)]
    update: bool,
    #[serde(default)]
    delete: bool,
}

impl From<PermissionFlags> for PermissionSet {
    fn from(f: PermissionFlags) -> Self {
        Self {
            read: f.read || f.create || f.update || f.delete,
            create: f.create,
            update: f.update,
            delete: f.delete,
        }
    }
}

impl PermissionSet {
    pub const fn full() -> Self {
        Self {
            read: true,
            create: true,
            update: true,
            delete: true,
        }
    }

    pub const fn read_only() -> Self {
        Self {
            read: true,
            create: false,
            update: false,
            delete: false,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Read => self.read,
            Action::Create => self.create,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }

    pub fn is_full(&self) -> bool {
        self.read && self.create && self.update && self.delete
    }

    pub fn is_empty(&self) -> bool {
        !(self.read || self.create || self.update || self.delete)
    }

    /// Raw single-flag update; invariants are enforced by `domain::permissions`.
    pub(crate) fn with_flag(mut self, action: Action, value: bool) -> Self {
        match action {
            Action::Read => self.read = value,
            Action::Create => self.create = value,
            Action::Update => self.update = value,
            Action::Delete => self.delete = value,
        }
        self
    }
}

/// Per-user capability matrix. Immutable value: every update yields a new matrix.
///
/// Resources with no capability have no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<ResourceName, PermissionSet>",
    from = "BTreeMap<ResourceName, PermissionSet>"
)]
pub struct PermissionMatrix(BTreeMap<ResourceName, PermissionSet>);

impl PermissionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, resource: ResourceName) -> Option<&PermissionSet> {
        self.0.get(&resource)
    }

    pub fn contains(&self, resource: ResourceName) -> bool {
        self.0.contains_key(&resource)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceName, &PermissionSet)> {
        self.0.iter().map(|(r, s)| (*r, s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn with_entry(&self, resource: ResourceName, set: PermissionSet) -> Self {
        let mut next = self.0.clone();
        next.insert(resource, set);
        Self(next)
    }

    pub(crate) fn without_entry(&self, resource: ResourceName) -> Self {
        let mut next = self.0.clone();
        next.remove(&resource);
        Self(next)
    }
}

impl From<BTreeMap<ResourceName, PermissionSet>> for PermissionMatrix {
    fn from(mut entries: BTreeMap<ResourceName, PermissionSet>) -> Self {
        entries.retain(|_, set| !set.is_empty());
        Self(entries)
    }
}

impl From<PermissionMatrix> for BTreeMap<ResourceName, PermissionSet> {
    fn from(matrix: PermissionMatrix) -> Self {
        matrix.0
    }
}

impl FromIterator<(ResourceName, PermissionSet)> for PermissionMatrix {
    fn from_iter<I: IntoIterator<Item = (ResourceName, PermissionSet)>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<BTreeMap<_, _>>())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub permissions: PermissionMatrix,
    #[serde(default)]
    pub must_reset_password: bool,
}

/// Data for creating a staff or student account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStaff {
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: u64,
    pub actor_name: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

/// Deep-link target of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    pub resource: ResourceName,
    pub id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    #[serde(default)]
    pub recipient_user_ids: BTreeSet<UserId>,
    #[serde(default)]
    pub recipient_roles: BTreeSet<Role>,
    #[serde(default)]
    pub link_to: Option<LinkTarget>,
}

impl Notification {
    pub fn is_broadcast(&self) -> bool {
        self.recipient_user_ids.is_empty() && self.recipient_roles.is_empty()
    }
}

/// Notification request; id, timestamp and read flag are assigned on creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub link_to: Option<LinkTarget>,
    #[serde(default)]
    pub recipient_user_ids: BTreeSet<UserId>,
    #[serde(default)]
    pub recipient_roles: BTreeSet<Role>,
}

impl NewNotification {
    /// No recipients: reaches every non-student viewer.
    pub fn broadcast(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn to_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.recipient_roles.extend(roles);
        self
    }

    pub fn to_users(mut self, ids: impl IntoIterator<Item = UserId>) -> Self {
        self.recipient_user_ids.extend(ids);
        self
    }

    pub fn linked(mut self, resource: ResourceName, id: impl Into<EntityId>) -> Self {
        self.link_to = Some(LinkTarget {
            resource,
            id: id.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    Create { payload: Entity },
    Update { id: EntityId, payload: Entity },
    Delete { id: EntityId },
}

impl MutationKind {
    pub fn action(&self) -> Action {
        match self {
            MutationKind::Create { .. } => Action::Create,
            MutationKind::Update { .. } => Action::Update,
            MutationKind::Delete { .. } => Action::Delete,
        }
    }
}

/// One write against a resource, with its optional audit and notification side effects.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationCommand {
    pub resource: ResourceName,
    pub kind: MutationKind,
    /// Audit action text, recorded under the real identity on success.
    pub audit: Option<String>,
    pub notify: Option<NewNotification>,
}

impl MutationCommand {
    pub fn create(resource: ResourceName, payload: Entity) -> Self {
        Self::new(resource, MutationKind::Create { payload })
    }

    pub fn update(resource: ResourceName, id: impl Into<EntityId>, payload: Entity) -> Self {
        Self::new(
            resource,
            MutationKind::Update {
                id: id.into(),
                payload,
            },
        )
    }

    pub fn delete(resource: ResourceName, id: impl Into<EntityId>) -> Self {
        Self::new(resource, MutationKind::Delete { id: id.into() })
    }

    fn new(resource: ResourceName, kind: MutationKind) -> Self {
        Self {
            resource,
            kind,
            audit: None,
            notify: None,
        }
    }

    pub fn audited(mut self, action: impl Into<String>) -> Self {
        self.audit = Some(action.into());
        self
    }

    pub fn notifying(mut self, notification: NewNotification) -> Self {
        self.notify = Some(notification);
        self
    }

    pub fn action(&self) -> Action {
        self.kind.action()
    }
}

/// Result of a gated pipeline call that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// The returned collection replaced local state.
    Applied {
        resource: ResourceName,
        collection: Arc<Collection>,
        sequence: u64,
    },
    /// The effective identity lacks the capability; nothing was sent.
    Denied {
        resource: ResourceName,
        action: Action,
    },
    /// The write succeeded remotely but a newer response was already applied.
    Superseded { resource: ResourceName, sequence: u64 },
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, MutationOutcome::Denied { .. })
    }

    pub fn collection(&self) -> Option<&Arc<Collection>> {
        match self {
            MutationOutcome::Applied { collection, .. } => Some(collection),
            _ => None,
        }
    }
}
