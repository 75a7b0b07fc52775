use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::contract::model::{NewNotification, Notification, Role, User};

/// Which notifications "mark all as read" touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkReadScope {
    /// Only notifications visible to the viewer.
    #[default]
    Visible,
    /// Every notification in the store.
    Global,
}

/// Broadcasts (no recipients) reach every non-student viewer;
/// targeted notifications reach listed user ids and members of listed roles.
pub fn visible_to(notification: &Notification, viewer: &User) -> bool {
    if notification.is_broadcast() {
        return viewer.role != Role::Student;
    }
    notification.recipient_user_ids.contains(&viewer.id)
        || notification.recipient_roles.contains(&viewer.role)
}

/// Notification store. Grows monotonically; only the read flag ever changes.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    items: RwLock<Vec<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, spec: NewNotification) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            title: spec.title,
            description: spec.description,
            timestamp: Utc::now(),
            read: false,
            recipient_user_ids: spec.recipient_user_ids,
            recipient_roles: spec.recipient_roles,
            link_to: spec.link_to,
        };
        debug!(
            notification_id = %notification.id,
            broadcast = notification.is_broadcast(),
            "notification stored"
        );
        self.items.write().push(notification.clone());
        notification
    }

    /// Notifications visible to `viewer`, newest first.
    pub fn list_for(&self, viewer: &User) -> Vec<Notification> {
        self.items
            .read()
            .iter()
            .rev()
            .filter(|n| visible_to(n, viewer))
            .cloned()
            .collect()
    }

    pub fn unread_count(&self, viewer: &User) -> usize {
        self.items
            .read()
            .iter()
            .filter(|n| !n.read && visible_to(n, viewer))
            .count()
    }

    /// Returns false if no notification has this id.
    pub fn mark_read(&self, id: Uuid) -> bool {
        match self.items.write().iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    /// Marks unread notifications as read; returns how many changed.
    pub fn mark_all_read(&self, viewer: &User, scope: MarkReadScope) -> usize {
        let mut changed = 0;
        for n in self.items.write().iter_mut() {
            let in_scope = match scope {
                MarkReadScope::Visible => visible_to(n, viewer),
                MarkReadScope::Global => true,
            };
            if in_scope && !n.read {
                n.read = true;
                changed += 1;
            }
        }
        changed
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}
