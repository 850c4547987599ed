use crate::errors::{Result, StoreError};
use crate::events::DomainEvent;
use crate::kv::{K_NOTIFICATIONS, KvStore};
use crate::models::{JobStatus, Notification, NotificationKind, new_id, now};
use crate::seed;

/// Per-user notification feed over one global collection.
pub struct NotificationsStore<'a> {
    kv: &'a KvStore,
}

impl<'a> NotificationsStore<'a> {
    pub fn new(kv: &'a KvStore) -> Self {
        Self { kv }
    }

    pub fn all(&self) -> Vec<Notification> {
        match self.kv.get_as(K_NOTIFICATIONS) {
            Some(notifications) => notifications,
            None => {
                let notifications = seed::notifications();
                let _ = self.kv.set_as(K_NOTIFICATIONS, &notifications);
                notifications
            }
        }
    }

    fn save(&self, notifications: &[Notification]) -> Result<()> {
        self.kv.set_as(K_NOTIFICATIONS, &notifications)
    }

    /// Newest first.
    pub fn for_user(&self, user_id: &str) -> Vec<Notification> {
        let mut mine: Vec<Notification> = self
            .all()
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        mine
    }

    pub fn unread_count(&self, user_id: &str) -> usize {
        self.all()
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count()
    }

    pub fn push(
        &self,
        user_id: &str,
        kind: NotificationKind,
        message: &str,
        job_id: Option<&str>,
    ) -> Result<Notification> {
        let notification = Notification {
            id: new_id(),
            user_id: user_id.to_string(),
            kind,
            message: message.to_string(),
            read: false,
            job_id: job_id.map(str::to_string),
            created_at: now(),
        };
        let mut notifications = self.all();
        notifications.push(notification.clone());
        self.save(&notifications)?;
        Ok(notification)
    }

    pub fn mark_read(&self, id: &str) -> Result<()> {
        let mut notifications = self.all();
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| StoreError::not_found("notification", id))?;
        notification.read = true;
        self.save(&notifications)
    }

    pub fn mark_all_read(&self, user_id: &str) -> Result<()> {
        let mut notifications = self.all();
        for notification in notifications.iter_mut() {
            if notification.user_id == user_id {
                notification.read = true;
            }
        }
        self.save(&notifications)
    }

    /// Subscriber side of the jobs outbox: job activity becomes feed
    /// entries for whoever is on the other side of it.
    pub fn apply_event(&self, event: &DomainEvent) -> Result<()> {
        match event {
            DomainEvent::JobPosted { .. } => Ok(()),
            DomainEvent::TechnicianApplied {
                job_id,
                title,
                advertiser_id,
                technician_name,
            } => {
                self.push(
                    advertiser_id,
                    NotificationKind::Info,
                    &format!("{technician_name} applied to \"{title}\""),
                    Some(job_id),
                )?;
                Ok(())
            }
            DomainEvent::TechnicianAssigned {
                job_id,
                title,
                technician_id,
            } => {
                self.push(
                    technician_id,
                    NotificationKind::Success,
                    &format!("You were assigned to \"{title}\""),
                    Some(job_id),
                )?;
                Ok(())
            }
            DomainEvent::StatusChanged {
                job_id,
                title,
                advertiser_id,
                assigned_technician_id,
                to,
                ..
            } => {
                let kind = match to {
                    JobStatus::Disputed => NotificationKind::Warning,
                    JobStatus::Paid | JobStatus::Completed => NotificationKind::Success,
                    _ => NotificationKind::Info,
                };
                self.push(
                    advertiser_id,
                    kind,
                    &format!("\"{title}\" moved to {to}"),
                    Some(job_id),
                )?;
                if let Some(technician_id) = assigned_technician_id {
                    self.push(
                        technician_id,
                        kind,
                        &format!("\"{title}\" moved to {to}"),
                        Some(job_id),
                    )?;
                }
                Ok(())
            }
        }
    }
}
