use crate::customers::CustomersStore;
use crate::errors::Result;
use crate::kv::KvStore;
use crate::models::JobStatus;
use crate::notifications::NotificationsStore;

/// Emitted by the jobs store instead of reaching into other stores. The
/// caller routes them through `dispatch`, which keeps the coupling between
/// jobs and customer/notification bookkeeping in one visible place.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    JobPosted {
        job_id: String,
        title: String,
        advertiser_id: String,
        customer_id: Option<String>,
        advertiser_value: Option<f64>,
    },
    TechnicianApplied {
        job_id: String,
        title: String,
        advertiser_id: String,
        technician_name: String,
    },
    TechnicianAssigned {
        job_id: String,
        title: String,
        technician_id: String,
    },
    StatusChanged {
        job_id: String,
        title: String,
        advertiser_id: String,
        assigned_technician_id: Option<String>,
        from: JobStatus,
        to: JobStatus,
    },
}

pub fn dispatch(kv: &KvStore, events: &[DomainEvent]) -> Result<()> {
    let customers = CustomersStore::new(kv);
    let notifications = NotificationsStore::new(kv);
    for event in events {
        customers.apply_event(event)?;
        notifications.apply_event(event)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customers::{CustomerDraft, CustomersStore};
    use crate::jobs::JobsStore;
    use crate::kv::testutil::temp_store;
    use crate::models::{JobDraft, PaymentType, TechStats, User, UserType, now};
    use crate::notifications::NotificationsStore;

    fn user(id: &str, user_type: UserType) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@x.com"),
            username: id.to_string(),
            password: "pw".to_string(),
            user_type,
            name: id.to_string(),
            phone: None,
            address: None,
            bio: None,
            avatar: None,
            skills: Default::default(),
            overall_rating: 0.0,
            total_reviews: 0,
            stats: TechStats::default(),
            created_at: now(),
        }
    }

    /// Post-for-customer flow end to end: the job store only emits, the
    /// subscribers do the bookkeeping.
    #[test]
    fn posting_updates_customer_through_the_outbox() {
        let (_dir, kv) = temp_store();
        let adv = user("adv", UserType::Advertiser);
        let customer = CustomersStore::new(&kv)
            .add(
                &adv,
                CustomerDraft {
                    name: "Jones".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();

        let (_, events) = JobsStore::new(&kv)
            .add_job(
                &adv,
                JobDraft {
                    title: "Water heater".to_string(),
                    description: String::new(),
                    category: "Plumbing".to_string(),
                    payment_type: Some(PaymentType::ProfitShare),
                    estimated_profit: Some(100.0),
                    profit_share_percentage: Some(50.0),
                    customer_id: Some(customer.id.clone()),
                    publish: true,
                    ..Default::default()
                },
            )
            .unwrap();

        // Nothing changed yet: emitting is not applying.
        assert_eq!(
            CustomersStore::new(&kv).get(&customer.id).unwrap().total_spent,
            0.0
        );

        dispatch(&kv, &events).unwrap();
        let updated = CustomersStore::new(&kv).get(&customer.id).unwrap();
        assert_eq!(updated.total_spent, 50.0);
        assert_eq!(updated.total_jobs, 1);
    }

    #[test]
    fn apply_and_assign_feed_notifications() {
        let (_dir, kv) = temp_store();
        let adv = user("adv", UserType::Advertiser);
        let tech = user("tech", UserType::Technician);
        let jobs = JobsStore::new(&kv);

        let (job, events) = jobs
            .add_job(
                &adv,
                JobDraft {
                    title: "Panel upgrade".to_string(),
                    category: "Electrical".to_string(),
                    publish: true,
                    ..Default::default()
                },
            )
            .unwrap();
        dispatch(&kv, &events).unwrap();

        let (_, events) = jobs.apply_to_job(&tech, &job.id).unwrap();
        dispatch(&kv, &events).unwrap();
        let (_, events) = jobs.assign_technician(&job.id, &tech.id, &tech.name).unwrap();
        dispatch(&kv, &events).unwrap();

        let notifications = NotificationsStore::new(&kv);
        assert_eq!(notifications.unread_count(&adv.id), 1);
        assert_eq!(notifications.unread_count(&tech.id), 1);
    }
}
