use crate::errors::{Result, StoreError};
use crate::events::DomainEvent;
use crate::kv::{K_JOBS, KvStore};
use crate::models::{
    ActivityEntry, Applicant, Job, JobDraft, JobStatus, PaymentType, User, UserType, new_id, now,
};
use crate::seed;
use crate::settings::SettingsStore;

/// Job postings: the marketplace, the pipeline and per-user views all read
/// from the same collection. Mutations that other domains care about return
/// `DomainEvent`s for the caller to route through `events::dispatch`.
pub struct JobsStore<'a> {
    kv: &'a KvStore,
}

impl<'a> JobsStore<'a> {
    pub fn new(kv: &'a KvStore) -> Self {
        Self { kv }
    }

    /// Whole collection, seeding demo leads on first access.
    pub fn all(&self) -> Vec<Job> {
        match self.kv.get_as(K_JOBS) {
            Some(jobs) => jobs,
            None => {
                let jobs = seed::jobs();
                let _ = self.kv.set_as(K_JOBS, &jobs);
                jobs
            }
        }
    }

    fn save(&self, jobs: &[Job]) -> Result<()> {
        self.kv.set_as(K_JOBS, &jobs)
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.all().into_iter().find(|j| j.id == id)
    }

    /// Advertisers see their own postings, technicians the jobs assigned to
    /// them.
    pub fn visible_to(&self, user: &User) -> Vec<Job> {
        self.all()
            .into_iter()
            .filter(|j| match user.user_type {
                UserType::Advertiser => j.advertiser_id == user.id,
                UserType::Technician => j.assigned_technician_id.as_deref() == Some(&user.id),
            })
            .collect()
    }

    /// Open, published leads — what the marketplace lists.
    pub fn marketplace(&self) -> Vec<Job> {
        self.all()
            .into_iter()
            .filter(|j| j.is_published && j.status == JobStatus::Open)
            .collect()
    }

    pub fn by_status(&self, status: JobStatus) -> Vec<Job> {
        self.all()
            .into_iter()
            .filter(|j| j.status == status)
            .collect()
    }

    pub fn add_job(&self, user: &User, draft: JobDraft) -> Result<(Job, Vec<DomainEvent>)> {
        if user.user_type != UserType::Advertiser {
            return Err(StoreError::WrongUserType {
                required: UserType::Advertiser,
            });
        }

        let payment_type = draft.payment_type.unwrap_or(PaymentType::ProfitShare);
        // The platform-wide lead share fills in when the form left it blank.
        let share = match payment_type {
            PaymentType::ProfitShare => draft
                .profit_share_percentage
                .or_else(|| Some(SettingsStore::new(self.kv).get().default_lead_share)),
            PaymentType::FlatRate => draft.profit_share_percentage,
        };

        let job = Job {
            id: new_id(),
            advertiser_id: user.id.clone(),
            advertiser_name: user.name.clone(),
            title: draft.title,
            description: draft.description,
            category: draft.category,
            status: JobStatus::Open,
            payment_type,
            budget: draft.budget,
            estimated_profit: draft.estimated_profit,
            profit_share_percentage: share,
            flat_rate: draft.flat_rate,
            is_published: draft.publish,
            applicants: Vec::new(),
            assigned_technician_id: None,
            assigned_technician_name: None,
            customer_id: draft.customer_id,
            tags: draft.tags,
            checklist_id: draft.checklist_id,
            checklist_progress: Default::default(),
            activity_log: vec![ActivityEntry {
                action: "posted".to_string(),
                user: user.name.clone(),
                timestamp: now(),
                details: None,
            }],
            created_at: now(),
            updated_at: now(),
        };

        let mut jobs = self.all();
        jobs.push(job.clone());
        self.save(&jobs)?;

        let events = vec![DomainEvent::JobPosted {
            job_id: job.id.clone(),
            title: job.title.clone(),
            advertiser_id: job.advertiser_id.clone(),
            customer_id: job.customer_id.clone(),
            advertiser_value: job.advertiser_earnings(),
        }];
        Ok((job, events))
    }

    /// Applies `mutate` to the job and rewrites the collection.
    pub fn update_job(&self, id: &str, mutate: impl FnOnce(&mut Job)) -> Result<Job> {
        let mut jobs = self.all();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| StoreError::not_found("job", id))?;
        mutate(job);
        job.updated_at = now();
        let updated = job.clone();
        self.save(&jobs)?;
        Ok(updated)
    }

    /// No cascade: favorites, conversations and notifications referencing
    /// the job keep their dangling ids.
    pub fn delete_job(&self, id: &str) -> Result<()> {
        let mut jobs = self.all();
        let before = jobs.len();
        jobs.retain(|j| j.id != id);
        if jobs.len() == before {
            return Err(StoreError::not_found("job", id));
        }
        self.save(&jobs)
    }

    /// Idempotent: a technician already on the applicant list is not added
    /// again and no event is emitted.
    pub fn apply_to_job(&self, user: &User, id: &str) -> Result<(Job, Vec<DomainEvent>)> {
        if user.user_type != UserType::Technician {
            return Err(StoreError::WrongUserType {
                required: UserType::Technician,
            });
        }

        let mut already_applied = false;
        let job = self.update_job(id, |job| {
            if job.has_applicant(&user.id) {
                already_applied = true;
                return;
            }
            job.applicants.push(Applicant {
                technician_id: user.id.clone(),
                applied_at: now(),
            });
            job.activity_log.push(ActivityEntry {
                action: "applied".to_string(),
                user: user.name.clone(),
                timestamp: now(),
                details: None,
            });
        })?;

        let events = if already_applied {
            Vec::new()
        } else {
            vec![DomainEvent::TechnicianApplied {
                job_id: job.id.clone(),
                title: job.title.clone(),
                advertiser_id: job.advertiser_id.clone(),
                technician_name: user.name.clone(),
            }]
        };
        Ok((job, events))
    }

    /// Assigning always pulls the job off the open marketplace.
    pub fn assign_technician(
        &self,
        id: &str,
        technician_id: &str,
        technician_name: &str,
    ) -> Result<(Job, Vec<DomainEvent>)> {
        let job = self.update_job(id, |job| {
            job.assigned_technician_id = Some(technician_id.to_string());
            job.assigned_technician_name = Some(technician_name.to_string());
            job.status = JobStatus::Assigned;
            job.is_published = false;
            job.activity_log.push(ActivityEntry {
                action: "assigned".to_string(),
                user: technician_name.to_string(),
                timestamp: now(),
                details: None,
            });
        })?;

        let events = vec![DomainEvent::TechnicianAssigned {
            job_id: job.id.clone(),
            title: job.title.clone(),
            technician_id: technician_id.to_string(),
        }];
        Ok((job, events))
    }

    /// Unconditional overwrite: any status may follow any other, which the
    /// advertiser-override flows rely on.
    pub fn update_job_status(
        &self,
        id: &str,
        status: JobStatus,
        actor: &str,
    ) -> Result<(Job, Vec<DomainEvent>)> {
        let mut from = status;
        let job = self.update_job(id, |job| {
            from = job.status;
            job.status = status;
            job.activity_log.push(ActivityEntry {
                action: "status".to_string(),
                user: actor.to_string(),
                timestamp: now(),
                details: Some(format!("{from} -> {status}")),
            });
        })?;

        let events = if from == status {
            Vec::new()
        } else {
            vec![DomainEvent::StatusChanged {
                job_id: job.id.clone(),
                title: job.title.clone(),
                advertiser_id: job.advertiser_id.clone(),
                assigned_technician_id: job.assigned_technician_id.clone(),
                from,
                to: status,
            }]
        };
        Ok((job, events))
    }

    pub fn toggle_publish(&self, id: &str) -> Result<Job> {
        self.update_job(id, |job| {
            job.is_published = !job.is_published;
        })
    }

    pub fn set_checklist(&self, id: &str, checklist_id: Option<&str>) -> Result<Job> {
        self.update_job(id, |job| {
            job.checklist_id = checklist_id.map(str::to_string);
            job.checklist_progress.clear();
        })
    }

    pub fn set_checklist_item(
        &self,
        id: &str,
        item_id: &str,
        value: serde_json::Value,
    ) -> Result<Job> {
        self.update_job(id, |job| {
            job.checklist_progress.insert(item_id.to_string(), value);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::testutil::temp_store;
    use crate::models::TechStats;
    use std::collections::BTreeMap;

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
            skills: BTreeMap::new(),
            overall_rating: 0.0,
            total_reviews: 0,
            stats: TechStats::default(),
            created_at: now(),
        }
    }

    fn draft(title: &str) -> JobDraft {
        JobDraft {
            title: title.to_string(),
            description: "desc".to_string(),
            category: "Plumbing".to_string(),
            payment_type: Some(PaymentType::ProfitShare),
            estimated_profit: Some(100.0),
            profit_share_percentage: Some(50.0),
            publish: true,
            ..Default::default()
        }
    }

    #[test]
    fn fresh_store_is_seeded() {
        let (_dir, kv) = temp_store();
        let jobs = JobsStore::new(&kv);
        assert_eq!(jobs.all().len(), 2);
        assert_eq!(jobs.marketplace().len(), 2);
    }

    #[test]
    fn only_advertisers_post() {
        let (_dir, kv) = temp_store();
        let jobs = JobsStore::new(&kv);
        let tech = user("tech", UserType::Technician);
        assert!(matches!(
            jobs.add_job(&tech, draft("nope")),
            Err(StoreError::WrongUserType { .. })
        ));
    }

    #[test]
    fn posting_emits_customer_value_event() {
        let (_dir, kv) = temp_store();
        let jobs = JobsStore::new(&kv);
        let adv = user("adv", UserType::Advertiser);
        let mut d = draft("Water heater");
        d.customer_id = Some("cust-1".to_string());
        let (job, events) = jobs.add_job(&adv, d).unwrap();

        assert_eq!(job.status, JobStatus::Open);
        assert!(job.applicants.is_empty());
        assert_eq!(
            events,
            vec![DomainEvent::JobPosted {
                job_id: job.id.clone(),
                title: "Water heater".to_string(),
                advertiser_id: "adv".to_string(),
                customer_id: Some("cust-1".to_string()),
                advertiser_value: Some(50.0),
            }]
        );
    }

    #[test]
    fn blank_share_falls_back_to_platform_default() {
        let (_dir, kv) = temp_store();
        crate::settings::SettingsStore::new(&kv)
            .set_default_lead_share(35.0)
            .unwrap();
        let jobs = JobsStore::new(&kv);
        let adv = user("adv", UserType::Advertiser);
        let mut d = draft("No share given");
        d.profit_share_percentage = None;
        let (job, _) = jobs.add_job(&adv, d).unwrap();
        assert_eq!(job.profit_share_percentage, Some(35.0));
    }

    #[test]
    fn profit_share_splits_fifty_fifty() {
        let (_dir, kv) = temp_store();
        let jobs = JobsStore::new(&kv);
        let adv = user("adv", UserType::Advertiser);
        let (job, _) = jobs.add_job(&adv, draft("Split")).unwrap();
        assert_eq!(job.technician_earnings(), Some(50.0));
        assert_eq!(job.advertiser_earnings(), Some(50.0));
    }

    #[test]
    fn apply_is_idempotent() {
        let (_dir, kv) = temp_store();
        let jobs = JobsStore::new(&kv);
        let adv = user("adv", UserType::Advertiser);
        let tech = user("tech", UserType::Technician);
        let (job, _) = jobs.add_job(&adv, draft("Open lead")).unwrap();

        let (after_first, events) = jobs.apply_to_job(&tech, &job.id).unwrap();
        assert_eq!(after_first.applicants.len(), 1);
        assert_eq!(events.len(), 1);

        let (after_second, events) = jobs.apply_to_job(&tech, &job.id).unwrap();
        assert_eq!(after_second.applicants.len(), 1);
        assert!(events.is_empty());
    }

    #[test]
    fn only_technicians_apply() {
        let (_dir, kv) = temp_store();
        let jobs = JobsStore::new(&kv);
        let adv = user("adv", UserType::Advertiser);
        let (job, _) = jobs.add_job(&adv, draft("Lead")).unwrap();
        assert!(matches!(
            jobs.apply_to_job(&adv, &job.id),
            Err(StoreError::WrongUserType { .. })
        ));
    }

    #[test]
    fn assignment_always_unpublishes() {
        let (_dir, kv) = temp_store();
        let jobs = JobsStore::new(&kv);
        let adv = user("adv", UserType::Advertiser);
        let (job, _) = jobs.add_job(&adv, draft("Assign me")).unwrap();
        assert!(job.is_published);

        let (assigned, _) = jobs.assign_technician(&job.id, "tech", "tech").unwrap();
        assert_eq!(assigned.status, JobStatus::Assigned);
        assert!(!assigned.is_published);
        assert_eq!(assigned.assigned_technician_id.as_deref(), Some("tech"));
    }

    #[test]
    fn any_status_transition_is_allowed() {
        let (_dir, kv) = temp_store();
        let jobs = JobsStore::new(&kv);
        let adv = user("adv", UserType::Advertiser);
        let (job, _) = jobs.add_job(&adv, draft("Loose")).unwrap();

        jobs.update_job_status(&job.id, JobStatus::Paid, "adv").unwrap();
        let (back_to_open, events) = jobs.update_job_status(&job.id, JobStatus::Open, "adv").unwrap();
        assert_eq!(back_to_open.status, JobStatus::Open);
        assert_eq!(events.len(), 1);

        let log = &back_to_open.activity_log;
        assert_eq!(log.last().unwrap().details.as_deref(), Some("paid -> open"));
    }

    #[test]
    fn views_are_scoped_per_user() {
        let (_dir, kv) = temp_store();
        let jobs = JobsStore::new(&kv);
        let adv = user("adv", UserType::Advertiser);
        let tech = user("tech", UserType::Technician);
        let (job, _) = jobs.add_job(&adv, draft("Mine")).unwrap();

        assert_eq!(jobs.visible_to(&adv).len(), 1);
        assert!(jobs.visible_to(&tech).is_empty());

        jobs.assign_technician(&job.id, &tech.id, &tech.name).unwrap();
        assert_eq!(jobs.visible_to(&tech).len(), 1);
        // Assigned jobs leave the marketplace (seeded leads remain).
        assert!(jobs.marketplace().iter().all(|j| j.id != job.id));
    }

    #[test]
    fn delete_leaves_no_trace_in_collection() {
        let (_dir, kv) = temp_store();
        let jobs = JobsStore::new(&kv);
        let adv = user("adv", UserType::Advertiser);
        let (job, _) = jobs.add_job(&adv, draft("Gone")).unwrap();
        jobs.delete_job(&job.id).unwrap();
        assert!(jobs.get(&job.id).is_none());
        assert!(matches!(
            jobs.delete_job(&job.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn collection_survives_reopen_intact() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let written = {
            let kv = crate::kv::KvStore::open_at(&path).unwrap();
            let jobs = JobsStore::new(&kv);
            let adv = user("adv", UserType::Advertiser);
            let tech = user("tech", UserType::Technician);
            let (job, _) = jobs.add_job(&adv, draft("Durable")).unwrap();
            jobs.apply_to_job(&tech, &job.id).unwrap();
            jobs.all()
        };

        let kv = crate::kv::KvStore::open_at(&path).unwrap();
        assert_eq!(JobsStore::new(&kv).all(), written);
    }

    #[test]
    fn checklist_progress_is_per_item() {
        let (_dir, kv) = temp_store();
        let jobs = JobsStore::new(&kv);
        let adv = user("adv", UserType::Advertiser);
        let (job, _) = jobs.add_job(&adv, draft("Checked")).unwrap();

        jobs.set_checklist(&job.id, Some("cl-1")).unwrap();
        let updated = jobs
            .set_checklist_item(&job.id, "item-1", serde_json::json!({"checked": true}))
            .unwrap();
        assert_eq!(
            updated.checklist_progress["item-1"],
            serde_json::json!({"checked": true})
        );

        // Swapping the checklist resets progress.
        let swapped = jobs.set_checklist(&job.id, Some("cl-2")).unwrap();
        assert!(swapped.checklist_progress.is_empty());
    }
}
