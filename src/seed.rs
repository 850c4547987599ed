use crate::models::{
    ForumCategory, ForumPost, ForumThread, Job, JobStatus, Notification, NotificationKind,
    PaymentType, now,
};

pub const DEMO_ADVERTISER_ID: &str = "demo-advertiser";

/// A couple of open marketplace leads so a fresh install has something to
/// browse before anyone registers.
pub fn jobs() -> Vec<Job> {
    let job = |id: &str, title: &str, description: &str, category: &str, profit: f64| Job {
        id: id.to_string(),
        advertiser_id: DEMO_ADVERTISER_ID.to_string(),
        advertiser_name: "ServiceHub Demo".to_string(),
        title: title.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        status: JobStatus::Open,
        payment_type: PaymentType::ProfitShare,
        budget: None,
        estimated_profit: Some(profit),
        profit_share_percentage: Some(50.0),
        flat_rate: None,
        is_published: true,
        applicants: Vec::new(),
        assigned_technician_id: None,
        assigned_technician_name: None,
        customer_id: None,
        tags: Vec::new(),
        checklist_id: None,
        checklist_progress: Default::default(),
        activity_log: Vec::new(),
        created_at: now(),
        updated_at: now(),
    };
    vec![
        job(
            "seed-job-1",
            "Water heater replacement",
            "40-gallon gas unit, permit already pulled. Customer available weekdays.",
            "Plumbing",
            400.0,
        ),
        job(
            "seed-job-2",
            "Panel upgrade quote",
            "100A to 200A service upgrade, needs a licensed electrician for the walkthrough.",
            "Electrical",
            650.0,
        ),
    ]
}

pub fn forum_categories() -> Vec<ForumCategory> {
    let cat = |id: &str, name: &str, description: &str| ForumCategory {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
    };
    vec![
        cat("cat-general", "General", "Introductions and anything else"),
        cat("cat-leads", "Lead Tips", "Pricing, qualifying and closing leads"),
        cat("cat-trade", "Trade Talk", "Tools, techniques and trade questions"),
    ]
}

pub fn forum_threads() -> Vec<ForumThread> {
    vec![ForumThread {
        id: "seed-thread-1".to_string(),
        category_id: "cat-general".to_string(),
        title: "Welcome to the ServiceHub community".to_string(),
        author_id: DEMO_ADVERTISER_ID.to_string(),
        author_name: "ServiceHub Demo".to_string(),
        created_at: now(),
        post_count: 1,
        last_reply_at: now(),
    }]
}

pub fn forum_posts() -> Vec<ForumPost> {
    vec![ForumPost {
        id: "seed-post-1".to_string(),
        thread_id: "seed-thread-1".to_string(),
        author_id: DEMO_ADVERTISER_ID.to_string(),
        author_name: "ServiceHub Demo".to_string(),
        body: "Say hello and tell us what trade you work in.".to_string(),
        created_at: now(),
    }]
}

pub fn notifications() -> Vec<Notification> {
    vec![Notification {
        id: "seed-notif-1".to_string(),
        user_id: DEMO_ADVERTISER_ID.to_string(),
        kind: NotificationKind::Info,
        message: "Welcome to ServiceHub. Post a lead or browse the marketplace to get started."
            .to_string(),
        read: false,
        job_id: None,
        created_at: now(),
    }]
}
