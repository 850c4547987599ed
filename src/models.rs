use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Millisecond timestamp plus a random suffix, so two records created in the
/// same millisecond still get distinct ids.
pub fn new_id() -> String {
    format!(
        "{}{:04x}",
        chrono::Utc::now().timestamp_millis(),
        rand::random::<u16>()
    )
}

pub fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserType {
    Advertiser,
    Technician,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::Advertiser => write!(f, "advertiser"),
            UserType::Technician => write!(f, "technician"),
        }
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "advertiser" => Ok(UserType::Advertiser),
            "technician" | "pro" => Ok(UserType::Technician),
            other => Err(format!("unknown user type '{other}'")),
        }
    }
}

/// Performance stats kept on technician accounts. All optional so partial
/// merges from `update_user_stats` leave untouched fields alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TechStats {
    pub completed_jobs: Option<u32>,
    pub jobs_applied_to: Option<u32>,
    pub jobs_won: Option<u32>,
    pub job_closing_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub user_type: UserType,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    /// trade -> skill list, technician-only.
    #[serde(default)]
    pub skills: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub overall_rating: f64,
    #[serde(default)]
    pub total_reviews: u32,
    #[serde(default)]
    pub stats: TechStats,
    pub created_at: String,
}

/// Partial profile update; `None` fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub skills: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Open,
    Applied,
    Assigned,
    InProgress,
    Completed,
    Paid,
    Disputed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Open,
        JobStatus::Applied,
        JobStatus::Assigned,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Paid,
        JobStatus::Disputed,
    ];
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Open => "open",
            JobStatus::Applied => "applied",
            JobStatus::Assigned => "assigned",
            JobStatus::InProgress => "inProgress",
            JobStatus::Completed => "completed",
            JobStatus::Paid => "paid",
            JobStatus::Disputed => "disputed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(JobStatus::Open),
            "applied" => Ok(JobStatus::Applied),
            "assigned" => Ok(JobStatus::Assigned),
            "inprogress" | "in-progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "paid" => Ok(JobStatus::Paid),
            "disputed" => Ok(JobStatus::Disputed),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentType {
    ProfitShare,
    FlatRate,
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "profitshare" | "profit-share" => Ok(PaymentType::ProfitShare),
            "flatrate" | "flat-rate" => Ok(PaymentType::FlatRate),
            other => Err(format!("unknown payment type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Applicant {
    pub technician_id: String,
    pub applied_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub action: String,
    pub user: String,
    pub timestamp: String,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub advertiser_id: String,
    pub advertiser_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: JobStatus,
    pub payment_type: PaymentType,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub estimated_profit: Option<f64>,
    #[serde(default)]
    pub profit_share_percentage: Option<f64>,
    #[serde(default)]
    pub flat_rate: Option<f64>,
    pub is_published: bool,
    #[serde(default)]
    pub applicants: Vec<Applicant>,
    #[serde(default)]
    pub assigned_technician_id: Option<String>,
    #[serde(default)]
    pub assigned_technician_name: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub checklist_id: Option<String>,
    /// checklist item id -> item progress (checked flag, chosen option,
    /// free text...), kept as raw JSON since shape depends on item type.
    #[serde(default)]
    pub checklist_progress: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub activity_log: Vec<ActivityEntry>,
    pub created_at: String,
    pub updated_at: String,
}

impl Job {
    /// What the technician stands to earn under the job's payment model.
    /// `None` when the relevant monetary fields are missing.
    pub fn technician_earnings(&self) -> Option<f64> {
        match self.payment_type {
            PaymentType::ProfitShare => {
                let profit = self.estimated_profit?;
                let share = self.profit_share_percentage?;
                Some(profit * share / 100.0)
            }
            PaymentType::FlatRate => self.flat_rate,
        }
    }

    pub fn advertiser_earnings(&self) -> Option<f64> {
        let profit = self.estimated_profit?;
        Some(profit - self.technician_earnings()?)
    }

    pub fn has_applicant(&self, technician_id: &str) -> bool {
        self.applicants
            .iter()
            .any(|a| a.technician_id == technician_id)
    }
}

/// Everything the advertiser supplies when posting; the store fills in
/// identity, ownership and bookkeeping fields.
#[derive(Debug, Clone, Default)]
pub struct JobDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub payment_type: Option<PaymentType>,
    pub budget: Option<f64>,
    pub estimated_profit: Option<f64>,
    pub profit_share_percentage: Option<f64>,
    pub flat_rate: Option<f64>,
    pub customer_id: Option<String>,
    pub tags: Vec<String>,
    pub checklist_id: Option<String>,
    pub publish: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerNote {
    pub text: String,
    pub created_at: String,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub notes: Vec<CustomerNote>,
    #[serde(default)]
    pub total_spent: f64,
    #[serde(default)]
    pub total_jobs: u32,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Denormalized copy of a service pro taken at favoriting time; lists embed
/// snapshots, not references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProSnapshot {
    pub user_id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub overall_rating: f64,
    #[serde(default)]
    pub total_reviews: u32,
    #[serde(default)]
    pub skills: BTreeMap<String, Vec<String>>,
    pub favorited_at: String,
}

impl ProSnapshot {
    pub fn of(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            overall_rating: user.overall_rating,
            total_reviews: user.total_reviews,
            skills: user.skills.clone(),
            favorited_at: now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub pros: Vec<ProSnapshot>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender_id: String,
    pub text: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    /// Exactly two participant user ids, order not significant.
    pub participants: Vec<String>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<String>,
    /// One flag for the whole conversation, not per participant.
    #[serde(default)]
    pub read: bool,
}

impl Conversation {
    /// Matches the participant pair exactly, in either order. A user's
    /// self-conversation only matches itself, never their conversations
    /// with other people.
    pub fn involves(&self, a: &str, b: &str) -> bool {
        match self.participants.as_slice() {
            [x, y] => (x == a && y == b) || (x == b && y == a),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Info => write!(f, "info"),
            NotificationKind::Success => write!(f, "success"),
            NotificationKind::Warning => write!(f, "warning"),
            NotificationKind::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub job_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumThread {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub author_id: String,
    pub author_name: String,
    pub created_at: String,
    pub post_count: u32,
    pub last_reply_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumPost {
    pub id: String,
    pub thread_id: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStage {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTemplate {
    pub id: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChecklistItemType {
    Checkbox,
    Dropdown,
    File,
    Notes,
    Text,
}

impl FromStr for ChecklistItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checkbox" => Ok(ChecklistItemType::Checkbox),
            "dropdown" => Ok(ChecklistItemType::Dropdown),
            "file" => Ok(ChecklistItemType::File),
            "notes" => Ok(ChecklistItemType::Notes),
            "text" => Ok(ChecklistItemType::Text),
            other => Err(format!("unknown checklist item type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ChecklistItemType,
    pub label: String,
    /// Records written before this field existed lack it; default to false
    /// on load so every stored item carries it after the next write.
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReminderSetting {
    pub enabled: bool,
    pub timing: String,
}

impl Default for ReminderSetting {
    fn default() -> Self {
        Self {
            enabled: false,
            timing: "1d".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub default_lead_share: f64,
    pub tags: Vec<Tag>,
    pub pipeline_stages: Vec<PipelineStage>,
    pub job_templates: Vec<JobTemplate>,
    pub checklists: Vec<Checklist>,
    pub reminders: BTreeMap<String, ReminderSetting>,
}

impl Default for Settings {
    fn default() -> Self {
        let stage = |id: &str, name: &str, color: &str| PipelineStage {
            id: id.to_string(),
            name: name.to_string(),
            color: color.to_string(),
        };
        Self {
            default_lead_share: 50.0,
            tags: Vec::new(),
            pipeline_stages: vec![
                stage("stage-new", "New Leads", "#3b82f6"),
                stage("stage-contacted", "Contacted", "#f59e0b"),
                stage("stage-won", "Won", "#22c55e"),
            ],
            job_templates: Vec::new(),
            checklists: Vec::new(),
            reminders: BTreeMap::new(),
        }
    }
}
