mod auth;
mod customers;
mod errors;
mod events;
mod favorites;
mod forum;
mod jobs;
mod kv;
mod messages;
mod models;
mod notifications;
mod seed;
mod settings;
mod tui;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

use auth::{AuthStore, RegisterData};
use customers::{CustomerDraft, CustomersStore};
use errors::StoreError;
use favorites::FavoritesStore;
use forum::ForumStore;
use jobs::JobsStore;
use kv::KvStore;
use messages::MessagesStore;
use models::{ChecklistItemType, JobDraft, JobStatus, PaymentType, User, UserPatch, UserType};
use notifications::NotificationsStore;
use settings::SettingsStore;

#[derive(Parser)]
#[command(name = "servicehub")]
#[command(about = "Local marketplace/CRM - post leads, track the pipeline, manage customers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize local storage
    Init,

    /// Create an account and sign in
    Register {
        email: String,
        username: String,
        password: String,

        /// advertiser or technician
        #[arg(short = 't', long, default_value = "advertiser")]
        user_type: UserType,

        /// Display name (defaults to the username)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Sign in
    Login { email: String, password: String },

    /// Sign out
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Update the signed-in profile
    Profile {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },

    /// Manage job postings
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Browse open published leads
    Market,

    /// Kanban-style pipeline board
    Pipeline,

    /// Manage customers
    Customer {
        #[command(subcommand)]
        command: CustomerCommands,
    },

    /// Manage favorite-pro lists
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommands,
    },

    /// Messaging
    Msg {
        #[command(subcommand)]
        command: MsgCommands,
    },

    /// Notification feed
    Notify {
        #[command(subcommand)]
        command: NotifyCommands,
    },

    /// Community forum
    Forum {
        #[command(subcommand)]
        command: ForumCommands,
    },

    /// Platform settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// Post a new lead (advertisers only)
    Post {
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(short, long, default_value = "General")]
        category: String,

        /// profitShare or flatRate
        #[arg(short, long, default_value = "profitShare")]
        payment: PaymentType,

        #[arg(long)]
        budget: Option<f64>,

        #[arg(long)]
        profit: Option<f64>,

        /// Profit share percentage; platform default when omitted
        #[arg(long)]
        share: Option<f64>,

        #[arg(long)]
        flat_rate: Option<f64>,

        /// Customer this lead belongs to
        #[arg(long)]
        customer: Option<String>,

        /// Tag ids (repeatable)
        #[arg(long)]
        tag: Vec<String>,

        #[arg(long)]
        checklist: Option<String>,

        /// Publish to the marketplace immediately
        #[arg(long)]
        publish: bool,
    },

    /// List your jobs (posted or assigned to you)
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<JobStatus>,
    },

    /// Show job details
    Show { id: String },

    /// Apply to an open lead (technicians only)
    Apply { id: String },

    /// Assign a technician by username
    Assign { id: String, username: String },

    /// Set a job's status (open, applied, assigned, inProgress, completed, paid, disputed)
    Status { id: String, status: JobStatus },

    /// Toggle marketplace visibility
    Publish { id: String },

    /// Delete a job
    Delete { id: String },

    /// Attach a checklist (empty to detach)
    Checklist {
        id: String,
        checklist_id: Option<String>,
    },

    /// Record progress on one checklist item
    Check {
        id: String,
        item_id: String,
        /// JSON value, e.g. '{"checked":true}' or '"chose option A"'
        value: String,
    },
}

#[derive(Subcommand)]
enum CustomerCommands {
    /// Add a customer
    Add {
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        city: Option<String>,
    },

    /// List your customers
    List,

    /// Show one customer with notes
    Show { id: String },

    /// Append a note
    Note { id: String, text: String },

    /// Remove a customer
    Delete { id: String },
}

#[derive(Subcommand)]
enum FavoriteCommands {
    /// Create a named list
    Create { name: String },

    /// Show your lists
    List,

    /// Add a pro to a list by username
    Add { list_id: String, username: String },

    /// Remove a pro from a list
    Remove { list_id: String, user_id: String },

    /// Rename a list
    Rename { list_id: String, name: String },

    /// Delete a list
    Delete { list_id: String },
}

#[derive(Subcommand)]
enum MsgCommands {
    /// Send a message to a user by username
    Send {
        username: String,
        text: String,

        /// Scope the conversation to a job
        #[arg(long)]
        job: Option<String>,
    },

    /// List your conversations
    List,

    /// Show a conversation and mark it read
    Show { id: String },
}

#[derive(Subcommand)]
enum NotifyCommands {
    /// Show your feed
    List,

    /// Mark one notification read
    Read { id: String },

    /// Mark everything read
    ReadAll,
}

#[derive(Subcommand)]
enum ForumCommands {
    /// List categories
    Categories,

    /// List threads in a category
    Threads { category_id: String },

    /// Read a thread
    Read { thread_id: String },

    /// Start a thread
    New {
        category_id: String,
        title: String,
        body: String,
    },

    /// Reply to a thread
    Post { thread_id: String, body: String },

    /// Delete a post (deletes the thread when it was the last one)
    DeletePost { post_id: String },

    /// Delete a thread and its posts
    DeleteThread { thread_id: String },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings
    Show,

    /// Set the default lead share percentage
    LeadShare { value: f64 },

    /// Add a tag
    TagAdd {
        name: String,
        #[arg(long, default_value = "#888888")]
        color: String,
    },

    /// Remove a tag
    TagRemove { id: String },

    /// Add a pipeline stage
    StageAdd {
        name: String,
        #[arg(long, default_value = "#888888")]
        color: String,
    },

    /// Rename a pipeline stage
    StageRename { id: String, name: String },

    /// Remove a pipeline stage (at least two must remain)
    StageRemove { id: String },

    /// Move a stage left/right by offset, e.g. -1 or 2
    StageMove {
        id: String,
        #[arg(allow_hyphen_values = true)]
        delta: i32,
    },

    /// Add a job template
    TemplateAdd {
        name: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "General")]
        category: String,
    },

    /// Remove a job template
    TemplateRemove { id: String },

    /// Create a checklist
    ChecklistAdd { name: String },

    /// Add an item to a checklist (checkbox, dropdown, file, notes, text)
    ChecklistItem {
        checklist_id: String,
        item_type: ChecklistItemType,
        label: String,

        #[arg(long)]
        required: bool,

        /// Dropdown options (repeatable)
        #[arg(long)]
        option: Vec<String>,
    },

    /// Remove an item from a checklist
    ChecklistItemRemove { checklist_id: String, item_id: String },

    /// Remove a checklist
    ChecklistRemove { id: String },

    /// Configure a reminder
    Reminder {
        key: String,
        #[arg(long)]
        enabled: bool,
        #[arg(long, default_value = "1d")]
        timing: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let kv = KvStore::open()?;

    match run(cli, &kv) {
        Ok(()) => Ok(()),
        // Validation/permission conditions are ordinary user feedback, not
        // process failures.
        Err(e) => match e.downcast_ref::<StoreError>() {
            Some(store_err) if store_err.is_user_error() => {
                println!("{store_err}");
                Ok(())
            }
            _ => Err(e),
        },
    }
}

fn require_user(auth: &AuthStore) -> Result<User> {
    auth.current().ok_or_else(|| StoreError::NotSignedIn.into())
}

fn run(cli: Cli, kv: &KvStore) -> Result<()> {
    let auth = AuthStore::new(kv);

    match cli.command {
        Commands::Init => {
            // Opening created the kv table; touching the seeded stores
            // materializes their demo data.
            JobsStore::new(kv).all();
            ForumStore::new(kv).categories();
            ForumStore::new(kv).threads();
            ForumStore::new(kv).posts();
            NotificationsStore::new(kv).all();
            println!("Storage initialized at {}", kv.path().display());
        }

        Commands::Register {
            email,
            username,
            password,
            user_type,
            name,
        } => {
            let name = name.unwrap_or_else(|| username.clone());
            let user = auth.register(RegisterData {
                email,
                username,
                password,
                user_type,
                name,
            })?;
            println!("Welcome, {} ({}).", user.name, user.user_type);
        }

        Commands::Login { email, password } => {
            let user = auth.login(&email, &password)?;
            println!("Signed in as {} ({}).", user.username, user.user_type);
        }

        Commands::Logout => {
            auth.logout()?;
            println!("Signed out.");
        }

        Commands::Whoami => match auth.current() {
            Some(user) => {
                println!("{} <{}> ({})", user.username, user.email, user.user_type);
                if let Some(bio) = &user.bio {
                    println!("{bio}");
                }
                if user.total_reviews > 0 {
                    println!(
                        "Rating: {:.1} across {} reviews",
                        user.overall_rating, user.total_reviews
                    );
                }
                if let Some(rate) = user.stats.job_closing_rate {
                    println!("Closing rate: {rate:.0}%");
                }
            }
            None => println!("Not signed in."),
        },

        Commands::Profile {
            username,
            name,
            phone,
            address,
            bio,
        } => {
            require_user(&auth)?;
            let user = auth.update_user(UserPatch {
                username,
                name,
                phone,
                address,
                bio,
                ..Default::default()
            })?;
            println!("Profile updated for {}.", user.username);
        }

        Commands::Job { command } => run_job(command, kv, &auth)?,

        Commands::Market => {
            let jobs = JobsStore::new(kv).marketplace();
            if jobs.is_empty() {
                println!("No open leads right now.");
            } else {
                println!(
                    "{:<18} {:<30} {:<14} {:>10} {:>8}",
                    "ID", "TITLE", "CATEGORY", "TECH CUT", "APPLIED"
                );
                println!("{}", "-".repeat(84));
                for job in jobs {
                    let cut = job
                        .technician_earnings()
                        .map(|v| format!("${v:.2}"))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<18} {:<30} {:<14} {:>10} {:>8}",
                        truncate(&job.id, 16),
                        truncate(&job.title, 28),
                        truncate(&job.category, 12),
                        cut,
                        job.applicants.len()
                    );
                }
            }
        }

        Commands::Pipeline => {
            let user = require_user(&auth)?;
            tui::run_board(kv, &user)?;
        }

        Commands::Customer { command } => run_customer(command, kv, &auth)?,
        Commands::Favorite { command } => run_favorite(command, kv, &auth)?,
        Commands::Msg { command } => run_msg(command, kv, &auth)?,
        Commands::Notify { command } => run_notify(command, kv, &auth)?,
        Commands::Forum { command } => run_forum(command, kv, &auth)?,
        Commands::Settings { command } => run_settings(command, kv)?,
    }

    Ok(())
}

fn run_job(command: JobCommands, kv: &KvStore, auth: &AuthStore) -> Result<()> {
    let jobs = JobsStore::new(kv);

    match command {
        JobCommands::Post {
            title,
            description,
            category,
            payment,
            budget,
            profit,
            share,
            flat_rate,
            customer,
            tag,
            checklist,
            publish,
        } => {
            let user = require_user(auth)?;
            let (job, evts) = jobs.add_job(
                &user,
                JobDraft {
                    title,
                    description,
                    category,
                    payment_type: Some(payment),
                    budget,
                    estimated_profit: profit,
                    profit_share_percentage: share,
                    flat_rate,
                    customer_id: customer,
                    tags: tag,
                    checklist_id: checklist,
                    publish,
                },
            )?;
            events::dispatch(kv, &evts)?;
            println!("Posted \"{}\" ({}).", job.title, job.id);
            if !job.is_published {
                println!("Draft only - publish with: servicehub job publish {}", job.id);
            }
        }

        JobCommands::List { status } => {
            let user = require_user(auth)?;
            let mut mine = jobs.visible_to(&user);
            if let Some(status) = status {
                mine.retain(|j| j.status == status);
            }
            if mine.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<18} {:<12} {:<30} {:<10} {:>8}",
                    "ID", "STATUS", "TITLE", "LIVE", "APPLIED"
                );
                println!("{}", "-".repeat(82));
                for job in mine {
                    println!(
                        "{:<18} {:<12} {:<30} {:<10} {:>8}",
                        truncate(&job.id, 16),
                        job.status.to_string(),
                        truncate(&job.title, 28),
                        if job.is_published { "yes" } else { "no" },
                        job.applicants.len()
                    );
                }
            }
        }

        JobCommands::Show { id } => match jobs.get(&id) {
            Some(job) => {
                println!("{}", job.title);
                println!("Posted by: {}", job.advertiser_name);
                println!("Status: {}  Published: {}", job.status, job.is_published);
                println!("Category: {}", job.category);
                if !job.description.is_empty() {
                    println!("\n{}\n", job.description);
                }
                match (job.technician_earnings(), job.advertiser_earnings()) {
                    (Some(tech), Some(adv)) => {
                        println!("Technician earnings: ${tech:.2}");
                        println!("Advertiser earnings: ${adv:.2}");
                    }
                    (Some(tech), None) => println!("Technician earnings: ${tech:.2}"),
                    _ => {}
                }
                if let Some(budget) = job.budget {
                    println!("Budget: ${budget:.2}");
                }
                if let Some(name) = &job.assigned_technician_name {
                    println!("Assigned to: {name}");
                }
                if !job.applicants.is_empty() {
                    println!("\nApplicants ({}):", job.applicants.len());
                    for applicant in &job.applicants {
                        println!("  {} at {}", applicant.technician_id, applicant.applied_at);
                    }
                }
                if !job.activity_log.is_empty() {
                    println!("\nActivity:");
                    for entry in &job.activity_log {
                        let details = entry.details.as_deref().unwrap_or("");
                        println!("  {} {} {} {}", entry.timestamp, entry.user, entry.action, details);
                    }
                }
            }
            None => println!("Job '{id}' not found."),
        },

        JobCommands::Apply { id } => {
            let user = require_user(auth)?;
            let (job, evts) = jobs.apply_to_job(&user, &id)?;
            events::dispatch(kv, &evts)?;
            if evts.is_empty() {
                println!("Already applied to \"{}\".", job.title);
            } else {
                println!("Applied to \"{}\".", job.title);
            }
        }

        JobCommands::Assign { id, username } => {
            require_user(auth)?;
            let tech = auth
                .find_by_username(&username)
                .ok_or_else(|| anyhow!("No user named '{username}'"))?;
            if tech.user_type != UserType::Technician {
                println!("'{username}' is not a technician.");
                return Ok(());
            }
            let (job, evts) = jobs.assign_technician(&id, &tech.id, &tech.name)?;
            events::dispatch(kv, &evts)?;
            println!("Assigned {} to \"{}\" (pulled from marketplace).", tech.name, job.title);
        }

        JobCommands::Status { id, status } => {
            let user = require_user(auth)?;
            let (job, evts) = jobs.update_job_status(&id, status, &user.name)?;
            events::dispatch(kv, &evts)?;
            println!("\"{}\" is now {}.", job.title, job.status);
        }

        JobCommands::Publish { id } => {
            require_user(auth)?;
            let job = jobs.toggle_publish(&id)?;
            if job.is_published {
                println!("\"{}\" is live on the marketplace.", job.title);
            } else {
                println!("\"{}\" was unpublished.", job.title);
            }
        }

        JobCommands::Delete { id } => {
            require_user(auth)?;
            jobs.delete_job(&id)?;
            println!("Job deleted.");
        }

        JobCommands::Checklist { id, checklist_id } => {
            require_user(auth)?;
            jobs.set_checklist(&id, checklist_id.as_deref())?;
            match checklist_id {
                Some(cl) => println!("Checklist {cl} attached; progress reset."),
                None => println!("Checklist detached."),
            }
        }

        JobCommands::Check { id, item_id, value } => {
            require_user(auth)?;
            let value: serde_json::Value = serde_json::from_str(&value)
                .unwrap_or(serde_json::Value::String(value));
            jobs.set_checklist_item(&id, &item_id, value)?;
            println!("Progress recorded.");
        }
    }

    Ok(())
}

fn run_customer(command: CustomerCommands, kv: &KvStore, auth: &AuthStore) -> Result<()> {
    let customers = CustomersStore::new(kv);

    match command {
        CustomerCommands::Add {
            name,
            email,
            phone,
            address,
            city,
        } => {
            let user = require_user(auth)?;
            let customer = customers.add(
                &user,
                CustomerDraft {
                    name,
                    email,
                    phone,
                    address,
                    city,
                },
            )?;
            println!("Added customer {} ({}).", customer.name, customer.id);
        }

        CustomerCommands::List => {
            let user = require_user(auth)?;
            let mine = customers.mine(&user);
            if mine.is_empty() {
                println!("No customers yet.");
            } else {
                println!(
                    "{:<18} {:<24} {:<16} {:>10} {:>6}",
                    "ID", "NAME", "PHONE", "SPENT", "JOBS"
                );
                println!("{}", "-".repeat(78));
                for customer in mine {
                    println!(
                        "{:<18} {:<24} {:<16} {:>10} {:>6}",
                        truncate(&customer.id, 16),
                        truncate(&customer.name, 22),
                        truncate(customer.phone.as_deref().unwrap_or("-"), 14),
                        format!("${:.2}", customer.total_spent),
                        customer.total_jobs
                    );
                }
            }
        }

        CustomerCommands::Show { id } => match customers.get(&id) {
            Some(customer) => {
                println!("{}", customer.name);
                if let Some(email) = &customer.email {
                    println!("Email: {email}");
                }
                if let Some(phone) = &customer.phone {
                    println!("Phone: {phone}");
                }
                if let Some(address) = &customer.address {
                    println!("Address: {address}");
                }
                println!(
                    "Totals: ${:.2} across {} jobs",
                    customer.total_spent, customer.total_jobs
                );
                if !customer.notes.is_empty() {
                    println!("\nNotes:");
                    for note in &customer.notes {
                        println!("  [{}] {} - {}", note.created_at, note.created_by, note.text);
                    }
                }
            }
            None => println!("Customer '{id}' not found."),
        },

        CustomerCommands::Note { id, text } => {
            let user = require_user(auth)?;
            customers.add_note(&id, &text, &user)?;
            println!("Note added.");
        }

        CustomerCommands::Delete { id } => {
            require_user(auth)?;
            customers.remove(&id)?;
            println!("Customer removed.");
        }
    }

    Ok(())
}

fn run_favorite(command: FavoriteCommands, kv: &KvStore, auth: &AuthStore) -> Result<()> {
    let favorites = FavoritesStore::new(kv);
    let user = require_user(auth)?;

    match command {
        FavoriteCommands::Create { name } => {
            let list = favorites.create_list(&user, &name)?;
            println!("Created list \"{}\" ({}).", list.name, list.id);
        }

        FavoriteCommands::List => {
            let lists = favorites.lists(&user);
            if lists.is_empty() {
                println!("No favorite lists yet.");
            } else {
                for list in lists {
                    println!("{} \"{}\" ({} pros)", list.id, list.name, list.pros.len());
                    for pro in &list.pros {
                        println!(
                            "  {} ({:.1} across {} reviews)",
                            pro.name, pro.overall_rating, pro.total_reviews
                        );
                    }
                }
            }
        }

        FavoriteCommands::Add { list_id, username } => {
            let pro = auth
                .find_by_username(&username)
                .ok_or_else(|| anyhow!("No user named '{username}'"))?;
            let list = favorites.add_pro(&user, &list_id, &pro)?;
            println!("{} is on \"{}\".", pro.name, list.name);
        }

        FavoriteCommands::Remove { list_id, user_id } => {
            favorites.remove_pro(&user, &list_id, &user_id)?;
            println!("Removed.");
        }

        FavoriteCommands::Rename { list_id, name } => {
            favorites.rename_list(&user, &list_id, &name)?;
            println!("Renamed.");
        }

        FavoriteCommands::Delete { list_id } => {
            favorites.delete_list(&user, &list_id)?;
            println!("List deleted.");
        }
    }

    Ok(())
}

fn run_msg(command: MsgCommands, kv: &KvStore, auth: &AuthStore) -> Result<()> {
    let messages = MessagesStore::new(kv);
    let user = require_user(auth)?;

    match command {
        MsgCommands::Send { username, text, job } => {
            let recipient = auth
                .find_by_username(&username)
                .ok_or_else(|| anyhow!("No user named '{username}'"))?;
            let conversation =
                messages.send_message(&user.id, &recipient.id, job.as_deref(), &text)?;
            println!("Sent (conversation {}).", conversation.id);
        }

        MsgCommands::List => {
            let mine = messages.for_user(&user.id);
            if mine.is_empty() {
                println!("No conversations.");
            } else {
                for conversation in mine {
                    let other = conversation
                        .participants
                        .iter()
                        .find(|p| **p != user.id)
                        .cloned()
                        .unwrap_or_default();
                    let other_name = auth
                        .find(&other)
                        .map(|u| u.username)
                        .unwrap_or(other);
                    let marker = if conversation.read { " " } else { "*" };
                    let scope = conversation
                        .job_id
                        .as_deref()
                        .map(|j| format!(" [job {j}]"))
                        .unwrap_or_default();
                    println!(
                        "{marker} {} with {}{}: {}",
                        conversation.id,
                        other_name,
                        scope,
                        truncate(conversation.last_message.as_deref().unwrap_or(""), 40)
                    );
                }
            }
        }

        MsgCommands::Show { id } => match messages.get(&id) {
            Some(conversation) => {
                for message in &conversation.messages {
                    let sender = auth
                        .find(&message.sender_id)
                        .map(|u| u.username)
                        .unwrap_or_else(|| message.sender_id.clone());
                    println!("[{}] {}: {}", message.timestamp, sender, message.text);
                }
                messages.mark_read(&id)?;
            }
            None => println!("Conversation '{id}' not found."),
        },
    }

    Ok(())
}

fn run_notify(command: NotifyCommands, kv: &KvStore, auth: &AuthStore) -> Result<()> {
    let notifications = NotificationsStore::new(kv);
    let user = require_user(auth)?;

    match command {
        NotifyCommands::List => {
            let feed = notifications.for_user(&user.id);
            if feed.is_empty() {
                println!("Nothing here.");
            } else {
                for notification in feed {
                    let marker = if notification.read { " " } else { "*" };
                    println!(
                        "{marker} [{:<7}] {} ({})",
                        notification.kind.to_string(),
                        notification.message,
                        notification.id
                    );
                }
            }
        }

        NotifyCommands::Read { id } => {
            notifications.mark_read(&id)?;
            println!("Marked read.");
        }

        NotifyCommands::ReadAll => {
            notifications.mark_all_read(&user.id)?;
            println!("All caught up.");
        }
    }

    Ok(())
}

fn run_forum(command: ForumCommands, kv: &KvStore, auth: &AuthStore) -> Result<()> {
    let forum = ForumStore::new(kv);

    match command {
        ForumCommands::Categories => {
            for category in forum.categories() {
                println!("{:<14} {} - {}", category.id, category.name, category.description);
            }
        }

        ForumCommands::Threads { category_id } => {
            let threads = forum.threads_in(&category_id);
            if threads.is_empty() {
                println!("No threads yet.");
            } else {
                for thread in threads {
                    println!(
                        "{} \"{}\" by {} ({} posts, last {})",
                        thread.id, thread.title, thread.author_name, thread.post_count,
                        thread.last_reply_at
                    );
                }
            }
        }

        ForumCommands::Read { thread_id } => match forum.thread(&thread_id) {
            Some(thread) => {
                println!("{}\n", thread.title);
                for post in forum.posts_in(&thread_id) {
                    println!("[{}] {}:", post.created_at, post.author_name);
                    println!("  {}\n", post.body);
                }
            }
            None => println!("Thread '{thread_id}' not found."),
        },

        ForumCommands::New {
            category_id,
            title,
            body,
        } => {
            let user = require_user(auth)?;
            let thread = forum.create_thread(&user, &category_id, &title, &body)?;
            println!("Thread \"{}\" created ({}).", thread.title, thread.id);
        }

        ForumCommands::Post { thread_id, body } => {
            let user = require_user(auth)?;
            forum.add_post(&user, &thread_id, &body)?;
            println!("Reply posted.");
        }

        ForumCommands::DeletePost { post_id } => {
            require_user(auth)?;
            forum.delete_post(&post_id)?;
            println!("Post deleted.");
        }

        ForumCommands::DeleteThread { thread_id } => {
            require_user(auth)?;
            forum.delete_thread(&thread_id)?;
            println!("Thread deleted.");
        }
    }

    Ok(())
}

fn run_settings(command: SettingsCommands, kv: &KvStore) -> Result<()> {
    let settings = SettingsStore::new(kv);

    match command {
        SettingsCommands::Show => {
            let current = settings.get();
            println!("Default lead share: {:.0}%", current.default_lead_share);

            println!("\nPipeline stages:");
            for stage in &current.pipeline_stages {
                println!("  {:<18} {:<16} {}", stage.id, stage.name, stage.color);
            }

            if !current.tags.is_empty() {
                println!("\nTags:");
                for tag in &current.tags {
                    println!("  {:<18} {:<16} {}", tag.id, tag.name, tag.color);
                }
            }

            if !current.job_templates.is_empty() {
                println!("\nTemplates:");
                for template in &current.job_templates {
                    println!("  {:<18} {} ({})", template.id, template.name, template.category);
                }
            }

            if !current.checklists.is_empty() {
                println!("\nChecklists:");
                for checklist in &current.checklists {
                    println!("  {:<18} {}", checklist.id, checklist.name);
                    for item in &checklist.items {
                        let required = if item.is_required { " (required)" } else { "" };
                        println!("    {:<18} {:?} {}{}", item.id, item.item_type, item.label, required);
                    }
                }
            }

            if !current.reminders.is_empty() {
                println!("\nReminders:");
                for (key, reminder) in &current.reminders {
                    let state = if reminder.enabled { "on" } else { "off" };
                    println!("  {:<18} {} ({})", key, state, reminder.timing);
                }
            }
        }

        SettingsCommands::LeadShare { value } => {
            settings.set_default_lead_share(value)?;
            println!("Default lead share is now {value:.0}%.");
        }

        SettingsCommands::TagAdd { name, color } => {
            let tag = settings.add_tag(&name, &color)?;
            println!("Tag \"{}\" added ({}).", tag.name, tag.id);
        }

        SettingsCommands::TagRemove { id } => {
            settings.remove_tag(&id)?;
            println!("Tag removed.");
        }

        SettingsCommands::StageAdd { name, color } => {
            let stage = settings.add_stage(&name, &color)?;
            println!("Stage \"{}\" added ({}).", stage.name, stage.id);
        }

        SettingsCommands::StageRename { id, name } => {
            settings.rename_stage(&id, &name)?;
            println!("Stage renamed.");
        }

        SettingsCommands::StageRemove { id } => {
            // The floor lives here, not in the store.
            if settings.get().pipeline_stages.len() <= 2 {
                println!("A pipeline needs at least two stages.");
            } else {
                settings.remove_stage(&id)?;
                println!("Stage removed.");
            }
        }

        SettingsCommands::StageMove { id, delta } => {
            let stages = settings.move_stage(&id, delta)?;
            let order: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
            println!("Order: {}", order.join(" > "));
        }

        SettingsCommands::TemplateAdd {
            name,
            title,
            description,
            category,
        } => {
            let template = settings.add_template(&name, &title, &description, &category)?;
            println!("Template \"{}\" added ({}).", template.name, template.id);
        }

        SettingsCommands::TemplateRemove { id } => {
            settings.remove_template(&id)?;
            println!("Template removed.");
        }

        SettingsCommands::ChecklistAdd { name } => {
            let checklist = settings.add_checklist(&name)?;
            println!("Checklist \"{}\" created ({}).", checklist.name, checklist.id);
        }

        SettingsCommands::ChecklistItem {
            checklist_id,
            item_type,
            label,
            required,
            option,
        } => {
            let options = if option.is_empty() { None } else { Some(option) };
            let item =
                settings.add_checklist_item(&checklist_id, item_type, &label, required, options)?;
            println!("Item \"{}\" added ({}).", item.label, item.id);
        }

        SettingsCommands::ChecklistItemRemove {
            checklist_id,
            item_id,
        } => {
            settings.remove_checklist_item(&checklist_id, &item_id)?;
            println!("Item removed.");
        }

        SettingsCommands::ChecklistRemove { id } => {
            settings.remove_checklist(&id)?;
            println!("Checklist removed.");
        }

        SettingsCommands::Reminder {
            key,
            enabled,
            timing,
        } => {
            settings.set_reminder(&key, enabled, &timing)?;
            println!("Reminder '{key}' updated.");
        }
    }

    Ok(())
}

/// Char-based, so multibyte text never lands the cut mid-character.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncate_keeps_short_strings_whole() {
        assert_eq!(truncate("Water heater", 28), "Water heater");
    }

    #[test]
    fn truncate_cuts_long_strings_with_ellipsis() {
        let cut = truncate("a very long job title that keeps going", 16);
        assert_eq!(cut, "a very long j...");
    }

    #[test]
    fn truncate_handles_multibyte_titles() {
        let title = "Réparation chauffe-eau à Montréal";
        let cut = truncate(title, 28);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 28);

        // Accented char exactly at the cut point.
        assert_eq!(truncate("ééééé", 4), "é...");
    }
}
