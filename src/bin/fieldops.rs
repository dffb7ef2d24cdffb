//! fieldops CLI: operator interface to the job and inventory workflow.

use clap::{Parser, Subcommand};
use fieldops::config::Config;
use fieldops::engine::Engine;
use fieldops::model::{
    EntityType, ItemQuantity, JobId, JobStatus, NewInventoryRequest, RequestId, RequestStatus,
    UserId,
};
use fieldops::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "fieldops", about = "Field-service jobs, inventory and approvals")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// User directory
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Job operations
    Jobs {
        #[command(subcommand)]
        action: JobAction,
    },
    /// Inventory ledger and requests
    Inventory {
        #[command(subcommand)]
        action: InventoryAction,
    },
    /// Show the audit trail
    Audit {
        /// Filter by entity type (job, inventory_item, inventory_request, user, ...)
        #[arg(long)]
        entity_type: Option<String>,
        /// Filter by entity id (requires --entity-type)
        #[arg(long, requires = "entity_type")]
        entity_id: Option<String>,
        /// Filter by the user who performed the action
        #[arg(long)]
        user: Option<String>,
    },
    /// Show a user's notification feed
    Notifications {
        /// Viewer user id
        #[arg(long = "as")]
        viewer: String,
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// List users
    List,
}

#[derive(Subcommand)]
enum JobAction {
    /// List jobs
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a job
    Show { id: String },
    /// Submit a job for approval with a signature image
    RequestCompletion {
        id: String,
        #[arg(long = "as")]
        user: String,
        /// Signature as a data:image/... URL
        #[arg(long)]
        signature: String,
    },
    /// Approve a completion request
    Approve {
        id: String,
        #[arg(long = "as")]
        user: String,
    },
    /// Reject a completion request
    Reject {
        id: String,
        #[arg(long = "as")]
        user: String,
        #[arg(long)]
        reason: String,
    },
    /// List employees free for assignment
    Available {
        #[arg(long)]
        for_job: Option<String>,
    },
}

#[derive(Subcommand)]
enum InventoryAction {
    /// List stock
    List,
    /// File an inventory request for a job
    Request {
        job: String,
        #[arg(long = "as")]
        user: String,
        /// Item and quantity as ID=QTY; repeatable
        #[arg(long = "item", value_parser = parse_item, required = true)]
        items: Vec<ItemQuantity>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Approve or reject a request
    Decide {
        id: String,
        /// approved | rejected
        status: String,
        #[arg(long = "as")]
        user: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Draw an approved request from the ledger
    Apply {
        id: String,
        #[arg(long = "as")]
        user: String,
    },
}

fn parse_item(s: &str) -> Result<ItemQuantity, String> {
    let (id, qty) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=QTY, got '{s}'"))?;
    let qty: u32 = qty
        .parse()
        .map_err(|_| format!("invalid quantity in '{s}'"))?;
    Ok(ItemQuantity::new(id, qty))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig::from_config(&config))?;

    let mut engine = Engine::from_config(&config)?;

    match cli.command {
        Command::Users { action } => match action {
            UserAction::List => cmd_users_list(&engine),
        },
        Command::Jobs { action } => match action {
            JobAction::List { status } => cmd_jobs_list(&engine, status),
            JobAction::Show { id } => cmd_jobs_show(&engine, id),
            JobAction::RequestCompletion {
                id,
                user,
                signature,
            } => {
                engine.request_job_completion(
                    &JobId::from(id.as_str()),
                    &UserId::from(user),
                    &signature,
                )?;
                println!("Completion requested: {id}");
                Ok(())
            }
            JobAction::Approve { id, user } => {
                engine.approve_completion(&JobId::from(id.as_str()), &UserId::from(user))?;
                println!("Completed: {id}");
                Ok(())
            }
            JobAction::Reject { id, user, reason } => {
                engine.reject_completion(
                    &JobId::from(id.as_str()),
                    &UserId::from(user),
                    &reason,
                )?;
                println!("Rejected: {id}");
                Ok(())
            }
            JobAction::Available { for_job } => {
                let for_job = for_job.map(JobId::from);
                for user in engine.available_employees(for_job.as_ref()) {
                    println!("{:<10}  {:<16}  {}", user.id, user.role, user.name);
                }
                Ok(())
            }
        },
        Command::Inventory { action } => match action {
            InventoryAction::List => cmd_inventory_list(&engine),
            InventoryAction::Request {
                job,
                user,
                items,
                note,
            } => {
                let mut new = NewInventoryRequest::new(job, user).items(items);
                if let Some(note) = note {
                    new = new.note(note);
                }
                let id = engine.add_inventory_request(new)?;
                println!("Requested: {id}");
                Ok(())
            }
            InventoryAction::Decide {
                id,
                status,
                user,
                note,
            } => {
                let status: RequestStatus = status.parse()?;
                engine.update_inventory_request_status(
                    &RequestId::from(id.as_str()),
                    status,
                    &UserId::from(user),
                    note.as_deref(),
                )?;
                println!("{id}: {status}");
                Ok(())
            }
            InventoryAction::Apply { id, user } => {
                engine.apply_inventory_request(&RequestId::from(id.as_str()), &UserId::from(user))?;
                println!("Applied: {id}");
                Ok(())
            }
        },
        Command::Audit {
            entity_type,
            entity_id,
            user,
        } => cmd_audit(&engine, entity_type, entity_id, user),
        Command::Notifications { viewer, unread } => cmd_notifications(&engine, viewer, unread),
    }
}

fn cmd_users_list(engine: &Engine) -> anyhow::Result<()> {
    println!(
        "{:<10}  {:<16}  {:<12}  {:<24}  EMAIL",
        "ID", "ROLE", "DEPARTMENT", "NAME"
    );
    println!("{}", "-".repeat(90));
    for user in engine.users() {
        println!(
            "{:<10}  {:<16}  {:<12}  {:<24}  {}",
            user.id,
            user.role,
            user.department.as_deref().unwrap_or("-"),
            user.name,
            user.email
        );
    }
    Ok(())
}

fn cmd_jobs_list(engine: &Engine, status: Option<String>) -> anyhow::Result<()> {
    let jobs = match status {
        Some(s) => {
            let status: JobStatus = s.parse()?;
            engine.jobs_by_status(status)
        }
        None => engine.jobs(),
    };

    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    println!(
        "{:<10}  {:<16}  {:<8}  {:<30}  UPDATED",
        "ID", "STATUS", "PRIORITY", "TITLE"
    );
    println!("{}", "-".repeat(90));
    for job in &jobs {
        println!(
            "{:<10}  {:<16}  {:<8}  {:<30}  {}",
            job.id,
            job.status,
            job.priority,
            job.title,
            job.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!("\n{} job(s)", jobs.len());
    Ok(())
}

fn cmd_jobs_show(engine: &Engine, id: String) -> anyhow::Result<()> {
    let id = JobId::from(id);
    let job = engine
        .job(&id)
        .ok_or_else(|| anyhow::anyhow!("no job with id '{id}'"))?;
    println!("{}", serde_json::to_string_pretty(job)?);

    let requests = engine.inventory_requests_for_job(&id);
    if !requests.is_empty() {
        println!("---");
        println!("{}", serde_json::to_string_pretty(&requests)?);
    }
    Ok(())
}

fn cmd_inventory_list(engine: &Engine) -> anyhow::Result<()> {
    println!(
        "{:<8}  {:<24}  {:>8}  {:>6}  {:<5}  LOW",
        "ID", "NAME", "QTY", "MIN", "UNIT"
    );
    println!("{}", "-".repeat(70));
    for item in engine.inventory_items() {
        println!(
            "{:<8}  {:<24}  {:>8}  {:>6}  {:<5}  {}",
            item.id,
            item.name,
            item.quantity,
            item.min_quantity,
            item.unit,
            if item.is_low_stock() { "yes" } else { "" }
        );
    }
    Ok(())
}

fn cmd_audit(
    engine: &Engine,
    entity_type: Option<String>,
    entity_id: Option<String>,
    user: Option<String>,
) -> anyhow::Result<()> {
    let mut entries = match entity_type {
        Some(t) => {
            let entity_type: EntityType = t.parse()?;
            engine.audit_logs_by_entity(entity_type, entity_id.as_deref())
        }
        None => engine.audit_logs(),
    };
    if let Some(user) = user {
        let user = UserId::from(user);
        entries.retain(|e| e.performed_by == user);
    }

    for entry in &entries {
        println!(
            "{}  {:<8}  {:<18}  {:<12}  {:<10}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action,
            entry.entity_type,
            entry.entity_id,
            entry.performed_by,
            entry.details.as_deref().unwrap_or(&entry.entity_name)
        );
    }
    println!("\n{} entr(ies)", entries.len());
    Ok(())
}

fn cmd_notifications(engine: &Engine, viewer: String, unread: bool) -> anyhow::Result<()> {
    let viewer = UserId::from(viewer);
    let feed = engine.notifications_for(&viewer)?;
    let mut shown = 0;
    for n in feed.iter().filter(|n| !unread || !n.read) {
        println!(
            "{}  {}  {:<26}  {}: {}",
            n.created_at.format("%Y-%m-%d %H:%M"),
            if n.read { " " } else { "*" },
            n.kind,
            n.title,
            n.description
        );
        shown += 1;
    }
    println!("\n{shown} shown, {} unread", engine.unread_count(&viewer)?);
    Ok(())
}
