//! Taskboard - CLI Tool
//!
//! Command-line interface driving the project and task stores against a board API.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskboard::api::SortSpec;
use taskboard::events::{StoreAction, StoreEvent};
use taskboard::models::*;
use taskboard::store::filter::parse_status_filter;
use taskboard::store::{AssigneeFilter, StoreError};
use taskboard::{Config, Stores};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "CLI for the project and task board")]
struct Cli {
    /// Board API base URL (overrides config.yaml)
    #[arg(long, env = "TASKBOARD_API_URL")]
    server: Option<String>,

    /// Path to a config.yaml
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project operations
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Task operations
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// List projects
    List {
        /// Status filter (all, "To do", "In progress", Done)
        #[arg(long)]
        status: Option<String>,

        /// Case-insensitive search in name and description
        #[arg(long)]
        search: Option<String>,

        /// Sort as field:asc|desc
        #[arg(long)]
        sort: Option<SortSpec>,
    },

    /// Show project details
    Show {
        /// Project ID
        id: String,
    },

    /// Create a project
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(short, long, default_value = "")]
        desc: String,

        #[arg(long)]
        status: Option<ProjectStatus>,
    },

    /// Update a project
    Update {
        /// Project ID
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        desc: Option<String>,

        #[arg(long)]
        status: Option<ProjectStatus>,
    },

    /// Delete a project
    Delete {
        /// Project ID
        id: String,
    },

    /// Project counts per status
    Stats,
}

#[derive(Subcommand)]
enum TaskAction {
    /// List the tasks of a project
    List {
        /// Project ID
        project: String,

        /// Status filter (all, todo, in_progress, done)
        #[arg(long)]
        status: Option<String>,

        /// Assignee filter (all, unassigned, or a name)
        #[arg(long)]
        assignee: Option<String>,

        #[arg(long)]
        search: Option<String>,

        /// Sort as field:asc|desc
        #[arg(long)]
        sort: Option<SortSpec>,

        /// Print one column per status instead of a flat list
        #[arg(long)]
        board: bool,

        /// Only show unfinished tasks past their due date
        #[arg(long)]
        overdue: bool,
    },

    /// Show task details
    Show {
        /// Task ID
        id: String,
    },

    /// Add a task to a project
    Create {
        /// Project ID
        project: String,

        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        desc: Option<String>,

        #[arg(long)]
        assignee: Option<String>,

        #[arg(long, default_value = "todo")]
        status: TaskStatus,

        #[arg(long)]
        priority: Option<TaskPriority>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// Update a task
    Update {
        /// Project ID
        project: String,

        /// Task ID
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        desc: Option<String>,

        #[arg(long, conflicts_with = "unassign")]
        assignee: Option<String>,

        /// Remove the assignee
        #[arg(long)]
        unassign: bool,

        #[arg(long)]
        status: Option<TaskStatus>,

        #[arg(long)]
        priority: Option<TaskPriority>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// Move a task to a column and position
    Move {
        /// Project ID
        project: String,

        /// Task ID
        id: String,

        #[arg(long)]
        status: TaskStatus,

        /// Zero-based position inside the column
        #[arg(long, default_value = "0")]
        order: u32,
    },

    /// Delete a task
    Delete {
        /// Project ID
        project: String,

        /// Task ID
        id: String,
    },

    /// Task counts per status
    Stats {
        /// Project ID
        project: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,taskboard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        config.api_url = server;
    }
    let stores = Stores::connect(&config).context("Failed to set up stores")?;

    match cli.command {
        Commands::Projects { action } => handle_projects(&stores, action).await,
        Commands::Tasks { action } => handle_tasks(&stores, action).await,
    }
}

/// Wait for background confirmations and surface the first failure
async fn settle(stores: &Stores) -> Result<()> {
    stores.settle().await;
    if let Some(err) = stores.projects.error().or_else(|| stores.tasks.error()) {
        bail!("Server rejected the change: {}", err);
    }
    Ok(())
}

/// Id of the first confirmed entity among the events received so far
fn confirmed_id(rx: &mut broadcast::Receiver<StoreEvent>) -> Option<String> {
    while let Ok(event) = rx.try_recv() {
        if event.action == StoreAction::Confirmed {
            return Some(event.entity_id);
        }
    }
    None
}

fn print_store_error(err: &StoreError) {
    eprintln!("Error: {}", err);
    if let Some(fields) = err.field_errors() {
        for (field, messages) in fields {
            eprintln!("  {}: {}", field, messages.join(", "));
        }
    }
}

async fn handle_projects(stores: &Stores, action: ProjectAction) -> Result<()> {
    let projects = &stores.projects;

    match action {
        ProjectAction::List {
            status,
            search,
            sort,
        } => {
            let status = status
                .as_deref()
                .map(parse_status_filter::<ProjectStatus>)
                .transpose()
                .map_err(anyhow::Error::msg)?;
            projects.set_filters(|f| {
                if let Some(status) = status {
                    f.status = status;
                }
                if let Some(search) = search {
                    f.search = search;
                }
                if let Some(sort) = sort {
                    f.sort = sort;
                }
            });

            if let Err(e) = projects.fetch_projects().await {
                print_store_error(&e);
                if projects.total_projects() == 0 {
                    return Err(e.into());
                }
                eprintln!("Showing cached projects");
            }

            println!("{:<26} {:<12} {:<6} {}", "ID", "STATUS", "TASKS", "NAME");
            println!("{}", "-".repeat(80));
            for project in projects.filtered_projects() {
                println!(
                    "{:<26} {:<12} {:<6} {}",
                    project.id,
                    project.status.as_str(),
                    project.tasks_count,
                    project.name
                );
            }
            println!(
                "\n{} projects, {} in progress, {} done",
                projects.total_projects(),
                projects.active_projects(),
                projects.completed_projects()
            );
        }

        ProjectAction::Show { id } => {
            if let Err(e) = projects.fetch_project(&id).await {
                print_store_error(&e);
            }
            match projects.current_project() {
                Some(project) => println!("{}", serde_json::to_string_pretty(&project)?),
                None => bail!("Project {} not found", id),
            }
        }

        ProjectAction::Create { name, desc, status } => {
            let mut rx = stores.events.subscribe();
            let draft = ProjectDraft {
                status,
                ..ProjectDraft::new(name, desc)
            };
            let provisional = projects.create_project(draft)?;
            settle(stores).await?;

            let id = confirmed_id(&mut rx).unwrap_or(provisional.id);
            println!("Created project: {}", id);
        }

        ProjectAction::Update {
            id,
            name,
            desc,
            status,
        } => {
            let patch = ProjectPatch {
                name,
                description: desc,
                status,
            };
            if patch.is_empty() {
                bail!("Nothing to update");
            }
            projects.fetch_all_projects().await?;
            let updated = projects.update_project(&id, patch)?;
            settle(stores).await?;
            println!("Updated project: {} ({})", updated.name, updated.status);
        }

        ProjectAction::Delete { id } => {
            projects.fetch_all_projects().await?;
            projects.delete_project(&id)?;
            settle(stores).await?;
            println!("Deleted project: {}", id);
        }

        ProjectAction::Stats => {
            let stats = projects.fetch_stats().await?;
            println!("{:<12} {:<8} {}", "STATUS", "COUNT", "TASKS");
            println!("{}", "-".repeat(32));
            for row in stats {
                println!("{:<12} {:<8} {}", row.status, row.count, row.total_tasks);
            }
        }
    }

    Ok(())
}

fn print_task_row(task: &Task) {
    println!(
        "{:<26} {:<12} {:<4} {:<7} {:<10} {}",
        task.id,
        task.status.as_str(),
        task.order,
        task.priority.as_str(),
        task.assignee().unwrap_or("-"),
        task.title
    );
}

async fn handle_tasks(stores: &Stores, action: TaskAction) -> Result<()> {
    let tasks = &stores.tasks;

    match action {
        TaskAction::List {
            project,
            status,
            assignee,
            search,
            sort,
            board,
            overdue,
        } => {
            let status = status
                .as_deref()
                .map(parse_status_filter::<TaskStatus>)
                .transpose()
                .map_err(anyhow::Error::msg)?;
            tasks.set_filters(|f| {
                if let Some(status) = status {
                    f.status = status;
                }
                if let Some(assignee) = assignee {
                    f.assignee = AssigneeFilter::from(assignee);
                }
                if let Some(search) = search {
                    f.search = search;
                }
                if let Some(sort) = sort {
                    f.sort = sort;
                }
            });

            tasks.fetch_tasks(&project).await?;

            if overdue {
                for task in tasks.overdue_tasks(Utc::now().date_naive()) {
                    print_task_row(&task);
                }
            } else if board {
                let mut columns = tasks.tasks_by_status();
                for status in TaskStatus::ALL {
                    let column = columns.remove(&status).unwrap_or_default();
                    println!("== {} ({}) ==", status, column.len());
                    for task in column {
                        print_task_row(&task);
                    }
                }
            } else {
                for task in tasks.filtered_tasks() {
                    print_task_row(&task);
                }
            }
            println!(
                "\n{} tasks: {} todo, {} in progress, {} done",
                tasks.total_tasks(),
                tasks.todo_tasks(),
                tasks.in_progress_tasks(),
                tasks.done_tasks()
            );
        }

        TaskAction::Show { id } => {
            let task = tasks.fetch_task(&id).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }

        TaskAction::Create {
            project,
            title,
            desc,
            assignee,
            status,
            priority,
            due,
        } => {
            tasks.fetch_board(&project).await?;
            let mut rx = stores.events.subscribe();
            let draft = TaskDraft {
                description: desc,
                assignee,
                priority,
                due_date: due,
                ..TaskDraft::new(project, title, status)
            };
            let provisional = tasks.create_task(draft)?;
            settle(stores).await?;

            let id = confirmed_id(&mut rx).unwrap_or(provisional.id);
            println!("Created task: {} ({} #{})", id, provisional.status, provisional.order);
        }

        TaskAction::Update {
            project,
            id,
            title,
            desc,
            assignee,
            unassign,
            status,
            priority,
            due,
        } => {
            let patch = TaskPatch {
                title,
                description: desc,
                assignee: if unassign { Some(None) } else { assignee.map(Some) },
                status,
                priority,
                due_date: due,
            };
            if patch.is_empty() {
                bail!("Nothing to update");
            }
            tasks.fetch_board(&project).await?;
            let updated = tasks.update_task(&id, patch)?;
            settle(stores).await?;
            println!("Updated task: {} ({} #{})", updated.title, updated.status, updated.order);
        }

        TaskAction::Move {
            project,
            id,
            status,
            order,
        } => {
            tasks.fetch_board(&project).await?;
            let moved = tasks.reorder_task(ReorderRequest::new(id, status, order))?;
            settle(stores).await?;
            println!("Moved task {} to {} #{}", moved.id, moved.status, moved.order);
        }

        TaskAction::Delete { project, id } => {
            tasks.fetch_board(&project).await?;
            tasks.delete_task(&id)?;
            settle(stores).await?;
            println!("Deleted task: {}", id);
        }

        TaskAction::Stats { project } => {
            let stats = tasks.fetch_stats(&project).await?;
            println!("{:<12} {:<8} {}", "STATUS", "COUNT", "HIGH");
            println!("{}", "-".repeat(32));
            for row in &stats.status_stats {
                println!("{:<12} {:<8} {}", row.status, row.count, row.high_priority);
            }
            if !stats.assignees.is_empty() {
                println!("\nAssignees: {}", stats.assignees.join(", "));
            }
        }
    }

    Ok(())
}
