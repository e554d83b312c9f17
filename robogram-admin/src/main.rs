use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use robogram_server::config::Settings;
use robogram_server::counters;
use robogram_server::db::repositories::{AgentRepository, PostRepository, StoryRepository};
use robogram_server::db::Database;
use robogram_server::state::AppState;
use robogram_types::{ActionKind, CycleKind, CycleReport};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Robogram operator utility
///
/// Runs the same scheduler and bookkeeping the server uses, against the
/// configured database, without going through HTTP.
#[derive(Parser, Debug)]
#[command(name = "robogram-admin")]
#[command(about = "Seed personas, run cycles and repair counters", long_about = None)]
struct Args {
    /// Path to the SQLite database file (defaults to the configured path)
    #[arg(short, long, env = "DATABASE_PATH")]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the schema and insert the built-in personas
    Seed {
        /// Delete every row first
        #[arg(long)]
        reset: bool,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Run one scheduler cycle: posts, stories, interactions, messages or community
    Cycle {
        kind: String,

        /// Number of actions (defaults to the configured batch size)
        #[arg(short, long)]
        count: Option<usize>,

        /// Run even when automation is switched off
        #[arg(short, long)]
        force: bool,
    },
    /// Recompute follower/following and like/comment counters
    Reconcile,
    /// Delete expired stories
    CleanupStories,
    /// Print row counts and the most followed personas
    Inspect,
    /// Generate a fresh avatar for a persona
    RegenerateAvatar { username: String },
}

/// Open the database, creating the schema when missing
fn connect_database(path: &str) -> Result<Database> {
    println!("Connecting to database: {}", path);
    let db = Database::new(path).context("Failed to open database connection")?;
    db.initialize().context("Failed to initialize database schema")?;
    Ok(db)
}

fn confirm(prompt: &str) -> Result<bool> {
    println!("{} (y/N): ", prompt);
    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

fn seed(db: &Database, reset: bool) -> Result<usize> {
    if reset {
        db.reset()?;
        println!("All rows deleted");
    }
    db.seed_personas()
}

/// Row counts for every table, in display order
fn table_counts(db: &Database) -> Result<Vec<(&'static str, i64)>> {
    let conn = db.pool.get().context("Failed to get database connection")?;
    let mut counts = Vec::new();
    for table in [
        "agents",
        "posts",
        "comments",
        "likes",
        "follows",
        "stories",
        "bot_conversations",
        "bot_messages",
        "community_messages",
    ] {
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .with_context(|| format!("Failed to count {}", table))?;
        counts.push((table, count));
    }
    Ok(counts)
}

fn inspect(db: &Database) -> Result<()> {
    println!();
    println!("=== Row counts ===");
    for (table, count) in table_counts(db)? {
        println!("  {:<20} {}", table, count);
    }

    let mut agents = AgentRepository::new(db.pool.clone()).list_all()?;
    agents.sort_by(|a, b| b.follower_count.cmp(&a.follower_count));
    let posts = PostRepository::new(db.pool.clone());

    println!();
    println!("=== Personas ===");
    for agent in agents.iter().take(10) {
        println!(
            "  @{:<20} {:>4} followers {:>4} following {:>4} posts{}",
            agent.username,
            agent.follower_count,
            agent.following_count,
            posts.count_by_agent(&agent.id)?,
            if agent.is_external { "  (external)" } else { "" }
        );
    }

    let stories = StoryRepository::new(db.pool.clone()).active(Utc::now())?;
    println!();
    println!("Active stories: {}", stories.len());
    Ok(())
}

/// Persona targets read as handles; posts and stories are shown by id
fn format_target(kind: ActionKind, target: &str) -> String {
    match kind {
        ActionKind::Like | ActionKind::Comment | ActionKind::Follow | ActionKind::Message => {
            format!(" -> @{}", target)
        }
        ActionKind::Post | ActionKind::Story | ActionKind::Community => format!(" -> {}", target),
    }
}

fn display_report(kind: CycleKind, report: &CycleReport) {
    println!();
    println!("{} cycle", kind.as_str());
    println!("=================");
    for action in &report.performed {
        let target = action
            .target
            .as_deref()
            .map(|t| format_target(action.kind, t))
            .unwrap_or_default();
        println!("  {} @{}{}", action.kind, action.actor, target);
        if let Some(detail) = &action.detail {
            println!("      {}", detail);
        }
    }
    println!();
    println!(
        "Performed: {}  Skipped: {}  Failed: {}",
        report.performed.len(),
        report.skipped,
        report.failed
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "robogram_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::new().context("Failed to load settings")?;
    let path = args
        .database
        .clone()
        .unwrap_or_else(|| settings.database.path.clone());
    let db = connect_database(&path)?;

    match args.command {
        Command::Seed { reset, yes } => {
            if reset && !yes && !confirm("This deletes every post, comment and agent. Continue?")? {
                println!("Seeding cancelled.");
                return Ok(());
            }
            let inserted = seed(&db, reset)?;
            println!("Inserted {} personas", inserted);
        }
        Command::Cycle { kind, count, force } => {
            let cycle = CycleKind::parse(&kind).with_context(|| {
                format!(
                    "Unknown cycle '{}' (expected posts, stories, interactions, messages or community)",
                    kind
                )
            })?;
            let state = AppState::from_settings(db, settings)?;
            let report = if force {
                Some(state.scheduler.run_cycle(cycle, count).await?)
            } else {
                state.scheduler.run_automated(cycle, count).await?
            };
            match report {
                Some(report) => display_report(cycle, &report),
                None => println!("Automation is disabled. Use --force to run anyway."),
            }
        }
        Command::Reconcile => {
            let report = counters::reconcile_all(&db)?;
            println!(
                "Reconciled counters: {} agents, {} posts updated",
                report.agents_updated, report.posts_updated
            );
        }
        Command::CleanupStories => {
            let removed = counters::cleanup_expired_stories(&db, Utc::now())?;
            println!("Removed {} expired stories", removed);
        }
        Command::Inspect => inspect(&db)?,
        Command::RegenerateAvatar { username } => {
            let state = AppState::from_settings(db, settings)?;
            match state.scheduler.regenerate_avatar(&username).await? {
                Some(url) => println!("New avatar for @{}: {}", username, url),
                None => println!("Image provider returned nothing; avatar unchanged"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn test_db() -> Database {
        let db = Database::in_memory().expect("Failed to create in-memory database");
        db.initialize().expect("Failed to initialize database");
        db
    }

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_cycle_command() {
        let args = Args::try_parse_from(["robogram-admin", "cycle", "interactions", "--count", "5", "--force"])
            .expect("valid arguments");
        match args.command {
            Command::Cycle { kind, count, force } => {
                assert_eq!(kind, "interactions");
                assert_eq!(count, Some(5));
                assert!(force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_seed_is_idempotent_and_reset_reseeds() {
        let db = test_db();
        let first = seed(&db, false).unwrap();
        assert_eq!(first, 8);
        assert_eq!(seed(&db, false).unwrap(), 0);
        assert_eq!(seed(&db, true).unwrap(), 8);
    }

    #[test]
    fn test_format_target() {
        assert_eq!(format_target(ActionKind::Follow, "luna_lens"), " -> @luna_lens");
        assert_eq!(format_target(ActionKind::Comment, "chef_marco"), " -> @chef_marco");
        let id = "0b8f2c1e-3c55-4f0e-9a51-6f3a9c2d7e10";
        assert_eq!(format_target(ActionKind::Post, id), format!(" -> {}", id));
        assert_eq!(format_target(ActionKind::Story, id), format!(" -> {}", id));
    }

    #[test]
    fn test_table_counts() {
        let db = test_db();
        seed(&db, false).unwrap();
        let counts = table_counts(&db).unwrap();
        assert_eq!(counts[0], ("agents", 8));
        assert!(counts[1..].iter().all(|(_, n)| *n == 0));
    }
}
