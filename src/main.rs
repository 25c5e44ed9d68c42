//! # LegisCI CLI (`legisci`)
//!
//! Administration commands and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! legisci --config ./config/legisci.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `legisci init` | Create the SQLite database and run schema migrations |
//! | `legisci seed` | Load the category tree and reference texts (`--demo` adds sample texts) |
//! | `legisci user create` | Create a user account |
//! | `legisci analyze <file.pdf>` | Run the document analysis on a PDF and print the JSON result |
//! | `legisci stats` | Print usage and content counters |
//! | `legisci serve` | Start the HTTP server |

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use legisci::{analysis, auth, config, dashboard, db, llm, migrate, seed, server};

#[derive(Parser)]
#[command(
    name = "legisci",
    about = "LegisCI: Ivorian legislation browser, back office and legal assistant",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "./config/legisci.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and run migrations.
    Init,

    /// Seed categories and reference documents.
    Seed {
        /// Also import the demo texts.
        #[arg(long)]
        demo: bool,

        /// Overwrite demo texts that already exist.
        #[arg(long)]
        force: bool,

        /// Maximum number of demo texts.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Manage user accounts.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Analyze a PDF offline and print the extracted metadata.
    Analyze { file: PathBuf },

    /// Print dashboard counters.
    Stats,

    /// Start the HTTP server.
    Serve,
}

#[derive(Subcommand)]
enum UserAction {
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        /// Grant access to the back office.
        #[arg(long)]
        admin: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    server::init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            tokio::fs::create_dir_all(&cfg.storage.root)
                .await
                .with_context(|| format!("creating {}", cfg.storage.root.display()))?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Seed { demo, force, limit } => {
            migrate::run_migrations(&cfg).await?;
            let pool = db::connect(&cfg).await?;
            let report = seed::seed_reference_data(&pool).await?;
            println!(
                "categories created: {}\ndocuments created: {}\ndocuments skipped: {}",
                report.categories_created, report.documents_created, report.documents_skipped
            );
            if demo {
                let report = seed::seed_demo(&pool, limit, force).await?;
                println!(
                    "demo documents created: {}\ndemo documents updated: {}\ndemo documents skipped: {}",
                    report.documents_created, report.documents_updated, report.documents_skipped
                );
            }
        }
        Commands::User {
            action:
                UserAction::Create {
                    name,
                    email,
                    password,
                    admin,
                },
        } => {
            let pool = db::connect(&cfg).await?;
            let user = auth::create_user(&pool, &name, &email, &password, admin).await?;
            println!(
                "created user {} <{}>{}",
                user.id,
                user.email,
                if user.is_admin { " (admin)" } else { "" }
            );
        }
        Commands::Analyze { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let model = llm::create_model(&cfg.llm)?;
            let result = analysis::analyze_pdf(model.as_ref(), &cfg.llm, &bytes, &file_name).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Stats => {
            let pool = db::connect(&cfg).await?;
            let general = dashboard::general_stats(&pool).await?;
            let documents = dashboard::admin_stats(&pool).await?;
            println!("users: {} ({} active)", general.total_users, general.active_users);
            println!(
                "documents: {} ({} published, {} drafts, {} views)",
                documents.total, documents.published, documents.drafts, documents.total_views
            );
            println!(
                "chat sessions: {} ({} anonymous, {} in the last 7 days)",
                general.total_ai_sessions, general.anon_ai_sessions, general.recent_ai_sessions
            );
            println!("chat messages (30 days): {}", general.recent_ai_messages);
        }
        Commands::Serve => {
            server::run_server(cfg).await?;
        }
    }

    Ok(())
}
