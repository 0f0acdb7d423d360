mod db;
mod extract;
mod mailbox;
mod models;
mod normalize;
mod server;
mod stats;
mod tui;
mod views;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use db::Database;
use mailbox::{MailboxClient, MailboxConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "potrack")]
#[command(about = "Purchase-order tracking - fetch, extract, and review candidate submissions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Fetch notification emails from the mailbox and extract records
    Fetch {
        /// Base URL of the mailbox API
        #[arg(short = 'u', long, default_value = "https://graph.microsoft.com/v1.0/me")]
        mailbox_url: String,

        /// Path to the access token file
        #[arg(short, long, default_value = "~/.potrack.token")]
        token_file: String,

        /// Number of days to look back
        #[arg(short, long, default_value = "30")]
        days: u32,

        /// Dry run - show what would be stored without storing
        #[arg(long)]
        dry_run: bool,
    },

    /// List records
    List {
        /// Free-text filter
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show record details
    Show {
        /// Record ID
        id: String,
    },

    /// Show records grouped by month and candidate
    Months {
        /// Free-text filter
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show interview-support statistics
    Stats {
        /// Free-text filter
        #[arg(short, long)]
        search: Option<String>,

        /// Year filter ("All" or a 4-digit year); defaults to the latest period
        #[arg(short, long)]
        year: Option<String>,

        /// Month filter ("All" or a 2-digit month); defaults to the latest period
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Browse records in a two-pane TUI
    Browse {
        /// Free-text filter
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Serve the JSON API
    Serve {
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Base URL of the mailbox API; omit to serve from the store only
        #[arg(long)]
        mailbox_url: Option<String>,

        /// Path to the access token file
        #[arg(long, default_value = "~/.potrack.token")]
        token_file: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let db = Database::open()?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Fetch {
            mailbox_url,
            token_file,
            days,
            dry_run,
        } => {
            db.ensure_initialized()?;

            let token_path = expand_home(&token_file);
            println!("Connecting to {}...", mailbox_url);
            let config = MailboxConfig::from_token_file(&mailbox_url, &token_path)?;
            let client = MailboxClient::new(config)?;

            println!("Fetching notification emails from the last {} days...", days);
            let sync_stats = client.sync(&db, days, dry_run)?;

            println!("\nResults:");
            println!("  Messages fetched: {}", sync_stats.messages_fetched);
            println!("  Records stored:   {}", sync_stats.records_upserted);
            if sync_stats.errors > 0 {
                println!("  Errors:           {}", sync_stats.errors);
            }

            if dry_run {
                println!("\n(Dry run - nothing was stored)");
            }
        }

        Commands::List { search } => {
            db.ensure_initialized()?;
            let records = db.list_records()?;
            let records = views::filter_records(&records, search.as_deref().unwrap_or(""));
            if records.is_empty() {
                println!("No records found.");
            } else {
                println!(
                    "{:<22} {:<21} {:<20} {:<18} {:<24}",
                    "ID", "RECEIVED", "CANDIDATE", "END CLIENT", "SUBJECT"
                );
                println!("{}", "-".repeat(108));
                for record in records {
                    println!(
                        "{:<22} {:<21} {:<20} {:<18} {:<24}",
                        truncate(&record.id, 20),
                        truncate(&record.received, 19),
                        truncate(record.extracted.candidate_name.as_deref().unwrap_or("-"), 18),
                        truncate(record.extracted.end_client.as_deref().unwrap_or("-"), 16),
                        truncate(&record.subject, 22),
                    );
                }
            }
        }

        Commands::Show { id } => {
            db.ensure_initialized()?;
            match db.get_record(&id)? {
                Some(record) => {
                    println!("Record {}", record.id);
                    println!("Subject: {}", record.subject);
                    if let Some(from) = &record.from {
                        println!("From: {} <{}>", from.name, from.address);
                    }
                    if !record.received.is_empty() {
                        println!("Received: {}", record.received);
                    }
                    if !record.web_link.is_empty() {
                        println!("Link: {}", record.web_link);
                    }

                    let extracted = &record.extracted;
                    println!("\nExtracted fields:");
                    let fields = [
                        ("Candidate", &extracted.candidate_name),
                        ("Phone", &extracted.phone_number),
                        ("Email", &extracted.email),
                        ("Location", &extracted.location),
                        ("Position", &extracted.position_applied),
                        ("Job location", &extracted.job_location),
                        ("End client", &extracted.end_client),
                        ("Rate", &extracted.rate),
                        ("Support by", &extracted.interview_support_by),
                        ("Team lead", &extracted.team_lead),
                        ("Manager", &extracted.manager),
                    ];
                    for (label, value) in &fields {
                        println!("  {:<14}{}", format!("{}:", label), value.as_deref().unwrap_or("-"));
                    }

                    if !record.body_preview.is_empty() {
                        println!("\n--- Preview ---");
                        println!("{}", textwrap::fill(&record.body_preview, 78));
                    }
                }
                None => {
                    println!("Record '{}' not found.", id);
                }
            }
        }

        Commands::Months { search } => {
            db.ensure_initialized()?;
            let records = db.list_records()?;
            let buckets = views::month_buckets(&records, search.as_deref().unwrap_or(""));
            if buckets.is_empty() {
                println!("No records found.");
            }
            for bucket in buckets {
                println!("{}", bucket.label);
                for group in &bucket.groups {
                    let deduped = views::dedup_by_company(group);
                    println!("  {}", group.display);
                    for record in deduped {
                        let received = if record.received.is_empty() {
                            "no date".to_string()
                        } else {
                            record.received.clone()
                        };
                        println!(
                            "    {:<21} {:<22} {}",
                            truncate(&received, 19),
                            truncate(&views::company_key(&record), 20),
                            truncate(&record.subject, 40),
                        );
                    }
                }
                println!();
            }
        }

        Commands::Stats { search, year, month } => {
            db.ensure_initialized()?;
            let records = db.list_records()?;
            let filtered = views::filter_records(&records, search.as_deref().unwrap_or(""));
            let (year, month) =
                stats::resolve_period(year.as_deref(), month.as_deref(), &filtered);
            let rows = stats::support_stats(&filtered, &year, &month);

            println!("Period: {} / {}", year, month);
            if rows.is_empty() {
                println!("No records found.");
            } else {
                println!("{:<24} {:>6}  {}", "SUPPORT BY", "COUNT", "CANDIDATES");
                println!("{}", "-".repeat(80));
                for row in rows {
                    println!(
                        "{:<24} {:>6}  {}",
                        truncate(&row.support_by, 22),
                        row.count,
                        row.candidates.join(", "),
                    );
                }
            }
        }

        Commands::Browse { search } => {
            db.ensure_initialized()?;
            let records = db.list_records()?;
            tui::run_browse(&records, search.as_deref().unwrap_or(""))?;
        }

        Commands::Serve {
            port,
            mailbox_url,
            token_file,
        } => {
            db.ensure_initialized()?;

            let mailbox = match mailbox_url {
                Some(url) => {
                    let token_path = expand_home(&token_file);
                    let config = MailboxConfig::from_token_file(&url, &token_path)?;
                    Some(MailboxClient::new(config)?)
                }
                None => None,
            };

            let state = server::ServerState::new(db, mailbox);
            println!("Serving API on port {}...", port);
            rocket::execute(server::build_rocket(state, port).launch())
                .map_err(|e| anyhow!("Server failed: {}", e))?;
        }
    }

    Ok(())
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max.saturating_sub(3)])
    }
}
