//! Ticket Monitor - interactive console viewer
//!
//! # Usage
//!
//! ```bash
//! ticket-monitor --name admin --role admin --snapshot monitor.json
//! ticket-monitor --name ana --role technician --branch 1
//! ```
//!
//! Commands on stdin: `board`, `new <id> <category> [technician]`,
//! `close <id>`, `clear`, `filter <branch|all>`, `history [id]`, `quit`.

use clap::Parser;
use colored::{ColoredString, Colorize};
use monitor_common::{
    AuditQuery, Board, BranchFilter, BranchId, CategoryId, MonitorResult, Role, TicketDraft,
    TicketId, UrgencyLevel, Viewer,
};
use monitor_session::{Notice, NoticeLevel, SessionConfig, ViewerSession};
use monitor_store::{seed_defaults, InMemoryStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ticket-monitor")]
#[command(version)]
#[command(about = "Multi-branch ticket monitor", long_about = None)]
struct Cli {
    /// Session config file (JSON)
    #[arg(long, env = "MONITOR_CONFIG")]
    config: Option<String>,

    /// Viewer name
    #[arg(long, env = "MONITOR_USER", default_value = "admin")]
    name: String,

    /// Viewer role: admin, operator or technician
    #[arg(long, env = "MONITOR_ROLE", default_value = "admin")]
    role: Role,

    /// Branch id of the viewer (required unless admin)
    #[arg(long, env = "MONITOR_BRANCH")]
    branch: Option<u64>,

    /// Store snapshot, loaded on start and written on exit
    #[arg(long, env = "MONITOR_SNAPSHOT")]
    snapshot: Option<PathBuf>,
}

enum Command {
    Board,
    New { id: String, category: Option<CategoryId>, technician: Option<String> },
    Close(String),
    Clear,
    Filter(BranchFilter),
    History(Option<String>),
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Command::Board);
    };
    let command = match verb {
        "board" | "b" => Command::Board,
        "new" | "n" => {
            let id = words.next().ok_or("usage: new <id> <category> [technician]")?.to_string();
            let category = words
                .next()
                .map(|c| c.parse::<u64>().map(CategoryId::new))
                .transpose()
                .map_err(|_| "category must be a number")?;
            let technician = words.next().map(str::to_string);
            Command::New { id, category, technician }
        }
        "close" | "c" => Command::Close(words.next().ok_or("usage: close <id>")?.to_string()),
        "clear" => Command::Clear,
        "filter" | "f" => match words.next() {
            None | Some("all") => Command::Filter(BranchFilter::All),
            Some(b) => Command::Filter(BranchFilter::Branch(BranchId::new(
                b.parse().map_err(|_| "branch must be a number or 'all'")?,
            ))),
        },
        "history" | "h" => Command::History(words.next().map(str::to_string)),
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(command)
}

fn paint(text: &str, level: UrgencyLevel) -> ColoredString {
    match level {
        UrgencyLevel::Normal => text.normal(),
        UrgencyLevel::Elevated => text.yellow(),
        UrgencyLevel::High => text.red(),
        UrgencyLevel::Critical => text.white().on_red().bold(),
    }
}

fn render(board: &Board) {
    println!("{}", format!("── {} ticket(s) ──", board.len()).bold());
    for card in &board.cards {
        let line = if board.compact {
            format!("{:>6} {:>6} {}", card.ticket_id.to_string(), card.elapsed, card.technician)
        } else {
            format!(
                "{:>6}  {:>6}  {:<12} {:<14} {:<14} by {}{}",
                card.ticket_id.to_string(),
                card.elapsed,
                card.technician,
                card.category,
                card.branch,
                card.creator,
                if card.can_close { "" } else { "  (read-only)" }
            )
        };
        println!("{}", paint(&line, card.level));
    }
}

fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Info => println!("{}", notice.message.cyan()),
        NoticeLevel::Warning => println!("{}", notice.message.yellow()),
        NoticeLevel::Error => println!("{}", notice.message.red()),
    }
}

async fn run_command(session: &ViewerSession, command: Command) -> MonitorResult<()> {
    match command {
        Command::Board => render(&session.board()),
        Command::New { id, category, technician } => {
            let draft = TicketDraft::from_form(&id, technician.as_deref(), category)?;
            let ticket = session.create_ticket(draft).await?;
            println!("Ticket {} opened", ticket.id);
        }
        Command::Close(id) => {
            let entry = session.close_ticket(TicketId::parse(&id)?).await?;
            println!("Ticket {} closed", entry.ticket_id);
        }
        Command::Clear => {
            let count = session.clear_tickets().await?;
            println!("{count} ticket(s) closed");
        }
        Command::Filter(filter) => {
            session.set_branch_filter(filter)?;
            render(&session.board());
        }
        Command::History(id) => {
            let query = match id {
                Some(raw) => AuditQuery::ticket(TicketId::parse(&raw)?),
                None => AuditQuery::default(),
            };
            for entry in session.audit(query)? {
                println!(
                    "{:>6}  {:<12} closed by {:<10} after {}s",
                    entry.ticket_id.to_string(),
                    entry.assignee.label(),
                    entry.closed_by,
                    entry.active_millis() / 1000
                );
            }
        }
        Command::Help => println!("board | new <id> <category> [technician] | close <id> | clear | filter <branch|all> | history [id] | quit"),
        Command::Quit => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => SessionConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Config {path} unusable ({e}), using defaults");
            SessionConfig::default()
        }),
        None => SessionConfig::default(),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Ticket Monitor v{}", env!("CARGO_PKG_VERSION"));

    let viewer = match (cli.role, cli.branch.map(BranchId::new)) {
        (Role::Admin, branch) => Viewer { name: cli.name, role: Role::Admin, branch_id: branch },
        (role, Some(branch)) => Viewer { name: cli.name, role, branch_id: Some(branch) },
        (role, None) => return Err(format!("--branch is required for role {role}").into()),
    };

    let store = match cli.snapshot.as_ref().filter(|p| p.exists()) {
        Some(path) => Arc::new(InMemoryStore::load_snapshot(path)?),
        None => Arc::new(InMemoryStore::new()),
    };
    seed_defaults(store.as_ref()).await?;

    let session = ViewerSession::builder(viewer, store.clone()).config(config).start().await;
    let mut notices = session.notices();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut redraw = tokio::time::interval(session.config().poll_interval());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = redraw.tick() => render(&session.board()),
            Ok(notice) = notices.recv() => print_notice(&notice),
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = run_command(&session, command).await {
                            println!("{}", e.to_string().yellow());
                        }
                    }
                    Err(usage) => println!("{usage}"),
                }
            }
        }
    }

    session.shutdown().await;
    if let Some(path) = cli.snapshot {
        store.save_snapshot(&path)?;
        tracing::info!(path = %path.display(), "Snapshot written");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse_command(""), Ok(Command::Board)));
        assert!(matches!(
            parse_command("new 42 1 ana"),
            Ok(Command::New { ref id, category: Some(c), technician: Some(ref t) })
                if id == "42" && c == CategoryId::new(1) && t == "ana"
        ));
        assert!(matches!(parse_command("filter 2"), Ok(Command::Filter(BranchFilter::Branch(_)))));
        assert!(matches!(parse_command("filter all"), Ok(Command::Filter(BranchFilter::All))));
        assert!(parse_command("new 42 x").is_err());
        assert!(parse_command("dance").is_err());
    }
}
