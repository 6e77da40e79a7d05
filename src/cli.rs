//! Terminal front end.
//!
//! `rival chat` runs an interactive session: each input line is either a
//! session command or a question for the [`Agent`]. A line is a command only
//! when the whole line matches the command grammar; anything else, including
//! `history abc`, is sent as a question.
//!
//! | Input | Effect |
//! |-------|--------|
//! | `help` | Show commands |
//! | `history [n]` | Show the last n exchanges (default 5, clamped to 1..=50) |
//! | `clear` | Empty the history |
//! | `export [path]` | Write the history to a text file |
//! | `stats` | History statistics |
//! | `status` | Data and index status |
//! | `reload` | Reload the CSV and rebuild the index |
//! | `exit`, `quit` | Leave the session |

use anyhow::{bail, Result};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use rival_radar_core::history::{HistoryStats, QueryHistoryEntry};

use crate::agent::{build_agent, validate_query, Agent, AgentStatus, QueryOutcome};
use crate::config::Config;
use crate::data::{load_competitors, write_sample_csv};

/// History entries shown when `history` has no count.
pub const DEFAULT_HISTORY_COUNT: usize = 5;
/// Largest count `history n` accepts; bigger values are clamped.
pub const MAX_HISTORY_COUNT: usize = 50;

/// Longest response preview printed by `history`.
const PREVIEW_CHARS: usize = 200;

/// One parsed line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    History(usize),
    Clear,
    Export(Option<PathBuf>),
    Stats,
    Status,
    Reload,
    Exit,
    Query(String),
    Blank,
}

/// Parse a line of interactive input.
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Blank;
    }

    let mut words = trimmed.split_whitespace();
    let head = words.next().unwrap_or_default().to_lowercase();
    let rest: Vec<&str> = words.collect();

    match (head.as_str(), rest.as_slice()) {
        ("help", []) => Command::Help,
        ("clear", []) => Command::Clear,
        ("stats", []) => Command::Stats,
        ("status", []) => Command::Status,
        ("reload", []) => Command::Reload,
        ("exit" | "quit", []) => Command::Exit,
        ("history", []) => Command::History(DEFAULT_HISTORY_COUNT),
        ("history", [n]) => match n.parse::<usize>() {
            Ok(n) => Command::History(n.clamp(1, MAX_HISTORY_COUNT)),
            Err(_) => Command::Query(trimmed.to_string()),
        },
        ("export", []) => Command::Export(None),
        ("export", [path]) => Command::Export(Some(PathBuf::from(*path))),
        _ => Command::Query(trimmed.to_string()),
    }
}

const HELP: &str = "\
Ask any question about your competitors, for example:
  Compare TechCorp and InnovateLabs marketing strategies
  Which competitor has the highest revenue growth?
  What AI products are on the market?

Commands:
  help            show this message
  history [n]     show the last n queries (default 5, max 50)
  clear           clear the query history
  export [path]   export the history to a text file
  stats           show history statistics
  status          show data and index status
  reload          reload the CSV and rebuild the index
  exit, quit      leave the session";

/// Drive an interactive session over `input`, writing to `out`.
///
/// Returns when `exit` is entered or the input ends.
pub async fn run_session<R, W>(agent: &mut Agent, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(out, "\n{} ", ">".cyan().bold())?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        match parse_command(&line) {
            Command::Blank => continue,
            Command::Exit => break,
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::History(n) => print_history(out, &agent.recent_history(n))?,
            Command::Clear => {
                agent.clear_history();
                writeln!(out, "{} Query history cleared.", "✓".green())?;
            }
            Command::Export(path) => match agent.export_history(path.as_deref()) {
                Ok(written) => writeln!(
                    out,
                    "{} History exported to {}",
                    "✓".green(),
                    written.display()
                )?,
                Err(e) => writeln!(out, "{} Export failed: {:#}", "✗".red(), e)?,
            },
            Command::Stats => print_stats(out, &agent.history().stats())?,
            Command::Status => print_status(out, &agent.status().await)?,
            Command::Reload => match agent.reload().await {
                Ok(report) => writeln!(
                    out,
                    "{} Reloaded {} competitors ({} rows skipped).",
                    "✓".green(),
                    report.records.len(),
                    report.skipped
                )?,
                Err(e) => writeln!(out, "{} Reload failed: {:#}", "✗".red(), e)?,
            },
            Command::Query(query) => match agent.process_query(&query).await {
                Ok(outcome) => print_outcome(out, &outcome)?,
                Err(rejection) => writeln!(out, "{} {}", "!".yellow(), rejection)?,
            },
        }
    }
    writeln!(out, "Goodbye.")?;
    Ok(())
}

fn print_outcome<W: Write>(out: &mut W, outcome: &QueryOutcome) -> Result<()> {
    writeln!(out)?;
    if outcome.succeeded {
        writeln!(out, "{}", outcome.answer)?;
    } else {
        writeln!(out, "{} {}", "✗".red(), outcome.answer)?;
    }
    let mut meta = format!(
        "({:.2}s, intent: {}",
        outcome.elapsed.as_secs_f64(),
        outcome.intent
    );
    if outcome.fallback_used {
        meta.push_str(", keyword fallback");
    }
    meta.push(')');
    writeln!(out, "{}", meta.dimmed())?;
    Ok(())
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

fn print_history<W: Write>(out: &mut W, entries: &[QueryHistoryEntry]) -> Result<()> {
    if entries.is_empty() {
        writeln!(out, "No queries yet.")?;
        return Ok(());
    }
    writeln!(out, "{}", format!("Last {} queries:", entries.len()).bold())?;
    for (i, entry) in entries.iter().enumerate() {
        writeln!(
            out,
            "\n{}. [{}] ({:.2}s)",
            i + 1,
            entry.timestamp_display(),
            entry.duration.as_secs_f64()
        )?;
        writeln!(out, "   Q: {}", entry.query)?;
        writeln!(out, "   A: {}", preview(&entry.response))?;
    }
    Ok(())
}

fn print_stats<W: Write>(out: &mut W, stats: &HistoryStats) -> Result<()> {
    if stats.total_queries == 0 {
        writeln!(out, "No queries yet.")?;
        return Ok(());
    }
    writeln!(out, "{}", "History statistics".bold())?;
    writeln!(out, "  Total queries:   {}", stats.total_queries)?;
    writeln!(out, "  Average time:    {:.2}s", stats.avg_seconds)?;
    writeln!(out, "  Fastest:         {:.2}s", stats.fastest_seconds)?;
    writeln!(out, "  Slowest:         {:.2}s", stats.slowest_seconds)?;
    if let (Some(oldest), Some(newest)) = (&stats.oldest, &stats.newest) {
        writeln!(out, "  Oldest query:    {}", oldest)?;
        writeln!(out, "  Newest query:    {}", newest)?;
    }
    Ok(())
}

fn print_status<W: Write>(out: &mut W, status: &AgentStatus) -> Result<()> {
    let ready = if status.initialized {
        "ready".green()
    } else {
        "not initialized".red()
    };
    writeln!(out, "{} {}", "System:".bold(), ready)?;
    writeln!(out, "  Data file:       {}", status.csv_path.display())?;
    writeln!(out, "  Competitors:     {}", status.competitors)?;
    writeln!(out, "  Indexed docs:    {}", status.indexed_documents)?;
    writeln!(out, "  Skipped rows:    {}", status.skipped_rows)?;
    writeln!(out, "  History entries: {}", status.history_entries)?;
    writeln!(out, "  Embedding model: {}", status.embed_model)?;
    writeln!(out, "  Chat model:      {}", status.chat_model)?;
    writeln!(out, "  Top-k:           {}", status.top_k)?;
    if status.data_changed {
        writeln!(
            out,
            "{} The CSV changed on disk since it was indexed; run `reload`.",
            "!".yellow()
        )?;
    }
    Ok(())
}

async fn ready_agent(config: &Config) -> Result<Agent> {
    let mut agent = build_agent(config)?;
    eprintln!("Loading competitor data from {} ...", config.data.csv_path.display());
    let report = agent.initialize().await?;
    if report.created_sample {
        eprintln!(
            "{} No data file found; created a sample dataset at {}",
            "!".yellow(),
            config.data.csv_path.display()
        );
    }
    eprintln!(
        "{} Indexed {} competitors ({} rows skipped).",
        "✓".green(),
        report.records.len(),
        report.skipped
    );
    Ok(agent)
}

/// `rival chat`: interactive session on stdin/stdout.
pub async fn run_chat(config: &Config) -> Result<()> {
    let mut agent = ready_agent(config).await?;
    let mut stdout = std::io::stdout();
    writeln!(
        stdout,
        "{}\nType a question, or `help` for commands.",
        "Rival Radar - competitive analysis assistant".bold()
    )?;
    run_session(&mut agent, BufReader::new(tokio::io::stdin()), &mut stdout).await
}

/// `rival ask`: answer one question and exit.
pub async fn run_ask(config: &Config, query: &str) -> Result<()> {
    validate_query(query)?;
    let mut agent = ready_agent(config).await?;
    let outcome = agent.process_query(query).await?;
    let mut stdout = std::io::stdout();
    print_outcome(&mut stdout, &outcome)?;
    if !outcome.succeeded {
        bail!("query failed");
    }
    Ok(())
}

/// `rival data`: validate the CSV without touching the network.
pub fn run_data(path: &Path, init: bool) -> Result<()> {
    if init {
        if path.exists() {
            println!("{} {} already exists; leaving it unchanged.", "!".yellow(), path.display());
        } else {
            write_sample_csv(path)?;
            println!("{} Wrote sample dataset to {}", "✓".green(), path.display());
        }
    }

    let report = load_competitors(path)?;
    if report.created_sample {
        println!("{} Created sample dataset at {}", "!".yellow(), path.display());
    }
    println!("Data file:   {}", path.display());
    println!("Records:     {}", report.records.len());
    println!("Skipped:     {}", report.skipped);
    println!("Fingerprint: {}", report.fingerprint);
    for record in &report.records {
        println!("  - {}", record.name);
    }
    if report.records.is_empty() {
        bail!("{} has no valid competitor rows", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_commands() {
        assert_eq!(parse_command("help"), Command::Help);
        assert_eq!(parse_command("  CLEAR "), Command::Clear);
        assert_eq!(parse_command("stats"), Command::Stats);
        assert_eq!(parse_command("status"), Command::Status);
        assert_eq!(parse_command("reload"), Command::Reload);
        assert_eq!(parse_command("exit"), Command::Exit);
        assert_eq!(parse_command("Quit"), Command::Exit);
        assert_eq!(parse_command("   "), Command::Blank);
    }

    #[test]
    fn history_counts_default_and_clamp() {
        assert_eq!(parse_command("history"), Command::History(5));
        assert_eq!(parse_command("history 12"), Command::History(12));
        assert_eq!(parse_command("history 0"), Command::History(1));
        assert_eq!(parse_command("history 500"), Command::History(50));
    }

    #[test]
    fn non_matching_lines_are_queries() {
        assert_eq!(
            parse_command("history abc"),
            Command::Query("history abc".to_string())
        );
        assert_eq!(
            parse_command("help me compare TechCorp and CloudFirst"),
            Command::Query("help me compare TechCorp and CloudFirst".to_string())
        );
        assert_eq!(
            parse_command("  What is the revenue of TechCorp?  "),
            Command::Query("What is the revenue of TechCorp?".to_string())
        );
    }

    #[test]
    fn export_with_optional_path() {
        assert_eq!(parse_command("export"), Command::Export(None));
        assert_eq!(
            parse_command("export out/history.txt"),
            Command::Export(Some(PathBuf::from("out/history.txt")))
        );
        assert!(matches!(parse_command("export my whole history"), Command::Query(_)));
    }

    #[test]
    fn preview_truncates_long_text() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(PREVIEW_CHARS + 10);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
    }
}
