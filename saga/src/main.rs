//! Line-oriented narrative game client.
//!
//! Plays a session against the deterministic offline backend, so it
//! works with no network or credentials. Designed for quick manual
//! play and for scripting:
//!
//! ```bash
//! echo -e "look around\ntalk to Cha Hae-In\n#quit" | cargo run -p saga
//! ```

mod offline;

use saga_core::{GameSession, SessionConfig, SessionError, TurnError};
use std::io::{self, BufRead, Write};
use tracing::info;

use offline::OfflineBackend;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let name = args
        .iter()
        .position(|a| a == "--name")
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
        .unwrap_or("Jin");

    let config = SessionConfig::new(name)
        .with_initial_context("A gate shimmers at the edge of the plaza, humming with mana.");
    let mut session = GameSession::new(config, OfflineBackend::new());
    info!(session = %session.session_id(), "session started");

    println!("=== Saga ===");
    println!("Hunter: {}", session.player_name());
    println!("Location: {}", session.current_location()?);
    println!();
    println!("{}", session.initial_context());
    println!();
    print_commands();
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            if !handle_command(&mut session, command).await {
                break;
            }
            stdout.flush().ok();
            continue;
        }

        match session.player_action(line).await {
            Ok(report) => {
                if let Some(dialogue) = &report.npc_dialogue {
                    println!("{dialogue}");
                }
                println!("{}", report.narration);
                if report.new_scene {
                    println!("[SCENE] The scenery shifts around you.");
                }
                if report.compaction.summaries_created > 0 {
                    info!(
                        evicted = report.compaction.evicted,
                        summaries = report.compaction.summaries_created,
                        "history compacted"
                    );
                }
            }
            Err(SessionError::Turn(TurnError::ValidationRejected { reason })) => {
                println!("[BLOCKED] {reason}");
            }
            Err(e) => println!("[ERROR] {e}"),
        }
        stdout.flush().ok();
    }

    Ok(())
}

/// Handle one `#` command; returns false when the loop should exit.
async fn handle_command(session: &mut GameSession<OfflineBackend>, command: &str) -> bool {
    let parts: Vec<&str> = command.split_whitespace().collect();
    match parts.first().copied() {
        Some("quit") | Some("exit") => {
            println!("Goodbye!");
            return false;
        }
        Some("save") => {
            if let Some(path) = parts.get(1) {
                match session.save(path).await {
                    Ok(()) => println!("[SAVED] {path}"),
                    Err(e) => println!("[ERROR] Save failed: {e}"),
                }
            } else {
                println!("[ERROR] Usage: #save <path>");
            }
        }
        Some("load") => {
            if let Some(path) = parts.get(1) {
                let config = SessionConfig::new(session.player_name());
                match GameSession::load(path, config, OfflineBackend::new()).await {
                    Ok(loaded) => {
                        *session = loaded;
                        println!("[LOADED] {path}");
                        print_status(session);
                    }
                    Err(e) => println!("[ERROR] Load failed: {e}"),
                }
            } else {
                println!("[ERROR] Usage: #load <path>");
            }
        }
        Some("status") => print_status(session),
        Some("reset") => {
            session.reset();
            println!("[RESET] A fresh start.");
        }
        Some("help") => print_commands(),
        _ => println!("[ERROR] Unknown command. Type #help for help."),
    }
    true
}

fn print_status(session: &GameSession<OfflineBackend>) {
    match session.snapshot() {
        Ok(state) => {
            println!("[STATUS]");
            println!(
                "  Hunter: {} (Rank {}, Level {})",
                state.player.name, state.player.rank, state.player.level
            );
            println!("  HP: {}  MP: {}", state.player.hp, state.player.mp);
            println!("  Experience: {}  Gold: {}", state.player.experience, state.player.gold);
            println!("  Location: {}", state.world.location);
            if let Some(dungeon) = &state.world.dungeon {
                println!("  Dungeon: {dungeon}");
            }
            if let Some(quest) = &state.quests.current {
                println!("  Quest: {quest}");
            }
            if !state.player.inventory.is_empty() {
                let items: Vec<String> = state
                    .player
                    .inventory
                    .iter()
                    .map(|s| format!("{} x{}", s.name, s.quantity))
                    .collect();
                println!("  Inventory: {}", items.join(", "));
            }
        }
        Err(e) => println!("[ERROR] {e}"),
    }
}

fn print_commands() {
    println!("Commands:");
    println!("  #quit         - Exit");
    println!("  #save <path>  - Save the session");
    println!("  #load <path>  - Load a saved session");
    println!("  #status       - Show hunter and world state");
    println!("  #reset        - Restart from session-start defaults");
    println!("  #help         - Show this help");
    println!("  (anything else is sent as a player action)");
}

fn print_help() {
    println!("saga - line-oriented narrative game client");
    println!();
    println!("USAGE:");
    println!("  saga [--name <hunter-name>]");
    println!();
    println!("Runs a fully offline session; actions are read line by line");
    println!("from stdin. Type #help in-game for commands.");
}
