//! Line-oriented command loop.
//!
//! Each line typed counts as a key press for the inactivity monitor, so a
//! user who stops typing is logged out after the idle timeout.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use sessionguard_core::{ActivityBus, InputEvent, SessionContext, SessionPhase};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::config::Config;

const HELP: &str = "\
Commands:
  login [email]        log in (prompts for the password)
  logout               end the session
  whoami               show the logged-in user
  refresh              force a credential rotation
  status               show the session phase
  get <path>           GET a path and print the JSON response
  post <path> <json>   POST a JSON body to a path
  delete <path>        DELETE a path
  help                 show this help
  quit                 exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(Option<String>),
    Logout,
    Whoami,
    Refresh,
    Status,
    Get(String),
    Post(String, String),
    Delete(String),
    Help,
    Quit,
    Empty,
}

pub fn parse_command(line: &str) -> std::result::Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let require_path = |name: &str| {
        if rest.is_empty() {
            Err(format!("usage: {} <path>", name))
        } else {
            Ok(rest.to_string())
        }
    };

    match word.to_ascii_lowercase().as_str() {
        "" => Ok(Command::Empty),
        "login" => Ok(Command::Login((!rest.is_empty()).then(|| rest.to_string()))),
        "logout" => Ok(Command::Logout),
        "whoami" | "me" => Ok(Command::Whoami),
        "refresh" => Ok(Command::Refresh),
        "status" => Ok(Command::Status),
        "get" => require_path("get").map(Command::Get),
        "delete" => require_path("delete").map(Command::Delete),
        "post" => match rest.split_once(char::is_whitespace) {
            Some((path, body)) => Ok(Command::Post(path.to_string(), body.trim().to_string())),
            None if !rest.is_empty() => Ok(Command::Post(rest.to_string(), "{}".to_string())),
            None => Err("usage: post <path> <json>".to_string()),
        },
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("Unknown command: {} (try `help`)", other)),
    }
}

fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Initializing => "starting",
        SessionPhase::Authenticated => "logged in",
        SessionPhase::Anonymous => "logged out",
    }
}

fn print_prompt(session: &SessionContext) -> Result<()> {
    let state = session.state();
    let who = state
        .user
        .as_ref()
        .map(|u| u.display_name().to_string())
        .unwrap_or_else(|| phase_label(state.phase()).to_string());
    print!("[{}]> ", who);
    io::stdout().flush()?;
    Ok(())
}

/// Announce session endings that happen behind the user's back.
fn spawn_logout_notice(session: &SessionContext) {
    let mut states = session.subscribe();
    tokio::spawn(async move {
        let mut had_credential = states.borrow_and_update().access_token.is_some();
        while states.changed().await.is_ok() {
            let has_credential = states.borrow_and_update().access_token.is_some();
            if had_credential && !has_credential {
                println!("\nSession ended.");
            }
            had_credential = has_credential;
        }
    });
}

pub async fn run(session: &Arc<SessionContext>, bus: &ActivityBus, config: &mut Config) -> Result<()> {
    spawn_logout_notice(session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_prompt(session)?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        bus.publish(InputEvent::KeyDown);

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                eprintln!("{}", message);
                continue;
            }
        };
        debug!(?command, "Running command");
        match command {
            Command::Quit => break,
            Command::Empty => {}
            command => {
                if let Err(e) = execute(session, config, command).await {
                    eprintln!("Error: {:#}", e);
                }
            }
        }
    }
    Ok(())
}

async fn execute(session: &SessionContext, config: &mut Config, command: Command) -> Result<()> {
    match command {
        Command::Login(email) => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => anyhow::bail!("usage: login <email>"),
            };
            let prompt = format!("Password for {}: ", email);
            let password = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
                .await?
                .context("Failed to read password")?;

            session.login(&email, &password).await?;
            if let Some(user) = session.user() {
                println!("Logged in as {} <{}>", user.display_name(), user.email);
            }
            config.last_email = Some(email);
            config.save()?;
        }
        Command::Logout => {
            session.logout().await;
        }
        Command::Whoami => match session.user() {
            Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
            None => println!("Not logged in"),
        },
        Command::Refresh => {
            session.refresh().await?;
            println!("Credential refreshed");
        }
        Command::Status => {
            let state = session.state();
            println!("Session: {}", phase_label(state.phase()));
            println!("API: {}", session.client().base_url());
            if state.requires_login() {
                println!("Run `login <email>` to start a session.");
            }
        }
        Command::Get(path) => {
            let body: serde_json::Value = session.client().get_json(&path).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Post(path, body) => {
            let payload: serde_json::Value =
                serde_json::from_str(&body).context("Body is not valid JSON")?;
            let response: serde_json::Value = session.client().post_json(&path, &payload).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Delete(path) => {
            session.client().delete(&path).await?;
            println!("Deleted {}", path);
        }
        Command::Help => println!("{}", HELP),
        Command::Quit | Command::Empty => {}
    }
    Ok(())
}
