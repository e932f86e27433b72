//! `paceline chat` — interactive REPL.
//!
//! Opens a readline loop that sends each line through the engine and
//! streams the coach's reply to stdout. Status lines go to stderr so
//! stdout stays clean for the conversation itself.

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context;

use pl_domain::config::Config;
use pl_domain::model::Session;

use crate::bootstrap;
use crate::runtime::{process_message, CoachEvent, MessageInput};

/// Run the interactive chat loop.
pub async fn chat(
    config: Arc<Config>,
    user_id: String,
    session_id: Option<String>,
) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config)?;
    let user = bootstrap::ensure_user(&state, &user_id).await?;

    let mut session = match session_id {
        Some(id) => state
            .sessions
            .get(&id)
            .await?
            .with_context(|| format!("session {id} not found"))?,
        None => {
            let session = Session::new(&user.id, "New conversation");
            state.sessions.create(&session).await?;
            session
        }
    };

    // Readline with persistent history under the state directory.
    let history_path = state.config.stores.state_path.join("chat_history.txt");
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("Paceline coaching chat");
    eprintln!("Session {} — /new for a fresh session, /quit to exit", session.id);
    eprintln!();

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                match trimmed {
                    "/quit" | "/exit" => break,
                    "/new" => {
                        session = Session::new(&user.id, "New conversation");
                        state.sessions.create(&session).await?;
                        eprintln!("(started session {})", session.id);
                        continue;
                    }
                    "/help" => {
                        eprintln!("/new  start a fresh session\n/quit exit");
                        continue;
                    }
                    _ => {}
                }

                let mut rx = process_message(
                    state.clone(),
                    MessageInput {
                        user_id: user.id.clone(),
                        session_id: session.id.clone(),
                        text: trimmed.to_string(),
                    },
                );

                while let Some(event) = rx.recv().await {
                    match event {
                        CoachEvent::Status { text } => eprintln!("· {text}"),
                        CoachEvent::Delta { text } => {
                            print!("{text}");
                            std::io::stdout().flush().ok();
                        }
                        CoachEvent::Final { .. } => println!(),
                        CoachEvent::Stopped => eprintln!("(stopped)"),
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                // Ctrl-C cancels any in-flight message for this session.
                if state.cancel_map.cancel(&session.id) {
                    eprintln!("(cancelling)");
                } else {
                    eprintln!("(ctrl-d to exit)");
                }
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}
