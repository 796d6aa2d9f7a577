use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};

use assistant_deck::error::AppResult;
use assistant_deck::models::message::Role;
use assistant_deck::service::{agents, chat, sessions, todos};
use assistant_deck::state::AppState;
use assistant_deck::stream::reply::ReplyUpdate;

#[tokio::main]
async fn main() {
    env_logger::init();

    let state = match assistant_deck::bootstrap() {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Failed to start: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(state).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(state: AppState) -> AppResult<()> {
    let session = chat::active_session(&state).await?;
    let session = chat::sync_history(&state, &session.id).await?;

    println!("AssistantDeck: session '{}' ({})", session.name, session.agent_id);
    println!(
        "Commands: /sessions /new [agent] /switch <id> /delete <id> /clear /personas /todos /quit"
    );
    for message in &session.messages {
        print_message(message.role, &message.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["/quit"] => break,
            ["/sessions"] => {
                for session in sessions::list_sessions(&state).await? {
                    println!(
                        "  {}  {}  ({} messages, agent {})",
                        session.id,
                        session.name,
                        session.messages.len(),
                        session.agent_id
                    );
                }
            }
            ["/new"] => {
                let session = sessions::create_session(&state, "default".into()).await?;
                println!("Created and switched to '{}'", session.name);
            }
            ["/new", agent] => {
                let session = sessions::create_session(&state, (*agent).into()).await?;
                println!("Created '{}' with agent {}", session.name, session.agent_id);
            }
            ["/switch", id] => {
                sessions::switch_session(&state, (*id).into()).await?;
                let session = chat::active_session(&state).await?;
                println!("Active session: '{}'", session.name);
            }
            ["/delete", id] => match sessions::delete_session(&state, (*id).into()).await {
                Ok(()) => println!("Deleted."),
                Err(e) => println!("{e}"),
            },
            ["/clear"] => {
                let session = chat::active_session(&state).await?;
                chat::clear_conversation(&state, &session.id).await?;
                println!("Conversation cleared.");
            }
            ["/personas"] => match agents::list_personas(&state).await {
                Ok(personas) => {
                    for persona in personas {
                        println!("  {}  {}", persona.id, persona.name);
                    }
                }
                Err(e) => println!("{e}"),
            },
            ["/todos"] => {
                for todo in todos::list_todos(&state).await? {
                    let mark = if todo.done { "x" } else { " " };
                    println!("  [{mark}] {}  {}", todo.id, todo.text);
                }
            }
            _ => send_and_render(&state, line).await,
        }
    }

    Ok(())
}

async fn send_and_render(state: &AppState, content: String) {
    let mut updates = state.reply.subscribe();
    let renderer = tokio::spawn(async move {
        let mut printed = 0usize;
        while let Ok(update) = updates.recv().await {
            match update {
                ReplyUpdate::Thinking(true) => println!("(thinking...)"),
                ReplyUpdate::Partial(partial) => {
                    print!("{}", &partial[printed.min(partial.len())..]);
                    std::io::stdout().flush().ok();
                    printed = partial.len();
                }
                ReplyUpdate::Progress(steps) => {
                    if let Some(step) = steps.last() {
                        log::debug!(
                            "progress: tool={:?} file={:?} status={:?}",
                            step.tool,
                            step.file,
                            step.status
                        );
                    }
                }
                ReplyUpdate::Finished => break,
                _ => {}
            }
        }
    });

    match chat::send_message(state, content).await {
        Ok(message) => {
            renderer.await.ok();
            println!();
            print_message(message.role, &message.content);
        }
        Err(e) => {
            renderer.abort();
            println!("{e}");
        }
    }
}

fn print_message(role: Role, content: &str) {
    let label = match role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    println!("[{label}] {content}");
}
