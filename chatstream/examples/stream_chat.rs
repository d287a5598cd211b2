//! Streaming chat example.
//!
//! Logs in, opens (or creates) a thread, and streams a reply to stdout.
//! Press Ctrl-C while the reply is streaming to cancel it.
//!
//! Run with:
//! ```bash
//! CHATSTREAM_API_BASE=http://localhost:3000 \
//! CHAT_EMAIL=me@example.com CHAT_PASSWORD=secret \
//! RUST_LOG=chatstream=debug \
//! cargo run --example stream_chat -- "Tell me a joke"
//! ```

use chatstream::prelude::*;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Hello! What can you do?".to_string());

    let chat = Arc::new(ChatClient::from_env("CHATSTREAM")?);

    if let (Ok(email), Ok(password)) = (std::env::var("CHAT_EMAIL"), std::env::var("CHAT_PASSWORD")) {
        chat.api().login(&email, &password).await?;
        println!("Logged in as {email}");
    }

    let thread = match std::env::var("CHAT_THREAD_ID") {
        Ok(id) => Thread::new(id, ""),
        Err(_) => chat.api().create_thread(None).await?,
    };
    let history = chat.open_thread(&thread.id).await?;
    println!("Thread {} ({} earlier messages)\n", thread.id, history.len());

    let canceller = {
        let chat = chat.clone();
        let id = thread.id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                chat.cancel(&id);
            }
        })
    };

    println!("> {prompt}\n");
    let outcome = chat
        .send(&thread.id, &prompt, |delta: &str| {
            print!("{delta}");
            let _ = io::stdout().flush();
        })
        .await;
    canceller.abort();
    println!("\n");

    match outcome {
        Ok(SendOutcome::Completed { text }) => {
            println!("Reply complete ({} chars)", text.chars().count());
            if let Some(renamed) = chat.auto_title(&thread).await? {
                println!("Thread titled \"{}\"", renamed.title);
            }
        }
        Ok(SendOutcome::Cancelled { text }) => {
            println!("Cancelled after {} chars", text.chars().count());
        }
        Err(err) if err.is_auth_required() => {
            eprintln!("Session expired, please log in again: {err}");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
