//! Stdin/stdout front end for exercising the relay locally.
//!
//! Stands in for the chat-client adapter: each line is a question, each
//! reply piece is printed on its own. `/quit` or `/exit` ends the
//! session. Only the generic notices ever reach the terminal; detail
//! goes to the logs.

use tokio::io::{self, AsyncBufReadExt, BufReader};

use studbot_common::Result;

use crate::relay::{user_notice, Relay};

/// Run the interactive loop until EOF or `/quit`.
pub async fn run(relay: &Relay, user_id: i64) -> Result<()> {
    let stdin = io::stdin();
    let reader = BufReader::new(stdin);
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "/quit" || question == "/exit" {
            break;
        }

        match relay.ask(user_id, question).await {
            Ok(pieces) => {
                for piece in pieces {
                    println!("{piece}");
                }
            }
            Err(e) => {
                tracing::debug!(user_id, error = %e, "Request failed");
                println!("{}", user_notice(&e));
            }
        }
    }

    Ok(())
}
