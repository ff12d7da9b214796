use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Asks a human operator for a line of input
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Show `message` and return the trimmed answer, empty on EOF or error
    async fn ask(&self, message: &str) -> String;
}

/// Reads answers from the terminal
pub struct ConsolePrompter;

#[async_trait]
impl Prompter for ConsolePrompter {
    async fn ask(&self, message: &str) -> String {
        let message = message.to_string();
        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut stdout = io::stdout();
            write!(stdout, "{}", message)?;
            stdout.flush()?;

            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line.trim().to_string())
        })
        .await;

        match answer {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                warn!("Failed to read from terminal: {}", e);
                String::new()
            }
            Err(e) => {
                warn!("Prompt task failed: {}", e);
                String::new()
            }
        }
    }
}
