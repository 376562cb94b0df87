// ABOUTME: Terminal implementation of the operator prompt.
// ABOUTME: Questions go to stderr and answers are read from stdin.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::ports::{Notice, Question, UserPrompt};

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompt {
    assume_yes: bool,
}

impl ConsolePrompt {
    /// With `assume_yes` every question is accepted without reading stdin.
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

#[async_trait]
impl UserPrompt for ConsolePrompt {
    async fn confirm(&self, question: Question) -> bool {
        if self.assume_yes {
            eprintln!("{question} [y/N] y");
            return true;
        }

        eprint!("{question} [y/N] ");
        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        match stdin.read_line(&mut line).await {
            Ok(0) => {
                tracing::debug!(?question, "stdin closed, declining");
                eprintln!();
                false
            }
            Ok(_) => is_yes(&line),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read answer, declining");
                false
            }
        }
    }

    async fn inform(&self, notice: Notice) {
        eprintln!("{notice}");
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_explicit_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes("  YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }

    #[tokio::test]
    async fn assume_yes_accepts_without_reading() {
        let prompt = ConsolePrompt::new(true);
        assert!(prompt.confirm(Question::InstrumentsRunning).await);
    }
}
