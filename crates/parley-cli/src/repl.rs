//! Interactive read-eval-print loop.

use std::io::Write;

use parley_ai::{ChatOutcome, Orchestrator, OrchestratorError};
use parley_common::ParleyError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::sink::TerminalSink;

/// Input handled by the REPL itself rather than the conversation.
#[derive(Debug, PartialEq, Eq)]
enum Builtin {
    Quit,
    Tools,
    Prompts,
    Usage,
    Help,
}

fn builtin(line: &str) -> Option<Builtin> {
    match line.trim() {
        "/quit" | "/exit" => Some(Builtin::Quit),
        "/tools" => Some(Builtin::Tools),
        "/prompts" => Some(Builtin::Prompts),
        "/usage" => Some(Builtin::Usage),
        "/help" => Some(Builtin::Help),
        _ => None,
    }
}

pub struct Repl {
    orchestrator: Orchestrator,
    streaming: bool,
}

impl Repl {
    pub fn new(orchestrator: Orchestrator, streaming: bool) -> Self {
        Self {
            orchestrator,
            streaming,
        }
    }

    /// Read lines until `/quit` or end of input.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> Result<(), ParleyError> {
        let mut lines = input.lines();
        println!(
            "parley ({}). /help for commands, Ctrl-C interrupts a reply.",
            self.orchestrator.backend_name()
        );

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                println!();
                return Ok(());
            };

            match builtin(&line) {
                Some(Builtin::Quit) => return Ok(()),
                Some(Builtin::Tools) => self.show_tools().await,
                Some(Builtin::Prompts) => self.show_prompts().await,
                Some(Builtin::Usage) => self.show_usage(),
                Some(Builtin::Help) => show_help(),
                None => self.ask(&line).await,
            }
        }
    }

    async fn ask(&mut self, line: &str) {
        let cancel = CancellationToken::new();
        let interrupt = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        let mut sink = TerminalSink::stdout();
        let result = if self.streaming {
            self.orchestrator
                .chat_streaming(line, &mut sink, &cancel)
                .await
        } else {
            self.orchestrator.chat(line, &cancel).await
        };
        interrupt.abort();
        sink.finish_line();

        match result {
            Ok(ChatOutcome::Answer { text, .. }) => {
                if !self.streaming && !text.is_empty() {
                    println!("{text}");
                }
            }
            Ok(ChatOutcome::PromptLoaded { command, turns }) => {
                println!("(loaded /{command}: {turns} message(s) added)");
            }
            Err(OrchestratorError::Cancelled) => eprintln!("(interrupted)"),
            Err(e) => {
                warn!(error = %e, "Request failed");
                eprintln!("error: {e}");
            }
        }
    }

    async fn show_tools(&mut self) {
        let report = self.orchestrator.refresh_tools().await;
        for tool in self.orchestrator.catalog() {
            println!("  {:<24} {}", tool.name, tool.description);
        }
        for skipped in &report.unreachable {
            eprintln!("  (session {} unreachable: {})", skipped.session, skipped.error);
        }
    }

    async fn show_prompts(&self) {
        match self.orchestrator.list_prompts().await {
            Ok(prompts) if prompts.is_empty() => println!("  (no prompts)"),
            Ok(prompts) => {
                for prompt in prompts {
                    let args: Vec<_> = prompt.arguments.iter().map(|a| a.name.as_str()).collect();
                    println!(
                        "  /{} {}  {}",
                        prompt.name,
                        args.join(" "),
                        prompt.description.unwrap_or_default()
                    );
                }
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }

    fn show_usage(&self) {
        let tracker = self.orchestrator.tracker();
        println!(
            "  {} calls, {} input + {} output tokens",
            tracker.call_count(),
            tracker.total().input_tokens,
            tracker.total().output_tokens
        );
    }
}

fn show_help() {
    println!("  /tools     list available tools");
    println!("  /prompts   list prompt commands");
    println!("  /usage     token usage so far");
    println!("  /quit      exit");
    println!("  /<prompt> <args>   load a prompt, @<doc> to attach a document");
}
