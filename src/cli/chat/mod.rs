pub mod conversation_state;
pub mod prompt;
pub mod render;

#[cfg(test)]
mod test_support;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use conversation_state::{ChatSession, SubmitOutcome};
use eyre::Result;
use render::Renderer;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use crate::qa_client::QaBackend;

pub const EMPTY_INPUT_NOTICE: &str = "Please enter a question.";
pub const SUBMISSION_ERROR_NOTICE: &str = "An error occurred while fetching the answer.";

const SPINNER_INTERVAL: Duration = Duration::from_millis(80);

const HELP_TEXT: &str = "
Healthcare Conversational Agent

Type a healthcare question and press Enter to send it.

/help         Show this help dialogue
/quit         Quit the application
";

#[derive(Debug, PartialEq, Eq)]
enum LoopControl {
    Continue,
    Quit,
}

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    session: ChatSession,
    renderer: Renderer,
    backend: Arc<dyn QaBackend>,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        backend: Arc<dyn QaBackend>,
    ) -> Self {
        Self {
            output,
            input,
            interactive,
            session: ChatSession::new(),
            renderer: Renderer::new(interactive),
            backend,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        // The prompt only appears once history has resolved, so a late
        // history response can never overwrite a fresh answer.
        self.mount().await?;

        // Handle non-interactive mode (single query)
        if let Some(input) = self.input.take() {
            self.session.set_draft(input);
            let answered = self.submit_draft().await?;
            return Ok(if answered {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }

        if self.interactive {
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    async fn mount(&mut self) -> Result<()> {
        // Failures are already reported; the view carries on with an empty log
        self.session.load_history(self.backend.as_ref()).await.ok();
        self.refresh()
    }

    fn refresh(&mut self) -> Result<()> {
        self.renderer.refresh(&mut self.output, self.session.log())?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;
        writeln!(self.output, "Type /help for commands.\n")?;

        loop {
            let draft = self.session.draft().to_string();
            let readline = rl.readline_with_initial(prompt::PROMPT, (draft.as_str(), ""));

            match readline {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str());
                    }

                    if self.handle_input(line).await? == LoopControl::Quit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        info!("Chat session ended");
        Ok(())
    }

    async fn handle_input(&mut self, line: String) -> Result<LoopControl> {
        match line.trim() {
            "/quit" => return Ok(LoopControl::Quit),
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            _ => {
                self.session.set_draft(line);
                self.submit_draft().await?;
            }
        }

        Ok(LoopControl::Continue)
    }

    /// Submit the session draft, animating a spinner until it resolves.
    /// Returns whether an answer was appended.
    async fn submit_draft(&mut self) -> Result<bool> {
        let busy = self.session.request_state();
        let mut frame = 0;
        let mut drew_spinner = false;

        let outcome = {
            let submission = self.session.submit(self.backend.as_ref());
            tokio::pin!(submission);
            let mut ticker = tokio::time::interval(SPINNER_INTERVAL);

            loop {
                tokio::select! {
                    biased;
                    outcome = &mut submission => break outcome,
                    _ = ticker.tick() => {
                        if self.interactive && busy.is_busy() {
                            render::draw_spinner(&mut self.output, frame)?;
                            drew_spinner = true;
                            frame += 1;
                        }
                    }
                }
            }
        };

        if drew_spinner {
            render::clear_spinner(&mut self.output)?;
        }

        match outcome {
            SubmitOutcome::Appended(index) => {
                debug!("Answer appended at position {}", index);
                self.refresh()?;
                Ok(true)
            }
            SubmitOutcome::EmptyInput => {
                render::write_notice(&mut self.output, EMPTY_INPUT_NOTICE)?;
                Ok(false)
            }
            SubmitOutcome::Failed(e) => {
                debug!("Keeping draft after failed submission: {}", e);
                render::write_notice(&mut self.output, SUBMISSION_ERROR_NOTICE)?;
                Ok(false)
            }
            SubmitOutcome::Busy => Ok(false),
        }
    }
}
