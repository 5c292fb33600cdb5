//! Interactive selection gate.

use tokio::sync::mpsc;

use super::{Collected, Orchestrator, StageResult};
use crate::error::JobFailure;
use crate::job::Job;
use crate::remote::RemovalRequest;
use crate::selection::{HandlerRegistration, Prompt, PromptId, SelectionAction};

const CANCELLED_TEXT: &str = "Task has been cancelled.";
const TIMED_OUT_TEXT: &str = "Timed Out. Task has been cancelled!";

/// How the selection wait ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SelectionOutcome {
    /// User pressed "Done Selecting"
    Confirmed,
    /// User pressed "Cancel" or the job was cancelled elsewhere
    Cancelled,
    /// Nobody answered in time
    TimedOut,
}

impl Orchestrator {
    /// Let the user prune the job in the web console before it starts
    ///
    /// Jobs without interactive selection pass straight through. A cancelled
    /// or timed out selection removes the job's pending links, detaches it
    /// from its same-directory group and forgets it.
    pub(super) async fn select_files(&self, job: &Job, collected: &Collected) -> StageResult<()> {
        if !job.interactive_select {
            return Ok(());
        }

        let failure = match self.wait_for_selection(job).await {
            SelectionOutcome::Confirmed => return Ok(()),
            SelectionOutcome::Cancelled => JobFailure::SelectionCancelled,
            SelectionOutcome::TimedOut => JobFailure::SelectionTimedOut,
        };

        self.remove_best_effort(job.id, RemovalRequest::packages(collected.online.iter().copied()))
            .await;
        job.remove_from_same_dir();
        self.shared.registry.lock().await.remove(job.id);
        Err(self.abort(job, failure).await)
    }

    /// Send the prompt and wait for a button press, a cancel or the timeout
    pub(crate) async fn wait_for_selection(&self, job: &Job) -> SelectionOutcome {
        let ui = &self.collaborators.ui;
        let timeout = self.config.timing.selection_timeout;
        let prompt = Prompt::selection(
            &job.name,
            &self.config.remote.web_console_url,
            timeout.as_secs(),
        );

        let prompt_id = match ui.send_prompt(job.user, prompt).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(job_id = job.id.0, error = %e, "Failed to send selection prompt");
                job.cancel();
                return SelectionOutcome::Cancelled;
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = {
            let _registration = HandlerRegistration::register(ui.clone(), job.user, tx);
            let cancel = job.cancel_token();
            tokio::select! {
                answer = tokio::time::timeout(timeout, rx.recv()) => match answer {
                    Ok(Some(SelectionAction::Done)) => SelectionOutcome::Confirmed,
                    Ok(Some(SelectionAction::Cancel)) | Ok(None) => SelectionOutcome::Cancelled,
                    Err(_) => SelectionOutcome::TimedOut,
                },
                _ = cancel.cancelled() => SelectionOutcome::Cancelled,
            }
        };

        tracing::debug!(job_id = job.id.0, outcome = ?outcome, "Selection finished");
        self.close_prompt(job, prompt_id, outcome).await;
        outcome
    }

    async fn close_prompt(&self, job: &Job, prompt: PromptId, outcome: SelectionOutcome) {
        let ui = &self.collaborators.ui;
        let result = match outcome {
            SelectionOutcome::Confirmed => ui.delete_prompt(prompt).await,
            SelectionOutcome::Cancelled => {
                job.cancel();
                ui.edit_prompt(prompt, CANCELLED_TEXT).await
            }
            SelectionOutcome::TimedOut => {
                job.cancel();
                let edited = ui.edit_prompt(prompt, TIMED_OUT_TEXT).await;
                ui.schedule_delete(prompt).await;
                edited
            }
        };
        if let Err(e) = result {
            tracing::warn!(job_id = job.id.0, error = %e, "Failed to update selection prompt");
        }
    }
}
