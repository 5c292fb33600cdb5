//! Interactive selection prompt seam.
//!
//! Before a job with manual selection is started, the user is sent a prompt
//! linking to the remote web console, with "Done Selecting" and "Cancel"
//! buttons. Button presses arrive through a handler that is registered only
//! for the duration of the wait.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::job::UserId;

/// Callback payload prefix routed to the selection handler
pub const CALLBACK_PREFIX: &str = "jdq";

/// Identifier of a sent prompt message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PromptId(pub i64);

/// Identifier of a registered action handler
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

/// User's answer to the selection prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionAction {
    /// Selection finished, start the download
    Done,
    /// Drop the job
    Cancel,
}

impl SelectionAction {
    /// Parse a button payload such as `"jdq sdone"` or `"jdq cancel"`
    pub fn from_callback_data(data: &str) -> Option<Self> {
        let mut parts = data.split_whitespace();
        if parts.next()? != CALLBACK_PREFIX {
            return None;
        }
        match parts.next()? {
            "sdone" => Some(SelectionAction::Done),
            "cancel" => Some(SelectionAction::Cancel),
            _ => None,
        }
    }

    /// Button payload for this action
    pub fn callback_data(&self) -> String {
        match self {
            SelectionAction::Done => format!("{CALLBACK_PREFIX} sdone"),
            SelectionAction::Cancel => format!("{CALLBACK_PREFIX} cancel"),
        }
    }
}

/// A prompt button
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromptButton {
    /// Opens a URL
    Url {
        /// Button label
        label: String,
        /// Target URL
        url: String,
    },
    /// Sends a callback payload back to the bot
    Callback {
        /// Button label
        label: String,
        /// Payload, see [`SelectionAction::callback_data`]
        data: String,
    },
}

/// Prompt content
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    /// Message text
    pub text: String,
    /// Buttons, laid out by the messaging layer
    pub buttons: Vec<PromptButton>,
}

impl Prompt {
    /// The selection prompt for a job
    pub fn selection(job_name: &str, web_console_url: &str, timeout_secs: u64) -> Self {
        let text = format!(
            "Disable/Remove the unwanted files or change variants or edit files names from \
             the web console for <b>{job_name}</b> but don't start it manually!\n\n\
             After finish press Done Selecting!\nTimeout: {timeout_secs}s"
        );
        Self {
            text,
            buttons: vec![
                PromptButton::Url {
                    label: "Select".to_string(),
                    url: web_console_url.to_string(),
                },
                PromptButton::Callback {
                    label: "Done Selecting".to_string(),
                    data: SelectionAction::Done.callback_data(),
                },
                PromptButton::Callback {
                    label: "Cancel".to_string(),
                    data: SelectionAction::Cancel.callback_data(),
                },
            ],
        }
    }
}

/// Messaging operations needed by the selection gate
#[async_trait]
pub trait SelectionUi: Send + Sync {
    /// Send a prompt to the user
    async fn send_prompt(&self, user: UserId, prompt: Prompt) -> crate::Result<PromptId>;

    /// Replace the text of a prompt (buttons are dropped)
    async fn edit_prompt(&self, prompt: PromptId, text: &str) -> crate::Result<()>;

    /// Delete a prompt
    async fn delete_prompt(&self, prompt: PromptId) -> crate::Result<()>;

    /// Delete a prompt after the messaging layer's usual delay
    async fn schedule_delete(&self, prompt: PromptId);

    /// Route actions of `user` to `sink` until the handler is removed
    fn register_handler(
        &self,
        user: UserId,
        sink: mpsc::UnboundedSender<SelectionAction>,
    ) -> HandlerId;

    /// Stop routing actions to a handler
    fn remove_handler(&self, handler: HandlerId);
}

/// Registration of a selection handler, removed when dropped
pub(crate) struct HandlerRegistration {
    ui: Arc<dyn SelectionUi>,
    handler: HandlerId,
}

impl HandlerRegistration {
    pub(crate) fn register(
        ui: Arc<dyn SelectionUi>,
        user: UserId,
        sink: mpsc::UnboundedSender<SelectionAction>,
    ) -> Self {
        let handler = ui.register_handler(user, sink);
        Self { ui, handler }
    }
}

impl Drop for HandlerRegistration {
    fn drop(&mut self) {
        self.ui.remove_handler(self.handler);
    }
}
