// src/deliver/automation.rs
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AutomationError;

/// Opaque handle to a window or input surface in the host chat application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Paste the clipboard into the focused input.
    Paste,
    /// Submit (Enter).
    Confirm,
    /// Escape.
    Cancel,
}

/// What the delivery driver needs from the host application.
///
/// Implementations wrap one platform's window lookup and input injection.
/// The driver never touches the OS directly, so tests substitute a recorder.
#[async_trait]
pub trait ChatAutomation: Send + Sync {
    /// Conversation search box in the host's main window, if the host is up.
    async fn locate_search_input(&self) -> Result<Option<SurfaceHandle>, AutomationError>;

    /// Open conversation window titled `target`.
    async fn locate_conversation_input(
        &self,
        target: &str,
    ) -> Result<Option<SurfaceHandle>, AutomationError>;

    /// Restore and foreground `surface`.
    async fn focus(&self, surface: SurfaceHandle) -> Result<(), AutomationError>;

    /// Replace the text content of `surface`.
    async fn inject_text(&self, surface: SurfaceHandle, text: &str) -> Result<(), AutomationError>;

    /// Replace the shared system clipboard with `text`.
    async fn write_clipboard(&self, text: &str) -> Result<(), AutomationError>;

    async fn press(&self, surface: SurfaceHandle, key: KeyAction) -> Result<(), AutomationError>;

    /// Close the conversation view.
    async fn close(&self, surface: SurfaceHandle) -> Result<(), AutomationError> {
        self.press(surface, KeyAction::Cancel).await
    }
}

/// Pauses that let the host application finish processing the previous
/// input. The host drops input that arrives before it is ready, so these
/// are required for correct delivery. Tests shorten them with `none()`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    /// After writing the target name into the search box.
    pub search_ms: u64,
    /// After confirming the search, before the conversation window exists.
    pub open_ms: u64,
    /// After focusing a window before sending a key to it.
    pub key_ms: u64,
    /// After a clipboard write, before the paste.
    pub clipboard_ms: u64,
    /// After foregrounding the conversation for a paste.
    pub focus_ms: u64,
    /// Between paste and confirm.
    pub paste_ms: u64,
    /// Between consecutive messages.
    pub between_messages_ms: u64,
}

impl SettleDelays {
    pub const SEARCH_MS: u64 = 1_000;
    pub const OPEN_MS: u64 = 1_000;
    pub const KEY_MS: u64 = 1_000;
    pub const CLIPBOARD_MS: u64 = 200;
    pub const FOCUS_MS: u64 = 700;
    pub const PASTE_MS: u64 = 300;
    pub const BETWEEN_MESSAGES_MS: u64 = 1_500;

    pub fn none() -> Self {
        Self {
            search_ms: 0,
            open_ms: 0,
            key_ms: 0,
            clipboard_ms: 0,
            focus_ms: 0,
            paste_ms: 0,
            between_messages_ms: 0,
        }
    }
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            search_ms: Self::SEARCH_MS,
            open_ms: Self::OPEN_MS,
            key_ms: Self::KEY_MS,
            clipboard_ms: Self::CLIPBOARD_MS,
            focus_ms: Self::FOCUS_MS,
            paste_ms: Self::PASTE_MS,
            between_messages_ms: Self::BETWEEN_MESSAGES_MS,
        }
    }
}

pub(crate) async fn settle(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
