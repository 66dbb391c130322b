// src/deliver/mod.rs
//! Delivery Driver: pushes new notices into the target conversation.
//!
//! `Idle → Opening → (OpenFailed → Idle) | Opened → Sending → Cleaning → Idle`
//!
//! Delivery is not transactional. Each message is reported as it happens, and a
//! failure after the conversation is open never rolls back what was already sent.
//! Whatever was typed into or opened on the host is put back on every exit path,
//! including an abandoned pass (`recover`).

pub mod automation;
pub mod xdotool;

use metrics::counter;

use crate::error::{AutomationError, DeliveryError, DeliveryStage};
use crate::notice::NoticeEntry;

use self::automation::{settle, ChatAutomation, KeyAction, SettleDelays, SurfaceHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Idle,
    Opening,
    OpenFailed,
    Opened,
    Sending,
    Cleaning,
}

impl DeliveryState {
    pub fn can_move_to(self, next: DeliveryState) -> bool {
        use DeliveryState::*;
        matches!(
            (self, next),
            (Idle, Opening)
                | (Opening, OpenFailed)
                | (Opening, Opened)
                | (OpenFailed, Idle)
                | (Opened, Sending)
                | (Sending, Cleaning)
                | (Cleaning, Idle)
        )
    }
}

/// What happened during one delivery pass.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Set when the conversation could not be opened; nothing was sent.
    pub open_error: Option<DeliveryError>,
    /// Ids pasted and confirmed, in send order.
    pub sent: Vec<u64>,
    /// Ids whose send sequence failed.
    pub failed: Vec<u64>,
    pub clean_error: Option<DeliveryError>,
}

impl DeliveryReport {
    pub fn opened(&self) -> bool {
        self.open_error.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.opened() && self.failed.is_empty() && self.clean_error.is_none()
    }
}

fn at(stage: DeliveryStage) -> impl Fn(AutomationError) -> DeliveryError {
    move |e| DeliveryError::from((stage, e))
}

pub struct DeliveryDriver<'a> {
    automation: &'a dyn ChatAutomation,
    delays: &'a SettleDelays,
    state: DeliveryState,
    /// Search input currently holding the typed target name.
    typed_search: Option<SurfaceHandle>,
    /// Conversation opened by this pass and not yet closed.
    conversation: Option<SurfaceHandle>,
}

impl<'a> DeliveryDriver<'a> {
    pub fn new(automation: &'a dyn ChatAutomation, delays: &'a SettleDelays) -> Self {
        Self {
            automation,
            delays,
            state: DeliveryState::Idle,
            typed_search: None,
            conversation: None,
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    fn transition(&mut self, next: DeliveryState) {
        debug_assert!(
            self.state.can_move_to(next),
            "illegal delivery transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(from = ?self.state, to = ?next, "delivery state");
        self.state = next;
    }

    /// Send one message per entry, in the order given, to conversation `target`.
    pub async fn deliver(&mut self, target: &str, entries: &[NoticeEntry]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if entries.is_empty() {
            return report;
        }

        self.transition(DeliveryState::Opening);
        let conversation = match self.open(target).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(target_name = target, error = %e, "could not open conversation");
                self.transition(DeliveryState::OpenFailed);
                self.restore_host().await;
                report.open_error = Some(e);
                self.transition(DeliveryState::Idle);
                return report;
            }
        };
        self.transition(DeliveryState::Opened);

        tracing::info!(
            target_name = target,
            count = entries.len(),
            "sending notices"
        );
        self.transition(DeliveryState::Sending);
        for entry in entries {
            match self.send_one(conversation, entry).await {
                Ok(()) => {
                    tracing::info!(id = entry.id, title = %entry.title, "message sent");
                    counter!("relay_messages_sent_total").increment(1);
                    report.sent.push(entry.id);
                }
                Err(e) => {
                    tracing::error!(id = entry.id, error = %e, "message send failed");
                    counter!("relay_messages_failed_total").increment(1);
                    report.failed.push(entry.id);
                }
            }
            settle(self.delays.between_messages_ms).await;
        }

        self.transition(DeliveryState::Cleaning);
        let cleaned = self.clean(conversation).await;
        self.conversation = None;
        self.typed_search = None;
        if let Err(e) = cleaned {
            tracing::error!(target_name = target, error = %e, "failed to clean conversation");
            report.clean_error = Some(e);
        } else {
            tracing::info!(target_name = target, "conversation closed");
        }
        self.transition(DeliveryState::Idle);

        report
    }

    /// Best-effort cleanup after `deliver` was dropped mid-pass: close the
    /// conversation if it was opened, otherwise clear a typed search.
    pub async fn recover(&mut self) {
        if self.state == DeliveryState::Idle {
            return;
        }
        tracing::warn!(state = ?self.state, "recovering abandoned delivery");
        self.restore_host().await;
        tracing::debug!(from = ?self.state, to = ?DeliveryState::Idle, "delivery state");
        self.state = DeliveryState::Idle;
    }

    /// Search for `target`, open it, and foreground its window.
    async fn open(&mut self, target: &str) -> Result<SurfaceHandle, DeliveryError> {
        let a = self.automation;
        let stage = DeliveryStage::Open;

        let search = a
            .locate_search_input()
            .await
            .map_err(at(stage))?
            .ok_or_else(|| DeliveryError::surface_missing(stage, "conversation search input"))?;

        a.inject_text(search, target).await.map_err(at(stage))?;
        self.typed_search = Some(search);
        settle(self.delays.search_ms).await;
        self.press_focused(search, KeyAction::Confirm)
            .await
            .map_err(at(stage))?;
        settle(self.delays.open_ms).await;

        let conversation = a
            .locate_conversation_input(target)
            .await
            .map_err(at(stage))?
            .ok_or_else(|| DeliveryError::surface_missing(stage, "conversation window"))?;

        self.conversation = Some(conversation);
        a.focus(conversation).await.map_err(at(stage))?;
        settle(self.delays.key_ms).await;
        Ok(conversation)
    }

    /// Close a conversation left open, else empty the search box if the target
    /// name is still in it.
    async fn restore_host(&mut self) {
        if let Some(conversation) = self.conversation.take() {
            self.typed_search = None;
            if let Err(e) = self.clean(conversation).await {
                tracing::error!(error = %e, "failed to clean conversation");
            }
            return;
        }
        if let Some(search) = self.typed_search.take() {
            if let Err(e) = self.automation.inject_text(search, "").await {
                tracing::warn!(error = %e, "could not clear conversation search input");
            }
        }
    }

    /// Clipboard write, then paste and confirm. The clipboard is ours until the
    /// paste lands.
    async fn send_one(
        &self,
        conversation: SurfaceHandle,
        entry: &NoticeEntry,
    ) -> Result<(), DeliveryError> {
        let a = self.automation;
        let stage = DeliveryStage::Send;

        a.write_clipboard(&entry.to_message())
            .await
            .map_err(at(stage))?;
        settle(self.delays.clipboard_ms).await;

        a.focus(conversation).await.map_err(at(stage))?;
        settle(self.delays.focus_ms).await;
        a.press(conversation, KeyAction::Paste)
            .await
            .map_err(at(stage))?;
        settle(self.delays.paste_ms).await;
        a.press(conversation, KeyAction::Confirm)
            .await
            .map_err(at(stage))?;
        Ok(())
    }

    /// Close the conversation view, then clear the search box.
    async fn clean(&self, conversation: SurfaceHandle) -> Result<(), DeliveryError> {
        let a = self.automation;
        let stage = DeliveryStage::Clean;

        let closed: Result<(), AutomationError> = async {
            a.focus(conversation).await?;
            settle(self.delays.key_ms).await;
            a.close(conversation).await
        }
        .await;
        let closed = closed.map_err(at(stage));

        let cleared = match a.locate_search_input().await.map_err(at(stage))? {
            Some(search) => a.inject_text(search, "").await.map_err(at(stage)),
            None => Err(DeliveryError::surface_missing(
                stage,
                "conversation search input",
            )),
        };

        closed.and(cleared)
    }

    async fn press_focused(
        &self,
        surface: SurfaceHandle,
        key: KeyAction,
    ) -> Result<(), AutomationError> {
        self.automation.focus(surface).await?;
        settle(self.delays.key_ms).await;
        self.automation.press(surface, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Host with a search box but no conversation window for the target.
    struct NoConversation {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl ChatAutomation for NoConversation {
        async fn locate_search_input(&self) -> Result<Option<SurfaceHandle>, AutomationError> {
            self.calls.lock().unwrap().push("locate_search");
            Ok(Some(SurfaceHandle(1)))
        }
        async fn locate_conversation_input(
            &self,
            _target: &str,
        ) -> Result<Option<SurfaceHandle>, AutomationError> {
            self.calls.lock().unwrap().push("locate_conversation");
            Ok(None)
        }
        async fn focus(&self, _s: SurfaceHandle) -> Result<(), AutomationError> {
            Ok(())
        }
        async fn inject_text(&self, _s: SurfaceHandle, _t: &str) -> Result<(), AutomationError> {
            self.calls.lock().unwrap().push("inject_text");
            Ok(())
        }
        async fn write_clipboard(&self, _t: &str) -> Result<(), AutomationError> {
            self.calls.lock().unwrap().push("write_clipboard");
            Ok(())
        }
        async fn press(&self, _s: SurfaceHandle, _k: KeyAction) -> Result<(), AutomationError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn missing_conversation_window_is_open_failure() {
        let host = NoConversation {
            calls: Mutex::new(vec![]),
        };
        let delays = SettleDelays::none();
        let mut driver = DeliveryDriver::new(&host, &delays);
        let entries = vec![NoticeEntry::new(1, "t", "d", "v?id=")];

        let report = driver.deliver("Room", &entries).await;

        assert!(!report.opened());
        assert_eq!(
            report.open_error.as_ref().map(|e| e.stage),
            Some(DeliveryStage::Open)
        );
        assert!(report.sent.is_empty());
        assert_eq!(driver.state(), DeliveryState::Idle);

        let calls = host.calls.lock().unwrap();
        assert!(!calls.contains(&"write_clipboard"));
        // Target name typed, then cleared again.
        assert_eq!(calls.iter().filter(|c| **c == "inject_text").count(), 2);
    }

    #[tokio::test]
    async fn recover_on_idle_driver_touches_nothing() {
        let host = NoConversation {
            calls: Mutex::new(vec![]),
        };
        let delays = SettleDelays::none();
        let mut driver = DeliveryDriver::new(&host, &delays);

        driver.recover().await;

        assert_eq!(driver.state(), DeliveryState::Idle);
        assert!(host.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn transitions_follow_the_delivery_cycle() {
        use DeliveryState::*;
        assert!(Idle.can_move_to(Opening));
        assert!(Opening.can_move_to(OpenFailed));
        assert!(OpenFailed.can_move_to(Idle));
        assert!(Cleaning.can_move_to(Idle));
        assert!(!Idle.can_move_to(Sending));
        assert!(!OpenFailed.can_move_to(Sending));
        assert!(!Sending.can_move_to(Idle));
    }

    #[tokio::test]
    async fn empty_batch_touches_nothing() {
        let host = NoConversation {
            calls: Mutex::new(vec![]),
        };
        let delays = SettleDelays::none();
        let mut driver = DeliveryDriver::new(&host, &delays);

        let report = driver.deliver("Room", &[]).await;

        assert!(report.sent.is_empty());
        assert!(host.calls.lock().unwrap().is_empty());
    }
}
