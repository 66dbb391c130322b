// src/deliver/xdotool.rs
//! X11 adapter: windows are found by exact title with `xdotool`, the clipboard
//! is written through `xclip`.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::automation::{ChatAutomation, KeyAction, SurfaceHandle};
use crate::error::AutomationError;

const XDOTOOL: &str = "xdotool";
const XCLIP: &str = "xclip";

pub struct XdoToolAutomation {
    host_window_title: String,
}

impl XdoToolAutomation {
    pub fn new(host_window_title: impl Into<String>) -> Self {
        Self {
            host_window_title: host_window_title.into(),
        }
    }

    async fn xdotool(&self, args: &[&str]) -> Result<std::process::Output, AutomationError> {
        Command::new(XDOTOOL)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| AutomationError::Spawn {
                program: XDOTOOL,
                source,
            })
    }

    async fn xdotool_ok(&self, args: &[&str]) -> Result<(), AutomationError> {
        let out = self.xdotool(args).await?;
        if out.status.success() {
            return Ok(());
        }
        Err(AutomationError::Command {
            program: XDOTOOL,
            status: out.status,
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        })
    }

    /// First window whose title is exactly `title`.
    async fn window_by_title(&self, title: &str) -> Result<Option<SurfaceHandle>, AutomationError> {
        let pattern = format!("^{}$", regex::escape(title));
        let out = self.xdotool(&["search", "--name", pattern.as_str()]).await?;

        // No match is exit 1 with nothing on stderr.
        if !out.status.success() && !out.stderr.is_empty() {
            return Err(AutomationError::Command {
                program: XDOTOOL,
                status: out.status,
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&out.stdout)
            .lines()
            .find_map(|l| l.trim().parse::<u64>().ok())
            .map(SurfaceHandle))
    }
}

fn key_name(key: KeyAction) -> &'static str {
    match key {
        KeyAction::Paste => "ctrl+v",
        KeyAction::Confirm => "Return",
        KeyAction::Cancel => "Escape",
    }
}

#[async_trait]
impl ChatAutomation for XdoToolAutomation {
    async fn locate_search_input(&self) -> Result<Option<SurfaceHandle>, AutomationError> {
        self.window_by_title(&self.host_window_title).await
    }

    async fn locate_conversation_input(
        &self,
        target: &str,
    ) -> Result<Option<SurfaceHandle>, AutomationError> {
        self.window_by_title(target).await
    }

    async fn focus(&self, surface: SurfaceHandle) -> Result<(), AutomationError> {
        let id = surface.0.to_string();
        self.xdotool_ok(&["windowactivate", "--sync", id.as_str()]).await
    }

    async fn inject_text(&self, surface: SurfaceHandle, text: &str) -> Result<(), AutomationError> {
        let id = surface.0.to_string();
        let mut args = vec![
            "windowactivate",
            "--sync",
            id.as_str(),
            "key",
            "--clearmodifiers",
            "ctrl+a",
            "BackSpace",
        ];
        if !text.is_empty() {
            args.extend(["type", "--delay", "0", "--", text]);
        }
        self.xdotool_ok(&args).await
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), AutomationError> {
        // xclip forks to serve the selection, so its stdout must not be captured.
        let mut child = Command::new(XCLIP)
            .args(["-selection", "clipboard"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AutomationError::Spawn {
                program: XCLIP,
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|source| AutomationError::Spawn {
                    program: XCLIP,
                    source,
                })?;
        }

        let status = child.wait().await.map_err(|source| AutomationError::Spawn {
            program: XCLIP,
            source,
        })?;
        if !status.success() {
            return Err(AutomationError::Command {
                program: XCLIP,
                status,
                stderr: String::new(),
            });
        }
        Ok(())
    }

    async fn press(&self, surface: SurfaceHandle, key: KeyAction) -> Result<(), AutomationError> {
        let id = surface.0.to_string();
        self.xdotool_ok(&[
            "windowactivate",
            "--sync",
            id.as_str(),
            "key",
            "--clearmodifiers",
            key_name(key),
        ])
        .await
    }
}
