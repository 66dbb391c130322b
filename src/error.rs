// src/error.rs
//! Error taxonomy for the relay pipeline.
//!
//! None of these are fatal to the process: a failed run is reported through
//! `RunOutcome` and the next scheduled trigger simply tries again.

use std::fmt;

/// Source page could not be fetched. Deferred to the next trigger.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("notice board returned HTTP {status}")]
    Status { status: u16 },

    #[error("notice board request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// One announcement block could not be turned into a `NoticeEntry`.
/// The block is skipped; the rest of the page is still processed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("block has no anchor to read the notice from")]
    MissingLink,

    #[error("anchor carries no notice identifier")]
    MissingIdentifier,

    #[error("notice identifier {0:?} is not a positive integer")]
    InvalidIdentifier(String),

    #[error("notice {id} has an empty title")]
    EmptyTitle { id: u64 },

    #[error("notice {id} has no publication date")]
    MissingDate { id: u64 },
}

/// A single step against the host chat application failed.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStage {
    Open,
    Send,
    Clean,
}

impl fmt::Display for DeliveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeliveryStage::Open => "open",
            DeliveryStage::Send => "send",
            DeliveryStage::Clean => "clean",
        })
    }
}

/// A delivery stage could not complete. Either an automation step failed
/// (`source`) or a host surface was not found (`missing`).
#[derive(Debug, thiserror::Error)]
pub struct DeliveryError {
    pub stage: DeliveryStage,
    missing: Option<&'static str>,
    #[source]
    pub source: Option<AutomationError>,
}

impl DeliveryError {
    pub fn surface_missing(stage: DeliveryStage, what: &'static str) -> Self {
        Self {
            stage,
            missing: Some(what),
            source: None,
        }
    }

    pub fn missing_surface(&self) -> Option<&'static str> {
        self.missing
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery failed at stage {}", self.stage)?;
        match (&self.source, self.missing) {
            (Some(e), _) => write!(f, ": {e}"),
            (None, Some(what)) => write!(f, ": {what} not found"),
            (None, None) => Ok(()),
        }
    }
}

impl From<(DeliveryStage, AutomationError)> for DeliveryError {
    fn from((stage, err): (DeliveryStage, AutomationError)) -> Self {
        Self {
            stage,
            missing: None,
            source: Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_error_names_its_stage() {
        let e = DeliveryError::surface_missing(DeliveryStage::Clean, "search input");
        assert_eq!(e.stage, DeliveryStage::Clean);
        assert_eq!(
            e.to_string(),
            "delivery failed at stage clean: search input not found"
        );
    }

    #[test]
    fn automation_failure_stays_in_the_source_chain() {
        use std::error::Error as _;

        let e = DeliveryError::from((
            DeliveryStage::Send,
            AutomationError::Spawn {
                program: "xclip",
                source: std::io::Error::other("no display"),
            },
        ));
        assert_eq!(e.stage, DeliveryStage::Send);
        assert_eq!(e.missing_surface(), None);

        let source = e.source().expect("automation error kept as source");
        assert!(source.downcast_ref::<AutomationError>().is_some());
        assert_eq!(
            source.source().map(|io| io.to_string()),
            Some("no display".to_string())
        );
        assert_eq!(
            e.to_string(),
            "delivery failed at stage send: failed to launch xclip: no display"
        );
    }

    #[test]
    fn missing_surface_has_no_source() {
        use std::error::Error as _;

        let e = DeliveryError::surface_missing(DeliveryStage::Open, "conversation window");
        assert!(e.source().is_none());
        assert_eq!(e.missing_surface(), Some("conversation window"));
    }

    #[test]
    fn fetch_status_message() {
        let e = FetchError::Status { status: 503 };
        assert_eq!(e.to_string(), "notice board returned HTTP 503");
    }
}
