//! Check-cycle outcomes and the user-facing loop status.

use crate::types::{EmbeddingError, MatchResult};
use std::fmt;

/// How one checking cycle ended. None of these stop the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Matched { student_id: String, distance: f32 },
    NoMatch { distance: Option<f32> },
    NoFaceFound,
    InvalidEmbedding(EmbeddingError),
    /// The match request failed; shown like a no-match, never retried.
    TransportError(String),
}

impl CheckOutcome {
    /// Map a match-service answer onto an outcome.
    pub fn from_match(result: MatchResult) -> Self {
        match result {
            MatchResult {
                matched: true,
                student_id: Some(student_id),
                distance,
            } => Self::Matched {
                student_id,
                distance: distance.unwrap_or(0.0),
            },
            MatchResult { distance, .. } => Self::NoMatch { distance },
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched {
                student_id,
                distance,
            } => write!(f, "Attendance marked: {student_id} (dist {distance:.3})"),
            Self::NoMatch {
                distance: Some(d),
            } => write!(f, "No match (closest dist {d:.3})"),
            Self::NoMatch { distance: None } => write!(f, "No match (closest dist N/A)"),
            Self::NoFaceFound => write!(f, "No face found"),
            Self::InvalidEmbedding(e) => write!(f, "Invalid embedding: {e}"),
            Self::TransportError(e) => write!(f, "Face check error: {e}"),
        }
    }
}

/// The only trigger-loop state exposed to the outside.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopStatus {
    /// No hand raised.
    Idle,
    /// Hand raised, but a check ran too recently (or is still running).
    Cooldown,
    /// Hand raised and a check is in flight.
    Checking,
    /// A check just finished.
    Reported(CheckOutcome),
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "No hand raised"),
            Self::Cooldown => write!(f, "Hand raised (cooldown)"),
            Self::Checking => write!(f, "Hand raised, checking face..."),
            Self::Reported(outcome) => outcome.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matched_text_has_id_and_three_decimals() {
        let outcome = CheckOutcome::from_match(MatchResult {
            matched: true,
            student_id: Some("S1".into()),
            distance: Some(0.42),
        });
        let text = LoopStatus::Reported(outcome).to_string();
        assert!(text.contains("S1"), "{text}");
        assert!(text.contains("0.420"), "{text}");
    }

    #[test]
    fn test_no_match_text() {
        let outcome = CheckOutcome::from_match(MatchResult {
            matched: false,
            student_id: None,
            distance: Some(0.71234),
        });
        assert_eq!(outcome.to_string(), "No match (closest dist 0.712)");
        assert_eq!(
            CheckOutcome::NoMatch { distance: None }.to_string(),
            "No match (closest dist N/A)"
        );
    }

    #[test]
    fn test_matched_without_id_is_no_match() {
        let outcome = CheckOutcome::from_match(MatchResult {
            matched: true,
            student_id: None,
            distance: Some(0.3),
        });
        assert!(!outcome.is_match());
    }

    #[test]
    fn test_invalid_embedding_text() {
        let outcome = CheckOutcome::InvalidEmbedding(EmbeddingError::InvalidLength {
            expected: 128,
            actual: 64,
        });
        assert_eq!(
            outcome.to_string(),
            "Invalid embedding: expected 128 values, got 64"
        );
    }
}
