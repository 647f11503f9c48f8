use fras_core::LoopStatus;
use std::io::Write;

/// Prints the loop status line, once per change.
pub struct StatusReporter<W: Write> {
    out: W,
    last: Option<String>,
}

impl<W: Write> StatusReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    /// Show `status` if it differs from what is currently displayed.
    pub fn report(&mut self, status: &LoopStatus) -> bool {
        self.message(&status.to_string())
    }

    /// Show free text (startup notices and the like) through the same line.
    pub fn message(&mut self, text: &str) -> bool {
        if self.last.as_deref() == Some(text) {
            return false;
        }
        if let Err(e) = writeln!(self.out, "{text}").and_then(|_| self.out.flush()) {
            tracing::warn!(error = %e, "failed to write status");
        }
        self.last = Some(text.to_string());
        true
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fras_core::CheckOutcome;

    #[test]
    fn test_repeats_are_suppressed() {
        let mut r = StatusReporter::new(Vec::new());
        assert!(r.report(&LoopStatus::Idle));
        assert!(!r.report(&LoopStatus::Idle));
        assert!(r.report(&LoopStatus::Checking));
        assert!(r.report(&LoopStatus::Idle));

        let text = String::from_utf8(r.output().clone()).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_reports_outcome_text() {
        let mut r = StatusReporter::new(Vec::new());
        r.report(&LoopStatus::Reported(CheckOutcome::Matched {
            student_id: "S1".into(),
            distance: 0.42,
        }));
        let last = r.last().unwrap();
        assert!(last.contains("S1"));
        assert!(last.contains("0.420"));
    }
}
