//! Step and attempt outcomes.

/// Result of a step, an attempt, or a whole build run.
///
/// `Repeat` asks the driver to discard the attempt and start over from a
/// clean build directory. It never survives as the final result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
    Skip,
    Repeat,
}

impl Outcome {
    pub fn from_exit(success: bool) -> Self {
        if success {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }

    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }

    /// Fold a trailer step's outcome into the attempt result. The second
    /// value tells whether the trailer must stop.
    pub fn with_trailer(self, step: Outcome) -> (Outcome, bool) {
        match step {
            Outcome::Failure if self == Outcome::Repeat => (Outcome::Repeat, true),
            Outcome::Failure => (Outcome::Failure, true),
            Outcome::Repeat => (Outcome::Repeat, false),
            Outcome::Success | Outcome::Skip => (self, false),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Skip => "skip",
            Outcome::Repeat => "repeat",
        };
        f.write_str(s)
    }
}
