//! Stage notifications and cooperative cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Major pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    LoadingFeatures,
    LearningWeights,
    CombiningKernels,
    Solving,
    Scoring,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadingFeatures => "loading features",
            Self::LearningWeights => "learning weights",
            Self::CombiningKernels => "combining kernels",
            Self::Solving => "solving",
            Self::Scoring => "scoring",
        };
        f.write_str(name)
    }
}

/// Observer consulted by the engine at every stage boundary.
///
/// `is_cancelled` is polled before each stage starts; once it returns `true`
/// the query stops and reports no result.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage is about to run
    fn on_stage(&self, _stage: Stage) {}

    fn is_cancelled(&self) -> bool;
}

/// Reporter that never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shareable cancellation flag.
///
/// Clones observe the same flag, so one clone can be handed to a running
/// query while another cancels it.
///
/// # Examples
///
/// ```rust
/// use netfuse_core::progress::{CancellationToken, ProgressReporter};
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl ProgressReporter for CancellationToken {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
