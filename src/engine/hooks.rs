//! engine::hooks
//!
//! Injected commit lifecycle callbacks.
//!
//! # Design
//!
//! Lifecycle customization is composition, not inheritance: callers inject
//! plain function values at three points.
//!
//! - the *pre-commit check* runs before any checkpoint is established; a
//!   `false` fails the whole commit
//! - the *post-commit hook* runs after all phases succeeded, before the
//!   instance becomes committed; an error sends the commit down the failure
//!   path. Nested instances are typically created and committed from here,
//!   sharing the root's execution context.
//! - the *committed observer* is the optional fire-and-forget follow-up,
//!   invoked after the instance is committed; the engine ignores anything it
//!   does
//!
//! Hooks are plain `FnMut` boxes: they may capture service handles and the
//! execution context, which is all a nested instance needs.

use super::convoy::CommitReport;
use super::error::CommitError;

/// The pre-commit check: `false` fails the whole commit.
pub type PreCommitCheck = Box<dyn FnMut() -> bool>;

/// The post-commit hook: an error routes the commit to the failure path.
pub type PostCommitHook = Box<dyn FnMut() -> Result<(), CommitError>>;

/// The committed observer: fire-and-forget, outcome ignored.
pub type CommittedObserver = Box<dyn FnMut(&CommitReport)>;

/// Container for the injected lifecycle callbacks.
///
/// All slots are optional; an empty slot is a no-op at that point.
#[derive(Default)]
pub struct Hooks {
    pub(crate) pre_commit: Option<PreCommitCheck>,
    pub(crate) post_commit: Option<PostCommitHook>,
    pub(crate) committed: Option<CommittedObserver>,
}

impl Hooks {
    /// Run the pre-commit check; absent means pass.
    pub(crate) fn run_pre_commit(&mut self) -> bool {
        match &mut self.pre_commit {
            Some(check) => check(),
            None => true,
        }
    }

    /// Run the post-commit hook; absent means success.
    pub(crate) fn run_post_commit(&mut self) -> Result<(), CommitError> {
        match &mut self.post_commit {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }

    /// Notify the committed observer, if any.
    pub(crate) fn notify_committed(&mut self, report: &CommitReport) {
        if let Some(observer) = &mut self.committed {
            observer(report);
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_commit", &self.pre_commit.is_some())
            .field("post_commit", &self.post_commit.is_some())
            .field("committed", &self.committed.is_some())
            .finish()
    }
}
