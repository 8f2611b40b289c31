//! `TerminalReporter` implements `ProgressReporter`.
//!
//! Wraps `&OutputContext` and implements the `application::ports::ProgressReporter`
//! trait so application services can emit progress events without depending on
//! any presentation type directly.

use std::cell::RefCell;

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::{OutputContext, progress};

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// On a TTY each `step()` runs a spinner until the next event; elsewhere it
/// prints `"  → {message}"`. Everything is suppressed when `ctx.quiet`.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    active: RefCell<Option<(ProgressBar, String)>>,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            active: RefCell::new(None),
        }
    }

    fn settle(&self) {
        if let Some((pb, message)) = self.active.borrow_mut().take() {
            progress::finish_ok(&pb, &message);
        }
    }

    /// Stop the active spinner, if any, with a failure mark.
    pub fn fail(&self, message: &str) {
        if let Some((pb, _)) = self.active.borrow_mut().take() {
            progress::finish_error(&pb, message);
        }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        self.settle();
        if self.ctx.show_progress() {
            *self.active.borrow_mut() = Some((progress::spinner(message), message.to_string()));
        } else {
            println!("  {} {message}", "→".style(self.ctx.styles.info));
        }
    }

    fn success(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        if let Some((pb, _)) = self.active.borrow_mut().take() {
            progress::finish_ok(&pb, message);
            return;
        }
        self.ctx.success(message);
    }

    fn warn(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        self.settle();
        self.ctx.warn(message);
    }
}

impl Drop for TerminalReporter<'_> {
    fn drop(&mut self) {
        if let Some((pb, _)) = self.active.get_mut().take() {
            pb.finish_and_clear();
        }
    }
}
