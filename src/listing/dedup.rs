//! Collapsing of identical consecutive listing lines
//!
//! A run of N identical lines is printed once, followed by an annotation
//! counting the N-1 repeats. The pending line is released when a different
//! line arrives or when [`Deduplicator::finish`] is called at end of block.

use std::fmt;

/// One released line together with how many times it repeated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coalesced {
    pub line: String,
    /// Additional identical occurrences after the first
    pub repeats: usize,
}

impl Coalesced {
    /// Annotation printed after a repeated line, if any
    pub fn annotation(&self) -> Option<String> {
        (self.repeats > 0)
            .then(|| format!("*** last message repeated {} times ***", self.repeats))
    }

    /// The line followed by its annotation
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.line.clone()).chain(self.annotation())
    }
}

impl fmt::Display for Coalesced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.line)?;
        if let Some(annotation) = self.annotation() {
            write!(f, "\n{}", annotation)?;
        }
        Ok(())
    }
}

/// Pending-line register for one block's output
#[derive(Debug, Default)]
pub struct Deduplicator {
    pending: Option<String>,
    repeats: usize,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer the next line; returns the previous run once it has ended
    pub fn feed(&mut self, line: String) -> Option<Coalesced> {
        match &self.pending {
            Some(pending) if *pending == line => {
                self.repeats += 1;
                None
            }
            _ => {
                let released = self.take();
                self.pending = Some(line);
                released
            }
        }
    }

    /// Release the pending run, if any
    pub fn finish(&mut self) -> Option<Coalesced> {
        self.take()
    }

    fn take(&mut self) -> Option<Coalesced> {
        let line = self.pending.take()?;
        let repeats = std::mem::take(&mut self.repeats);
        Some(Coalesced { line, repeats })
    }
}
