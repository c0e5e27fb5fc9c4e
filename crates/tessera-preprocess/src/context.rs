//! Per-document side channel.
//!
//! Processors running in parallel append head and script lines here. The
//! reassembler drains it exactly once.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::snippet::StructuralKind;

/// Lines collected for one document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SideChannelLines {
    /// Lines for the document head.
    pub head: Vec<String>,
    /// Lines for the instance script.
    pub script: Vec<String>,
    /// Lines for the module script.
    pub module: Vec<String>,
    /// Files the output depends on.
    pub dependencies: Vec<PathBuf>,
}

/// Structural blocks found in the document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StructurePresence {
    /// An instance `<script>` block.
    pub instance_script: bool,
    /// A module `<script>` block.
    pub module_script: bool,
    /// A `<svelte:head>` block.
    pub head: bool,
}

/// Append-only buffers shared by the processors of one document.
#[derive(Debug, Default)]
pub struct SideChannel {
    lines: Mutex<SideChannelLines>,
    math_seen: AtomicBool,
    code_seen: AtomicBool,
    instance_script: AtomicBool,
    module_script: AtomicBool,
    head: AtomicBool,
}

impl SideChannel {
    /// Create an empty side channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_lines(&self, f: impl FnOnce(&mut SideChannelLines)) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut lines);
    }

    /// Append lines for the document head.
    pub fn push_head(&self, lines: impl IntoIterator<Item = String>) {
        self.with_lines(|l| l.head.extend(lines));
    }

    /// Append lines for the instance script.
    pub fn push_script(&self, lines: impl IntoIterator<Item = String>) {
        self.with_lines(|l| l.script.extend(lines));
    }

    /// Append lines for the module script.
    pub fn push_module(&self, lines: impl IntoIterator<Item = String>) {
        self.with_lines(|l| l.module.extend(lines));
    }

    /// Record files the output depends on.
    pub fn push_dependencies(&self, paths: impl IntoIterator<Item = PathBuf>) {
        self.with_lines(|l| l.dependencies.extend(paths));
    }

    /// Mark that the document has math. Returns `true` the first time only.
    pub fn mark_math(&self) -> bool {
        !self.math_seen.swap(true, Ordering::AcqRel)
    }

    /// Mark that the document has code. Returns `true` the first time only.
    pub fn mark_code(&self) -> bool {
        !self.code_seen.swap(true, Ordering::AcqRel)
    }

    /// Whether any math snippet was seen.
    #[must_use]
    pub fn has_math(&self) -> bool {
        self.math_seen.load(Ordering::Acquire)
    }

    /// Whether any code snippet was seen.
    #[must_use]
    pub fn has_code(&self) -> bool {
        self.code_seen.load(Ordering::Acquire)
    }

    /// Record a structural block.
    pub fn note_structural(&self, kind: StructuralKind) {
        let flag = match kind {
            StructuralKind::Script { module: true } => &self.module_script,
            StructuralKind::Script { module: false } => &self.instance_script,
            StructuralKind::Head => &self.head,
            _ => return,
        };
        flag.store(true, Ordering::Release);
    }

    /// Structural blocks recorded so far.
    #[must_use]
    pub fn structure(&self) -> StructurePresence {
        StructurePresence {
            instance_script: self.instance_script.load(Ordering::Acquire),
            module_script: self.module_script.load(Ordering::Acquire),
            head: self.head.load(Ordering::Acquire),
        }
    }

    /// Drain the collected lines.
    pub fn take(&self) -> SideChannelLines {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *lines)
    }
}
