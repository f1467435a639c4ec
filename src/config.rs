//! Compilation options shared by every phase.

use crate::codegen::defs::JAVA_1_8;

/// What the resolver does with statements that can never execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnreachablePolicy {
    /// Report a semantic error at the first unreachable statement
    #[default]
    Reject,
    /// Log a warning and drop the dead code from the output
    Elide,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Class-file major version written to every generated class
    pub target_version: u16,
    pub debug_lines: bool,
    pub debug_vars: bool,
    pub debug_source: bool,
    pub emit_stack_maps: bool,
    pub unreachable: UnreachablePolicy,
    /// Keep resolving past member-level errors and report them together
    pub batch_mode: bool,
    pub max_errors: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_version: JAVA_1_8,
            debug_lines: true,
            debug_vars: false,
            debug_source: true,
            emit_stack_maps: true,
            unreachable: UnreachablePolicy::Reject,
            batch_mode: false,
            max_errors: 100,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target_version(mut self, major: u16) -> Self {
        self.target_version = major;
        self
    }

    /// `-g`: lines, variables and source file.
    pub fn with_full_debug(mut self) -> Self {
        self.debug_lines = true;
        self.debug_vars = true;
        self.debug_source = true;
        self
    }

    pub fn with_no_debug(mut self) -> Self {
        self.debug_lines = false;
        self.debug_vars = false;
        self.debug_source = false;
        self
    }

    pub fn with_unreachable(mut self, policy: UnreachablePolicy) -> Self {
        self.unreachable = policy;
        self
    }

    pub fn with_batch_mode(mut self, max_errors: usize) -> Self {
        self.batch_mode = true;
        self.max_errors = max_errors.max(1);
        self
    }

    /// Stack maps are only meaningful for type-checking verifiers (version 50+).
    pub fn wants_stack_maps(&self) -> bool {
        self.emit_stack_maps && self.target_version >= 50
    }
}
