use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::CallbackFn;
use crate::ChannelId;
use crate::HookResult;
use crate::PosSetFn;
use crate::PreGetFn;
use crate::PreSetFn;
use crate::ValidateFn;

/// Name of the builtin validator rejecting all-zero values
pub const NON_ZERO: &str = "non_zero";

/// Accepts any value with at least one nonzero byte.
pub fn non_zero(value: &[u8]) -> bool {
    value.iter().any(|b| *b != 0)
}

/// Named behavior a manifest can refer to.
#[derive(Clone, Default)]
pub struct Handlers {
    pub(crate) validators: HashMap<String, ValidateFn>,
    pub(crate) pre_gets: HashMap<String, PreGetFn>,
    pub(crate) pre_sets: HashMap<String, PreSetFn>,
    pub(crate) pos_sets: HashMap<String, PosSetFn>,
    /// Subscriber callback of each task, by task name
    pub(crate) callbacks: HashMap<String, CallbackFn>,
}

impl fmt::Debug for Handlers {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut callbacks: Vec<&String> = self.callbacks.keys().collect();
        callbacks.sort();
        f.debug_struct("Handlers")
            .field("validators", &self.validators.len())
            .field("pre_gets", &self.pre_gets.len())
            .field("pre_sets", &self.pre_sets.len())
            .field("pos_sets", &self.pos_sets.len())
            .field("callbacks", &callbacks)
            .finish()
    }
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the builtin [`NON_ZERO`] validator.
    pub fn with_builtins() -> Self {
        Self::new().validator(NON_ZERO, non_zero)
    }

    pub fn validator<F>(
        mut self,
        name: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.validators.insert(name.into(), Arc::new(f));
        self
    }

    pub fn pre_get<F>(
        mut self,
        name: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: Fn(ChannelId) -> HookResult + Send + Sync + 'static,
    {
        self.pre_gets.insert(name.into(), Arc::new(f));
        self
    }

    pub fn pre_set<F>(
        mut self,
        name: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: Fn(ChannelId, &mut [u8]) -> HookResult + Send + Sync + 'static,
    {
        self.pre_sets.insert(name.into(), Arc::new(f));
        self
    }

    pub fn pos_set<F>(
        mut self,
        name: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: Fn(ChannelId, &[u8]) -> HookResult + Send + Sync + 'static,
    {
        self.pos_sets.insert(name.into(), Arc::new(f));
        self
    }

    /// Callback run for every channel `task` subscribes to.
    pub fn callback<F>(
        mut self,
        task: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: Fn(ChannelId) + Send + Sync + 'static,
    {
        self.callbacks.insert(task.into(), Arc::new(f));
        self
    }

    pub fn has_callback(
        &self,
        task: &str,
    ) -> bool {
        self.callbacks.contains_key(task)
    }
}
