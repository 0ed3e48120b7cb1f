use std::fmt;
use std::sync::Arc;

use super::ChannelId;
use super::TaskId;
use crate::HookError;

pub type HookResult = std::result::Result<(), HookError>;

pub type ValidateFn = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;
pub type PreGetFn = Arc<dyn Fn(ChannelId) -> HookResult + Send + Sync>;
/// May rewrite the proposed bytes in place before they are committed.
pub type PreSetFn = Arc<dyn Fn(ChannelId, &mut [u8]) -> HookResult + Send + Sync>;
pub type PosSetFn = Arc<dyn Fn(ChannelId, &[u8]) -> HookResult + Send + Sync>;
/// Subscriber callbacks run on the dispatcher worker; keep them short.
pub type CallbackFn = Arc<dyn Fn(ChannelId) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    PreGet,
    PreSet,
    PosSet,
}

impl fmt::Display for HookStage {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            HookStage::PreGet => f.write_str("pre_get"),
            HookStage::PreSet => f.write_str("pre_set"),
            HookStage::PosSet => f.write_str("pos_set"),
        }
    }
}

/// Optional hook slots; an empty slot is a no-op.
#[derive(Clone, Default)]
pub struct Hooks {
    pub validate: Option<ValidateFn>,
    pub pre_get: Option<PreGetFn>,
    pub pre_set: Option<PreSetFn>,
    pub pos_set: Option<PosSetFn>,
}

impl fmt::Debug for Hooks {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("validate", &self.validate.is_some())
            .field("pre_get", &self.pre_get.is_some())
            .field("pre_set", &self.pre_set.is_some())
            .field("pos_set", &self.pos_set.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct Subscriber {
    pub task: TaskId,
    pub callback: CallbackFn,
}

impl fmt::Debug for Subscriber {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscriber").field("task", &self.task).finish()
    }
}

/// Declarative description of one channel.
///
/// An ordered list of specs is turned into the registry at startup, either
/// built in code or resolved from a manifest file.
///
/// ```ignore
/// let spec = ChannelSpec::new("PERSISTENT_VAL", 1)
///     .initial(&[0x01])
///     .persistent(true)
///     .validate(|v| v[0] != 0)
///     .publisher(TaskId(1))
///     .subscriber(TaskId(2), |id| println!("changed: {id}"));
/// ```
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub name: String,
    pub size: usize,
    pub initial: Vec<u8>,
    pub persistent: bool,
    pub readable: bool,
    pub writable: bool,
    /// Debounce byte-identical writes (no callback on unchanged value)
    pub on_changed: bool,
    pub hooks: Hooks,
    pub publishers: Vec<TaskId>,
    pub subscribers: Vec<Subscriber>,
}

impl ChannelSpec {
    pub fn new(
        name: impl Into<String>,
        size: usize,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            initial: Vec::new(),
            persistent: false,
            readable: true,
            writable: true,
            on_changed: true,
            hooks: Hooks::default(),
            publishers: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Initial contents; shorter values are zero-padded to the channel size.
    pub fn initial(
        mut self,
        value: &[u8],
    ) -> Self {
        self.initial = value.to_vec();
        self
    }

    pub fn persistent(
        mut self,
        persistent: bool,
    ) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    /// Notify subscribers on every successful set, even when the value is
    /// unchanged.
    pub fn notify_always(mut self) -> Self {
        self.on_changed = false;
        self
    }

    pub fn validate<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        self.hooks.validate = Some(Arc::new(f));
        self
    }

    pub fn pre_get<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(ChannelId) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.pre_get = Some(Arc::new(f));
        self
    }

    pub fn pre_set<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(ChannelId, &mut [u8]) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.pre_set = Some(Arc::new(f));
        self
    }

    pub fn pos_set<F>(
        mut self,
        f: F,
    ) -> Self
    where
        F: Fn(ChannelId, &[u8]) -> HookResult + Send + Sync + 'static,
    {
        self.hooks.pos_set = Some(Arc::new(f));
        self
    }

    pub fn hooks(
        mut self,
        hooks: Hooks,
    ) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn publisher(
        mut self,
        task: TaskId,
    ) -> Self {
        if !self.publishers.contains(&task) {
            self.publishers.push(task);
        }
        self
    }

    pub fn subscriber<F>(
        mut self,
        task: TaskId,
        callback: F,
    ) -> Self
    where
        F: Fn(ChannelId) + Send + Sync + 'static,
    {
        self.subscribers.push(Subscriber {
            task,
            callback: Arc::new(callback),
        });
        self
    }

    pub fn subscriber_fn(
        mut self,
        task: TaskId,
        callback: CallbackFn,
    ) -> Self {
        self.subscribers.push(Subscriber { task, callback });
        self
    }
}
