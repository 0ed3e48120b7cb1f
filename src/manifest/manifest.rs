use std::collections::HashMap;
use std::collections::HashSet;

use config::Config;
use config::File;
use config::FileFormat;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::Handlers;
use crate::ChannelSpec;
use crate::Hooks;
use crate::ManifestError;
use crate::Result;
use crate::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDecl {
    pub name: String,
    pub id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDecl {
    pub name: String,
    pub size: usize,

    /// Initial bytes, zero-padded to `size`
    #[serde(default)]
    pub initial: Vec<i64>,

    #[serde(default)]
    pub persistent: bool,

    #[serde(default)]
    pub read_only: bool,

    #[serde(default)]
    pub write_only: bool,

    #[serde(default = "default_on_changed")]
    pub on_changed: bool,

    #[serde(default)]
    pub validate: Option<String>,

    #[serde(default)]
    pub pre_get: Option<String>,

    #[serde(default)]
    pub pre_set: Option<String>,

    #[serde(default)]
    pub pos_set: Option<String>,

    /// Task names allowed to set the channel
    #[serde(default)]
    pub publishers: Vec<String>,

    /// Task names notified on change
    #[serde(default)]
    pub subscribers: Vec<String>,
}

fn default_on_changed() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub tasks: Vec<TaskDecl>,

    /// Channel ids follow declaration order
    #[serde(default)]
    pub channels: Vec<ChannelDecl>,
}

impl Manifest {
    /// Loads a manifest file; the format follows the file extension.
    pub fn load(path: &str) -> Result<Self> {
        let manifest = Config::builder()
            .add_source(File::with_name(path).required(true))
            .build()?
            .try_deserialize()?;
        Ok(manifest)
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        let manifest = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(manifest)
    }

    pub fn task_id(
        &self,
        name: &str,
    ) -> Option<TaskId> {
        self.tasks.iter().find(|t| t.name == name).map(|t| TaskId(t.id))
    }

    /// Turns the declarations into channel specs, in declaration order.
    ///
    /// # Errors
    /// Duplicated or reserved tasks, references to undeclared tasks or
    /// unregistered handlers, subscribers without a callback and initial
    /// bytes out of range. Channel sizes and names are checked when the
    /// registry is built.
    pub fn resolve(
        &self,
        handlers: &Handlers,
    ) -> std::result::Result<Vec<ChannelSpec>, ManifestError> {
        let tasks = self.task_table()?;
        let specs = self
            .channels
            .iter()
            .map(|decl| Self::resolve_channel(decl, &tasks, handlers))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("manifest resolved: {} tasks, {} channels", tasks.len(), specs.len());
        Ok(specs)
    }

    fn task_table(&self) -> std::result::Result<HashMap<&str, TaskId>, ManifestError> {
        let mut tasks = HashMap::with_capacity(self.tasks.len());
        let mut ids = HashSet::with_capacity(self.tasks.len());

        for task in &self.tasks {
            let id = TaskId(task.id);
            if id == TaskId::STORAGE || !ids.insert(id) {
                return Err(ManifestError::InvalidTaskId {
                    name: task.name.clone(),
                    id: task.id,
                });
            }
            if tasks.insert(task.name.as_str(), id).is_some() {
                return Err(ManifestError::DuplicateTask(task.name.clone()));
            }
        }
        Ok(tasks)
    }

    fn resolve_channel(
        decl: &ChannelDecl,
        tasks: &HashMap<&str, TaskId>,
        handlers: &Handlers,
    ) -> std::result::Result<ChannelSpec, ManifestError> {
        let initial = decl
            .initial
            .iter()
            .map(|b| {
                u8::try_from(*b).map_err(|_| ManifestError::InvalidInitialByte {
                    name: decl.name.clone(),
                    value: *b,
                })
            })
            .collect::<std::result::Result<Vec<u8>, _>>()?;

        let hooks = Hooks {
            validate: lookup(&decl.name, "validate", &decl.validate, &handlers.validators)?,
            pre_get: lookup(&decl.name, "pre_get", &decl.pre_get, &handlers.pre_gets)?,
            pre_set: lookup(&decl.name, "pre_set", &decl.pre_set, &handlers.pre_sets)?,
            pos_set: lookup(&decl.name, "pos_set", &decl.pos_set, &handlers.pos_sets)?,
        };

        let mut spec = ChannelSpec::new(decl.name.clone(), decl.size)
            .initial(&initial)
            .persistent(decl.persistent)
            .hooks(hooks);
        if decl.read_only {
            spec = spec.read_only();
        }
        if decl.write_only {
            spec = spec.write_only();
        }
        if !decl.on_changed {
            spec = spec.notify_always();
        }

        for name in &decl.publishers {
            spec = spec.publisher(task_ref(&decl.name, name, tasks)?);
        }
        for name in &decl.subscribers {
            let task = task_ref(&decl.name, name, tasks)?;
            let callback = handlers
                .callbacks
                .get(name)
                .cloned()
                .ok_or_else(|| ManifestError::MissingCallback(name.clone()))?;
            spec = spec.subscriber_fn(task, callback);
        }

        Ok(spec)
    }
}

fn task_ref(
    channel: &str,
    name: &str,
    tasks: &HashMap<&str, TaskId>,
) -> std::result::Result<TaskId, ManifestError> {
    tasks.get(name).copied().ok_or_else(|| ManifestError::UnknownTask {
        channel: channel.to_string(),
        task: name.to_string(),
    })
}

fn lookup<T: Clone>(
    channel: &str,
    kind: &'static str,
    name: &Option<String>,
    table: &HashMap<String, T>,
) -> std::result::Result<Option<T>, ManifestError> {
    match name {
        None => Ok(None),
        Some(name) => table
            .get(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| ManifestError::UnknownHandler {
                channel: channel.to_string(),
                kind,
                handler: name.clone(),
            }),
    }
}
