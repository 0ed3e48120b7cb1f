use std::collections::HashSet;

use tracing::debug;

use super::Channel;
use super::MAX_CHANNEL_COUNT;
use super::MAX_CHANNEL_SIZE;
use crate::ChannelError;
use crate::ChannelId;
use crate::ChannelResult;
use crate::ChannelSpec;
use crate::ManifestError;
use crate::TaskId;

/// Fixed table of channels; ids are the positions in the spec list.
#[derive(Debug)]
pub struct Registry {
    channels: Box<[Channel]>,
}

impl Registry {
    /// Builds the registry from an ordered list of channel specs.
    ///
    /// # Errors
    /// Rejects empty or duplicated names, sizes outside `1..=MAX_CHANNEL_SIZE`,
    /// initial values longer than the channel, and use of the reserved
    /// [`TaskId::STORAGE`] identity.
    pub fn new(specs: Vec<ChannelSpec>) -> std::result::Result<Self, ManifestError> {
        if specs.len() > MAX_CHANNEL_COUNT {
            return Err(ManifestError::TooManyChannels(specs.len()));
        }

        let mut names = HashSet::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            Self::check_spec(index, spec)?;
            if !names.insert(spec.name.as_str()) {
                return Err(ManifestError::DuplicateChannel(spec.name.clone()));
            }
        }

        let channels: Box<[Channel]> = specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| Channel::from_spec(ChannelId(index as u16), spec))
            .collect();

        debug!("registry built with {} channels", channels.len());
        Ok(Self { channels })
    }

    fn check_spec(
        index: usize,
        spec: &ChannelSpec,
    ) -> std::result::Result<(), ManifestError> {
        if spec.name.trim().is_empty() {
            return Err(ManifestError::EmptyName(index));
        }
        if spec.size == 0 || spec.size > MAX_CHANNEL_SIZE {
            return Err(ManifestError::InvalidChannelSize {
                name: spec.name.clone(),
                size: spec.size,
                max: MAX_CHANNEL_SIZE,
            });
        }
        if spec.initial.len() > spec.size {
            return Err(ManifestError::InitialValueTooLong {
                name: spec.name.clone(),
                len: spec.initial.len(),
                size: spec.size,
            });
        }
        let reserved = spec
            .publishers
            .iter()
            .copied()
            .chain(spec.subscribers.iter().map(|s| s.task))
            .any(|t| t == TaskId::STORAGE);
        if reserved {
            return Err(ManifestError::ReservedTask {
                channel: spec.name.clone(),
                task: TaskId::STORAGE,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn lookup(
        &self,
        id: ChannelId,
    ) -> ChannelResult<&Channel> {
        self.channels.get(id.index()).ok_or(ChannelError::NotFound(id))
    }

    pub fn size_of(
        &self,
        id: ChannelId,
    ) -> ChannelResult<usize> {
        self.lookup(id).map(Channel::size)
    }

    pub fn name_of(
        &self,
        id: ChannelId,
    ) -> ChannelResult<&str> {
        self.lookup(id).map(Channel::name)
    }

    pub fn find(
        &self,
        name: &str,
    ) -> Option<ChannelId> {
        self.channels.iter().find(|c| c.name() == name).map(Channel::id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn persistent(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.is_persistent())
    }
}
