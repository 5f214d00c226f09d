// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Batched upload commands.

use std::rc::{Rc, Weak};

use crate::native::{EventHandler, UploadId};
use crate::texture::UploadTarget;

/**
One upload: "have `event_handler` fill `texture` from registration `upload_id`".

The texture is held weakly.  The host owns it, and a list that outlives it just has a
command with nothing to write into.
*/
#[derive(Debug, Clone)]
pub struct UploadCommand {
    pub event_handler: EventHandler,
    texture: Weak<dyn UploadTarget>,
    pub upload_id: UploadId,
}

impl UploadCommand {
    /// The destination texture, or `None` once the host has destroyed it.
    pub fn texture(&self) -> Option<Rc<dyn UploadTarget>> {
        self.texture.upgrade()
    }

    pub fn is_live(&self) -> bool {
        self.texture.strong_count() > 0
    }
}

/**
An ordered batch of upload commands, replayed by the host inside a frame.

The scheduler owns the list it builds.  Hosts receive it by reference when it is attached
or executed; a host that needs to replay it later keeps its own clone.
*/
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    label: String,
    commands: Vec<UploadCommand>,
}

impl CommandList {
    pub fn new(label: impl Into<String>) -> Self {
        CommandList {
            label: label.into(),
            commands: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn push_upload(&mut self, event_handler: EventHandler, texture: &Rc<dyn UploadTarget>, upload_id: UploadId) {
        self.commands.push(UploadCommand {
            event_handler,
            texture: Rc::downgrade(texture),
            upload_id,
        });
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, UploadCommand> {
        self.commands.iter()
    }

    /// Registration ids in submission order.
    pub fn upload_ids(&self) -> Vec<UploadId> {
        self.commands.iter().map(|c| c.upload_id).collect()
    }

    pub fn contains(&self, upload_id: UploadId) -> bool {
        self.commands.iter().any(|c| c.upload_id == upload_id)
    }

    /// Whether any command points at a texture that no longer exists.
    pub fn has_dead_targets(&self) -> bool {
        self.commands.iter().any(|c| !c.is_live())
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a UploadCommand;
    type IntoIter = std::slice::Iter<'a, UploadCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
