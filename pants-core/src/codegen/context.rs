use std::collections::BTreeSet;

use super::namesets::NameSetId;
use crate::name::Name;

/// Where the names visible to the code being generated live.
///
/// Names defined so far in the current frame are read from the frame record;
/// everything else comes from the environment captured when the enclosing
/// function was created.
#[derive(Debug)]
pub struct VariableContext {
    free_id: NameSetId,
    frame_id: NameSetId,
    active: BTreeSet<Name>,
    /// Layout of the frame record; every definition must be a member.
    layout: BTreeSet<Name>,
}

impl VariableContext {
    pub fn new(free_id: NameSetId, frame_id: NameSetId, active: BTreeSet<Name>, layout: BTreeSet<Name>) -> Self {
        VariableContext {
            free_id,
            frame_id,
            active,
            layout,
        }
    }

    pub fn frame_id(&self) -> NameSetId {
        self.frame_id
    }

    /// Record that `name` now lives in the frame. Returns false if it
    /// already did.
    pub fn define(&mut self, name: &Name) -> bool {
        debug_assert!(
            self.layout.contains(name),
            "{} is defined but missing from frame layout {}",
            name,
            self.frame_id
        );
        self.active.insert(name.clone())
    }

    /// The storage slot of `name`. For a boxed name this is the cell itself.
    pub fn var_access(&self, name: &Name) -> String {
        if self.active.contains(name) {
            format!("((struct {}*)frame)->{}", self.frame_id, name.c_name())
        } else {
            format!("((struct {}*)env)->{}", self.free_id, name.c_name())
        }
    }

    /// The current value of `name`, looking through its cell when boxed.
    pub fn val_access(&self, name: &Name) -> String {
        let slot = self.var_access(name);
        if name.mutated { format!("(*{}.cell.addr)", slot) } else { slot }
    }
}
