use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;

use crate::name::Name;
use crate::IdSource;

/// An ordered set of names laid out as one record.
pub type NameSet = BTreeSet<Name>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameSetId(pub u32);

impl From<u32> for NameSetId {
    fn from(id: u32) -> Self {
        NameSetId(id)
    }
}

impl fmt::Display for NameSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nameset_{}", self.0)
    }
}

/// Assigns one record layout per distinct name set.
///
/// Sets are compared structurally, so the same names always get the same
/// id however often or in whatever order they are requested. Ids are handed
/// out in first-request order starting from 0.
#[derive(Debug, Default)]
pub struct NameSetManager {
    ids: IdSource<NameSetId>,
    sets: IndexMap<NameSet, NameSetId>,
}

impl NameSetManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_assign_id(&mut self, names: &NameSet) -> NameSetId {
        if let Some(id) = self.sets.get(names) {
            return *id;
        }
        let id = self.ids.next();
        self.sets.insert(names.clone(), id);
        id
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// One `struct nameset_N` per set, in id order.
    pub fn write_layouts(&self) -> String {
        let mut out = String::new();
        for (names, id) in &self.sets {
            out.push_str(&format!("struct {} {{\n", id));
            if names.is_empty() {
                out.push_str("  char empty_;\n");
            }
            for name in names {
                out.push_str(&format!("  union Value {};\n", name.c_name()));
            }
            out.push_str("};\n");
        }
        out
    }
}
