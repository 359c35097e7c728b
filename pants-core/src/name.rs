//! Identifiers shared by every stage after parsing.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Whether an identifier was written in the source or synthesized by the
/// compiler. Compiler names sort before user names with the same text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Provenance {
    Compiler,
    User,
}

/// A variable or field identifier.
///
/// Identity is the pair (text, provenance). The `mutated` flag is metadata
/// set by the mutation pass once a variable is known to be reassigned after
/// being captured; it takes no part in comparison, ordering or hashing.
#[derive(Debug, Clone)]
pub struct Name {
    pub name: String,
    pub provenance: Provenance,
    pub mutated: bool,
}

impl Name {
    pub fn new(name: impl Into<String>, provenance: Provenance) -> Self {
        Name {
            name: name.into(),
            provenance,
            mutated: false,
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Name::new(name, Provenance::User)
    }

    pub fn compiler(name: impl Into<String>) -> Self {
        Name::new(name, Provenance::Compiler)
    }

    pub fn is_user_provided(&self) -> bool {
        self.provenance == Provenance::User
    }

    fn prefix(&self) -> &'static str {
        match self.provenance {
            Provenance::User => "u_",
            Provenance::Compiler => "c_",
        }
    }

    /// The identifier used for this name in generated C. Alphanumerics pass
    /// through, `_` is doubled and every other byte becomes `_` plus its hex
    /// value, so distinct names never collide.
    pub fn c_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + 2);
        out.push_str(self.prefix());
        for byte in self.name.bytes() {
            match byte {
                b'_' => out.push_str("__"),
                b if b.is_ascii_alphanumeric() => out.push(b as char),
                b => out.push_str(&format!("_{:x}", b)),
            }
        }
        out
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.provenance == other.provenance
    }
}

impl Eq for Name {}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.provenance.cmp(&other.provenance))
    }
}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.provenance.hash(state);
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix(), self.name)
    }
}

/// Field holding an object's element-update entry point.
pub fn update_field() -> Name {
    Name::user("~update")
}

/// Field holding an object's element-lookup entry point.
pub fn lookup_field() -> Name {
    Name::user("~index")
}

pub fn dict_constructor() -> Name {
    Name::user("Dictionary")
}

pub fn array_constructor() -> Name {
    Name::user("Array")
}

/// Placeholder value bound by a definition before its right-hand side runs.
pub fn null_value() -> Name {
    Name::compiler("null")
}

/// Implicit argument of every true function: where to send the result.
pub fn continuation() -> Name {
    Name::compiler("continuation")
}

/// The user-visible alias of the current function's continuation.
pub fn return_name() -> Name {
    Name::user("cont")
}

/// Dynamic-scope record threaded through every call.
pub fn dynamic_vars() -> Name {
    Name::compiler("dynamic_vars")
}

/// Prefix of compiler temporaries, followed by a per-compile counter.
pub const GENSYM_PREFIX: &str = "ir_";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn c_name_escapes_everything_but_alphanumerics() {
        assert_eq!(Name::user("hello").c_name(), "u_hello");
        assert_eq!(Name::compiler("ir_3").c_name(), "c_ir__3");
        assert_eq!(update_field().c_name(), "u__7eupdate");
        assert_eq!(Name::user("<=").c_name(), "u__3c_3d");
    }

    #[test]
    fn c_names_do_not_collide() {
        // `a_3c` and `a<` would meet if `_` were not doubled.
        assert_ne!(Name::user("a_3c").c_name(), Name::user("a<").c_name());
        assert_ne!(Name::user("x").c_name(), Name::compiler("x").c_name());
    }

    #[test]
    fn ordering_is_text_then_provenance() {
        let set: BTreeSet<Name> =
            [Name::user("b"), Name::user("a"), Name::compiler("b"), Name::compiler("a")]
                .into_iter()
                .collect();
        let ordered: Vec<String> = set.iter().map(|n| n.to_string()).collect();
        assert_eq!(ordered, vec!["c_a", "u_a", "c_b", "u_b"]);
    }

    #[test]
    fn mutation_flag_is_not_identity() {
        let mut marked = Name::user("x");
        marked.mutated = true;
        assert_eq!(marked, Name::user("x"));
        let set: BTreeSet<Name> = [marked, Name::user("x")].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
