use std::collections::BTreeSet;

use log::debug;

use super::Program;
use crate::name::Name;

/// Mark every variable that must live in a heap cell.
///
/// A function copies its free variables into its environment when it is
/// created, so a variable that is both captured by some function and
/// reassigned non-locally somewhere would otherwise be seen at two different
/// values. Such names get `mutated` set at every occurrence, and code
/// generation stores them behind a cell. The runtime's own compiler names
/// are never boxed; a user-visible global can be, since a program may
/// reassign it. Returns the marked names.
pub fn annotate_mutations(program: &mut Program, provided: &BTreeSet<Name>) -> BTreeSet<Name> {
    let mut reassigned = BTreeSet::new();
    program.root.collect_reassigned(&mut reassigned);

    let mut captured = BTreeSet::new();
    let mut callables = Vec::new();
    program.root.callables(&mut callables);
    for callable in callables.into_iter().filter(|c| c.function) {
        captured.extend(callable.free_names());
    }

    let mutated: BTreeSet<Name> = reassigned
        .intersection(&captured)
        .filter(|name| name.is_user_provided() || !provided.contains(*name))
        .cloned()
        .collect();
    debug!("{} variables need cells", mutated.len());

    program
        .root
        .for_each_name_mut(&mut |name: &mut Name| name.mutated = mutated.contains(&*name));
    mutated
}
