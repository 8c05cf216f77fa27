//! Set difference for declarative relationship resources
//!
//! A binding resource owns a set of members (space GUIDs, org GUIDs, network
//! policies). Updating it removes every member that left the set one call at
//! a time and adds the new members in a single call.

use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;
use tfplug::types::Diagnostic;

#[derive(Debug, Clone, PartialEq)]
pub struct SetDiff<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
}

impl<T: Eq + Hash + Clone> SetDiff<T> {
    /// `added = planned - prior`, `removed = prior - planned`, each in the
    /// order of its source list
    pub fn between(prior: &[T], planned: &[T]) -> Self {
        let prior_set: HashSet<&T> = prior.iter().collect();
        let planned_set: HashSet<&T> = planned.iter().collect();

        Self {
            added: dedup(planned.iter().filter(|m| !prior_set.contains(m))),
            removed: dedup(prior.iter().filter(|m| !planned_set.contains(m))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

fn dedup<'a, T: Eq + Hash + Clone + 'a>(items: impl Iterator<Item = &'a T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.filter(|m| seen.insert(*m)).cloned().collect()
}

/// Apply a diff: one `remove` per removed member, then one `add` with all
/// added members. Failures do not stop the remaining calls; every failure
/// becomes its own diagnostic.
pub async fn reconcile<T, R, RFut, A, AFut>(
    diff: SetDiff<T>,
    mut remove: R,
    add: A,
) -> Vec<Diagnostic>
where
    R: FnMut(T) -> RFut,
    RFut: Future<Output = Result<(), Diagnostic>>,
    A: FnOnce(Vec<T>) -> AFut,
    AFut: Future<Output = Result<(), Diagnostic>>,
{
    let mut diagnostics = Vec::new();

    for member in diff.removed {
        if let Err(diag) = remove(member).await {
            tracing::warn!("{}: {}", diag.summary, diag.detail);
            diagnostics.push(diag);
        }
    }

    if !diff.added.is_empty() {
        if let Err(diag) = add(diff.added).await {
            tracing::warn!("{}: {}", diag.summary, diag.detail);
            diagnostics.push(diag);
        }
    }

    diagnostics
}

/// Remove every member, collecting failures
pub async fn remove_all<T, R, RFut>(members: Vec<T>, remove: R) -> Vec<Diagnostic>
where
    R: FnMut(T) -> RFut,
    RFut: Future<Output = Result<(), Diagnostic>>,
{
    reconcile(
        SetDiff {
            added: Vec::new(),
            removed: members,
        },
        remove,
        |_| async { Ok(()) },
    )
    .await
}
