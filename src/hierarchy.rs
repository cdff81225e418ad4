/*!
Folding of the flat join rows into the customer → part → revision → trial →
process run → file tree.

Every row carries its full key path, so building the tree is a single pass
where each row descends from the root, finding or appending the node for its
key at each level, and finally appends its file to the process run it landed
in.  Nodes are appended in the order their key is first seen and nothing is
ever re-sorted, so the order of the output mirrors the order of the rows.

Because the rows come out of a chain of `LEFT JOIN`s, a row can stop short:
a customer with no parts produces a row whose `part_name` and everything after
it are NULL.  We stop descending at the first missing key which leaves the
node we stopped at with an empty child list (rather than inventing a child
keyed by NULL).

The `file` join in the production query matches a part revision's geometry
file as well as process run artifacts.  For a revision without trials, or a
trial without process runs, that produces a row with a file but no process
run.  Such a file belongs to the revision, so it goes into the revision's
`geometry` list (once per location) instead of under any run.

Any other row with a missing key followed by a populated deeper field (a
`trial_success` without a trial, say) can't be placed in the tree faithfully.
What happens to it is decided by `OrphanPolicy`.  By default only that row is
dropped and the rest of the tree is still built.
*/

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::file_format::file_tree::{
    CustomerNode, FileRef, PartNode, PartRevisionNode, ProcessRunNode, TrialNode,
};
use crate::file_format::join_row::JoinRow;

/// The levels below the customer, in descent order.  The customer level isn't
/// listed because a row always has a customer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Part,
    PartRevision,
    Trial,
    ProcessRun,
    File,
}

impl Level {
    const DESCENT: [Level; 5] = [
        Level::Part,
        Level::PartRevision,
        Level::Trial,
        Level::ProcessRun,
        Level::File,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Level::Part => "part",
            Level::PartRevision => "part revision",
            Level::Trial => "trial",
            Level::ProcessRun => "process run",
            Level::File => "file",
        }
    }

    /// Is the identity key for this level present on the row?
    fn has_key(self, row: &JoinRow) -> bool {
        match self {
            Level::Part => row.part_name.is_some(),
            Level::PartRevision => row.part_revision_name.is_some(),
            Level::Trial => row.trial_uuid.is_some(),
            Level::ProcessRun => row.process_run_type.is_some(),
            Level::File => row.file_location.is_some(),
        }
    }

    /// The first populated column belonging to this level, if any, including
    /// attributes that aren't part of the key.
    fn populated_column(self, row: &JoinRow) -> Option<&'static str> {
        match self {
            Level::Part => row.part_name.as_ref().map(|_| "part_name"),
            Level::PartRevision => row
                .part_revision_name
                .as_ref()
                .map(|_| "part_revision_name"),
            Level::Trial => row
                .trial_uuid
                .as_ref()
                .map(|_| "trial_uuid")
                .or_else(|| row.trial_success.map(|_| "trial_success")),
            Level::ProcessRun => row.process_run_type.as_ref().map(|_| "process_run_type"),
            Level::File => row
                .file_location
                .as_ref()
                .map(|_| "file_location")
                .or_else(|| row.file_type.as_ref().map(|_| "file_type")),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What to do with a row that populates columns beneath a missing key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Leave the row out entirely and keep building.
    Skip,
    /// Place the row as far as its keys go and ignore the orphaned columns.
    Truncate,
    /// Fail the whole build with `HierarchyError::KeyInconsistency`.
    Fail,
}

impl Default for OrphanPolicy {
    fn default() -> Self {
        OrphanPolicy::Skip
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HierarchyError {
    /// Row `row` (zero-based) has no key for `missing` but populates the
    /// deeper column `orphan`.
    KeyInconsistency {
        row: usize,
        missing: Level,
        orphan: &'static str,
    },
}

impl fmt::Display for HierarchyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HierarchyError::KeyInconsistency {
                row,
                missing,
                orphan,
            } => write!(
                f,
                "row {} has {} populated but no {} key",
                row, orphan, missing
            ),
        }
    }
}

impl std::error::Error for HierarchyError {}

/// A node that lives in its parent's child list and is identified there by a
/// string key.
pub trait TreeLevel {
    fn key(&self) -> &str;
}

impl TreeLevel for CustomerNode {
    fn key(&self) -> &str {
        &self.customer_name
    }
}

impl TreeLevel for PartNode {
    fn key(&self) -> &str {
        &self.part_name
    }
}

impl TreeLevel for PartRevisionNode {
    fn key(&self) -> &str {
        &self.part_revision_name
    }
}

impl TreeLevel for TrialNode {
    fn key(&self) -> &str {
        &self.trial_uuid
    }
}

impl TreeLevel for ProcessRunNode {
    fn key(&self) -> &str {
        &self.run_type
    }
}

/// Find the child with the given key, appending a new one built by `make` if
/// there isn't one yet.
///
/// This is a linear scan.  Child lists are a handful to a few dozen entries
/// wide at every level, and the scan keeps first-seen order for free.
fn get_or_insert_with<'a, T, F>(children: &'a mut Vec<T>, key: &str, make: F) -> &'a mut T
where
    T: TreeLevel,
    F: FnOnce(&str) -> T,
{
    let index = match children.iter().position(|child| child.key() == key) {
        Some(index) => index,
        None => {
            children.push(make(key));
            children.len() - 1
        }
    };
    &mut children[index]
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HierarchyBuilder {
    pub orphans: OrphanPolicy,
}

impl HierarchyBuilder {
    pub fn new(orphans: OrphanPolicy) -> Self {
        HierarchyBuilder { orphans }
    }

    pub fn build(&self, rows: &[JoinRow]) -> Result<Vec<CustomerNode>, HierarchyError> {
        let mut forest = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if let Some((missing, orphan)) = find_orphan(row) {
                match self.orphans {
                    OrphanPolicy::Fail => {
                        return Err(HierarchyError::KeyInconsistency {
                            row: index,
                            missing,
                            orphan,
                        });
                    }
                    OrphanPolicy::Skip => {
                        warn!(
                            row = index,
                            customer = %row.customer_name,
                            %missing,
                            orphan,
                            "skipping row with columns beneath a missing key"
                        );
                        continue;
                    }
                    OrphanPolicy::Truncate => {
                        warn!(
                            row = index,
                            customer = %row.customer_name,
                            %missing,
                            orphan,
                            "ignoring columns beneath a missing key"
                        );
                    }
                }
            }
            fold_row(&mut forest, row);
        }
        Ok(forest)
    }
}

/// Build the tree using the default policy of skipping inconsistent rows.
pub fn build(rows: &[JoinRow]) -> Result<Vec<CustomerNode>, HierarchyError> {
    HierarchyBuilder::default().build(rows)
}

/// Locate the first missing key on the row and report the first column
/// populated at or beneath it.
fn find_orphan(row: &JoinRow) -> Option<(Level, &'static str)> {
    let gap = Level::DESCENT
        .iter()
        .position(|level| !level.has_key(row))?;
    let missing = Level::DESCENT[gap];
    let geometry = revision_file(row).is_some();
    Level::DESCENT[gap..]
        .iter()
        .filter(|level| !(geometry && **level == Level::File))
        .find_map(|level| level.populated_column(row))
        .map(|orphan| (missing, orphan))
}

/// A row with a part revision and a file but no process run carries the
/// revision's own file.
fn revision_file(row: &JoinRow) -> Option<FileRef> {
    if row.part_revision_name.is_none() || row.process_run_type.is_some() {
        return None;
    }
    Some(FileRef {
        location: row.file_location.clone()?,
        file_type: row.file_type.clone(),
    })
}

/// Descend as far as the row's keys go.  Returns `None` when the row stops
/// short of a file, which is not an error.
fn fold_row(forest: &mut Vec<CustomerNode>, row: &JoinRow) -> Option<()> {
    let customer = get_or_insert_with(forest, &row.customer_name, CustomerNode::new);
    let part = get_or_insert_with(&mut customer.parts, row.part_name.as_deref()?, PartNode::new);
    let revision = get_or_insert_with(
        &mut part.part_revisions,
        row.part_revision_name.as_deref()?,
        PartRevisionNode::new,
    );
    if let Some(file) = revision_file(row) {
        if !revision
            .geometry
            .iter()
            .any(|known| known.location == file.location)
        {
            revision.geometry.push(file);
        }
    }
    let trial = get_or_insert_with(&mut revision.trials, row.trial_uuid.as_deref()?, |uuid| {
        TrialNode::new(uuid, row.trial_success)
    });
    if trial.trial_status != row.trial_success {
        debug!(
            trial = %trial.trial_uuid,
            kept = ?trial.trial_status,
            ignored = ?row.trial_success,
            "rows disagree about trial status; keeping the first"
        );
    }
    let run = get_or_insert_with(
        &mut trial.process_runs,
        row.process_run_type.as_deref()?,
        ProcessRunNode::new,
    );
    run.files.push(FileRef {
        location: row.file_location.clone()?,
        file_type: row.file_type.clone(),
    });
    Some(())
}
