use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rand::Rng;

use crate::error::{RegistrarError, Result};
use crate::io::{write_accounts_file, RosterGroup, StudentRoster};
use crate::org_unit::{GroupAssignment, TEACHERS_UNIT};
use crate::{RawPerson, Reconciliation, Registrar};

/// Outcome for one group of a run.
#[derive(Debug)]
pub struct GroupReport {
    pub group: String,
    pub reconciliation: Reconciliation,
    /// `None` when the group had nobody new.
    pub written: Option<PathBuf>,
}

/// Writes the new teachers to `output`. The file is written even when empty.
pub fn provision_teachers<R: Rng>(
    registrar: &mut Registrar<R>,
    roster: &[RawPerson],
    output: &Path,
) -> Result<Reconciliation> {
    let reconciliation =
        registrar.reconcile(TEACHERS_UNIT, roster, &GroupAssignment::teachers())?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_accounts_file(output, &reconciliation.accounts)?;
    info!(
        "{} new teachers written to {}",
        reconciliation.accounts.len(),
        output.display()
    );
    Ok(reconciliation)
}

/// Writes one `<group>.csv` per group with new students into `output_dir`.
///
/// With a manual assignment only the named group is processed. With a
/// mapping every roster group must be mapped; this is checked before any
/// file is written.
pub fn provision_students<R: Rng>(
    registrar: &mut Registrar<R>,
    roster: &StudentRoster,
    assignment: &GroupAssignment,
    output_dir: &Path,
) -> Result<Vec<GroupReport>> {
    let groups: Vec<&RosterGroup> = match assignment {
        GroupAssignment::Manual { group, .. } => vec![roster
            .get(group)
            .ok_or_else(|| RegistrarError::GroupNotInRoster(group.clone()))?],
        GroupAssignment::Mapping(mapping) => {
            let unmapped = roster
                .groups()
                .iter()
                .find(|g| mapping.path_for(&g.group).is_none());
            if let Some(unmapped) = unmapped {
                return Err(RegistrarError::UnknownGroup(unmapped.group.clone()));
            }
            for group in mapping.groups().filter(|g| roster.get(g).is_none()) {
                warn!("group {} is mapped but has no students", group);
            }
            roster.groups().iter().collect()
        }
    };

    fs::create_dir_all(output_dir)?;

    let mut reports = Vec::with_capacity(groups.len());
    for roster_group in groups {
        let reconciliation =
            registrar.reconcile(&roster_group.group, &roster_group.people, assignment)?;
        let written = if reconciliation.accounts.is_empty() {
            None
        } else {
            let path = output_dir.join(format!("{}.csv", roster_group.group));
            write_accounts_file(&path, &reconciliation.accounts)?;
            Some(path)
        };
        reports.push(GroupReport {
            group: roster_group.group.clone(),
            reconciliation,
            written,
        });
    }
    Ok(reports)
}
