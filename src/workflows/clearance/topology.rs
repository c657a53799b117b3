use super::domain::{AdmissionProfile, CheckpointKind, StageStatus};

/// Template describing one checkpoint's place in the clearance flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointTemplate {
    pub checkpoint: CheckpointKind,
    /// Stages sharing a group number form a parallel fan-out set; groups
    /// unlock strictly in ascending order.
    pub group: u8,
    pub hosteller_only: bool,
}

impl CheckpointTemplate {
    fn applies_to(&self, profile: &AdmissionProfile) -> bool {
        !self.hosteller_only || profile.hosteller
    }
}

/// A checkpoint instantiated for one concrete application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCheckpoint {
    pub checkpoint: CheckpointKind,
    pub group: u8,
    pub initial_status: StageStatus,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("resolved topology is empty")]
    Empty,
    #[error("resolved topology has no actionable entry checkpoint")]
    NoEntry,
    #[error("resolved topology has no reachable terminal checkpoint")]
    NoTerminal,
}

/// Resolves the ordered/parallel checkpoint set for an admission profile.
#[derive(Debug, Clone)]
pub struct StageTopology {
    templates: Vec<CheckpointTemplate>,
}

impl StageTopology {
    /// The institutional standard flow: dean initiation, a parallel
    /// departmental fan-out, then the finance office.
    pub fn standard() -> Self {
        Self {
            templates: vec![
                CheckpointTemplate {
                    checkpoint: CheckpointKind::Dean,
                    group: 0,
                    hosteller_only: false,
                },
                CheckpointTemplate {
                    checkpoint: CheckpointKind::Library,
                    group: 1,
                    hosteller_only: false,
                },
                CheckpointTemplate {
                    checkpoint: CheckpointKind::Hostel,
                    group: 1,
                    hosteller_only: true,
                },
                CheckpointTemplate {
                    checkpoint: CheckpointKind::Sports,
                    group: 1,
                    hosteller_only: false,
                },
                CheckpointTemplate {
                    checkpoint: CheckpointKind::Lab,
                    group: 1,
                    hosteller_only: false,
                },
                CheckpointTemplate {
                    checkpoint: CheckpointKind::RecordsOffice,
                    group: 1,
                    hosteller_only: false,
                },
                CheckpointTemplate {
                    checkpoint: CheckpointKind::Finance,
                    group: 2,
                    hosteller_only: false,
                },
            ],
        }
    }

    /// Build a topology from explicit templates, for institutions with a
    /// non-standard checkpoint set.
    pub fn from_templates(templates: Vec<CheckpointTemplate>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &[CheckpointTemplate] {
        &self.templates
    }

    /// Instantiate the checkpoint set for one application.
    ///
    /// Inapplicable checkpoints are materialized directly as `Skipped` so the
    /// timeline still shows them, but they never gate a merge. The first
    /// group's applicable stages start `Pending`; everything later starts
    /// `Locked`. A topology with no actionable entry or no terminal group is
    /// a definition bug and fails application creation outright.
    pub fn resolve(
        &self,
        profile: &AdmissionProfile,
    ) -> Result<Vec<ResolvedCheckpoint>, TopologyError> {
        if self.templates.is_empty() {
            return Err(TopologyError::Empty);
        }

        let entry_group = self
            .templates
            .iter()
            .map(|template| template.group)
            .min()
            .ok_or(TopologyError::Empty)?;
        let terminal_group = self
            .templates
            .iter()
            .map(|template| template.group)
            .max()
            .ok_or(TopologyError::Empty)?;

        let mut resolved: Vec<ResolvedCheckpoint> = self
            .templates
            .iter()
            .map(|template| {
                let initial_status = if !template.applies_to(profile) {
                    StageStatus::Skipped
                } else if template.group == entry_group {
                    StageStatus::Pending
                } else {
                    StageStatus::Locked
                };
                ResolvedCheckpoint {
                    checkpoint: template.checkpoint,
                    group: template.group,
                    initial_status,
                }
            })
            .collect();
        resolved.sort_by_key(|checkpoint| checkpoint.group);

        if !resolved
            .iter()
            .any(|checkpoint| checkpoint.initial_status == StageStatus::Pending)
        {
            return Err(TopologyError::NoEntry);
        }
        if !resolved.iter().any(|checkpoint| {
            checkpoint.group == terminal_group
                && checkpoint.initial_status != StageStatus::Skipped
        }) {
            return Err(TopologyError::NoTerminal);
        }

        Ok(resolved)
    }
}

impl Default for StageTopology {
    fn default() -> Self {
        Self::standard()
    }
}
