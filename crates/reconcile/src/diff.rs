//! Module diffs between a set template and a set instance

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of change a module diff asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffType {
    /// Template has a service template the set has no module for
    Add,
    /// Set has a module no longer in the template
    Remove,
    /// Module exists but its name drifted from the service template
    Changed,
    /// Module already matches
    Unchanged,
}

impl DiffType {
    /// Wire tag used by the topology server
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiffType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            "changed" => Ok(Self::Changed),
            "unchanged" => Ok(Self::Unchanged),
            other => Err(Error::UnexpectedDiffType(other.to_string())),
        }
    }
}

/// A module diff as it travels over the wire
///
/// The tag is kept as a raw string so a diff produced by a newer server
/// with an unknown tag still deserializes and is rejected by the worker
/// with a descriptive error instead of failing the whole payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDiff {
    pub diff_type: String,
    #[serde(rename = "bk_module_id", default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<i64>,
    #[serde(rename = "bk_module_name", default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_template_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_template_name: Option<String>,
}

impl ModuleDiff {
    /// Diff adding a module for a service template
    pub fn add(service_template_id: i64, service_template_name: impl Into<String>) -> Self {
        Self {
            diff_type: DiffType::Add.as_str().to_string(),
            service_template_id: Some(service_template_id),
            service_template_name: Some(service_template_name.into()),
            ..Default::default()
        }
    }

    /// Diff removing an existing module
    pub fn remove(module_id: i64) -> Self {
        Self {
            diff_type: DiffType::Remove.as_str().to_string(),
            module_id: Some(module_id),
            ..Default::default()
        }
    }

    /// Diff renaming an existing module
    pub fn changed(module_id: i64, module_name: impl Into<String>) -> Self {
        Self {
            diff_type: DiffType::Changed.as_str().to_string(),
            module_id: Some(module_id),
            module_name: Some(module_name.into()),
            ..Default::default()
        }
    }

    /// Diff for a module that already matches its template
    pub fn unchanged() -> Self {
        Self {
            diff_type: DiffType::Unchanged.as_str().to_string(),
            ..Default::default()
        }
    }

    /// Parse the tag
    pub fn kind(&self) -> Result<DiffType> {
        self.diff_type.parse()
    }

    /// Resolve into a typed action holding only the fields its tag uses
    pub fn action(&self) -> Result<ModuleAction> {
        let kind = self.kind()?;
        let missing = |field: &'static str| Error::MissingField {
            diff_type: kind.to_string(),
            field,
        };

        match kind {
            DiffType::Add => Ok(ModuleAction::Add {
                service_template_id: self
                    .service_template_id
                    .ok_or_else(|| missing("service_template_id"))?,
                service_template_name: self
                    .service_template_name
                    .clone()
                    .ok_or_else(|| missing("service_template_name"))?,
            }),
            DiffType::Remove => Ok(ModuleAction::Remove {
                module_id: self.module_id.ok_or_else(|| missing("bk_module_id"))?,
            }),
            DiffType::Changed => Ok(ModuleAction::Changed {
                module_id: self.module_id.ok_or_else(|| missing("bk_module_id"))?,
                module_name: self
                    .module_name
                    .clone()
                    .ok_or_else(|| missing("bk_module_name"))?,
            }),
            DiffType::Unchanged => Ok(ModuleAction::Unchanged),
        }
    }

    /// Module this diff targets, when its tag gives it one
    pub fn target_module(&self) -> Option<i64> {
        match self.kind() {
            Ok(DiffType::Remove | DiffType::Changed) => self.module_id,
            _ => None,
        }
    }
}

impl fmt::Display for ModuleDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action() {
            Ok(action) => write!(f, "{action}"),
            Err(_) => write!(f, "{} (malformed)", self.diff_type),
        }
    }
}

/// A resolved module diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleAction {
    Add {
        service_template_id: i64,
        service_template_name: String,
    },
    Remove {
        module_id: i64,
    },
    Changed {
        module_id: i64,
        module_name: String,
    },
    Unchanged,
}

impl ModuleAction {
    pub fn diff_type(&self) -> DiffType {
        match self {
            Self::Add { .. } => DiffType::Add,
            Self::Remove { .. } => DiffType::Remove,
            Self::Changed { .. } => DiffType::Changed,
            Self::Unchanged => DiffType::Unchanged,
        }
    }
}

impl fmt::Display for ModuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add {
                service_template_id,
                service_template_name,
            } => write!(
                f,
                "add module {service_template_name} (service template {service_template_id})"
            ),
            Self::Remove { module_id } => write!(f, "remove module {module_id}"),
            Self::Changed {
                module_id,
                module_name,
            } => write!(f, "rename module {module_id} to {module_name}"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub additions: usize,
    pub removals: usize,
    pub changes: usize,
    pub unchanged: usize,
    /// Diffs with an unknown tag or missing fields
    pub invalid: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ModuleDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            match diff.action().map(|a| a.diff_type()) {
                Ok(DiffType::Add) => summary.additions += 1,
                Ok(DiffType::Remove) => summary.removals += 1,
                Ok(DiffType::Changed) => summary.changes += 1,
                Ok(DiffType::Unchanged) => summary.unchanged += 1,
                Err(_) => summary.invalid += 1,
            }
        }
        summary
    }

    /// Number of diffs that need a remote mutation
    pub fn pending(&self) -> usize {
        self.additions + self.removals + self.changes
    }

    /// Check if the set still has to converge
    pub fn has_changes(&self) -> bool {
        self.pending() > 0 || self.invalid > 0
    }
}
