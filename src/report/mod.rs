//! Validation report model: checks grouped into teams, teams into a report.
//!
//! Statuses at the team and report level are always derived from the
//! contents with [`aggregate`]; there is no stored status to go stale.

pub mod aggregator;
pub mod area;
pub mod order;

pub use aggregator::{build_report, Aggregator};
pub use area::{default_areas, AreaSpec};
pub use order::{levels, order};

use std::collections::BTreeSet;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Result;
use crate::status::{aggregate, Status};

/// A single validation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// Stable slug, e.g. `build` or `changelog`.
    pub id: String,
    /// Outcome.
    pub status: Status,
    /// Free-text detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Check {
    /// Creates a check without detail.
    pub fn new(id: impl Into<String>, status: Status) -> Self {
        Self {
            id: id.into(),
            status,
            detail: None,
        }
    }

    /// Shorthand for a passing check.
    pub fn go(id: impl Into<String>) -> Self {
        Self::new(id, Status::Go)
    }

    /// Shorthand for a soft failure.
    pub fn warn(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(id, Status::Warn).with_detail(detail)
    }

    /// Shorthand for a blocking failure.
    pub fn no_go(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(id, Status::NoGo).with_detail(detail)
    }

    /// Shorthand for a check that was not evaluated.
    pub fn skip(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(id, Status::Skip).with_detail(reason)
    }

    /// Sets the detail text.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// One area of responsibility and the checks run for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Identifier, e.g. `qa-validation`.
    pub id: String,
    /// Short display name, e.g. `qa`.
    pub name: String,
    /// Ids of teams this one is displayed after.
    pub depends_on: BTreeSet<String>,
    checks: Vec<Check>,
}

impl Team {
    /// Creates an empty team.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            depends_on: BTreeSet::new(),
            checks: Vec::new(),
        }
    }

    /// Sets the upstream team ids.
    pub fn with_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Appends checks, builder style.
    pub fn with_checks(mut self, checks: impl IntoIterator<Item = Check>) -> Self {
        self.checks.extend(checks);
        self
    }

    /// Appends a single check.
    pub fn push_check(&mut self, check: Check) {
        self.checks.push(check);
    }

    /// Appends many checks.
    pub fn extend_checks(&mut self, checks: impl IntoIterator<Item = Check>) {
        self.checks.extend(checks);
    }

    /// Checks in the order they were recorded.
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Status derived from the current checks.
    pub fn status(&self) -> Status {
        aggregate(self.checks.iter().map(|c| c.status))
    }

    /// Checks that block the release.
    pub fn blocking_checks(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| c.status == Status::NoGo)
    }
}

impl Serialize for Team {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Team", 5)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("depends_on", &self.depends_on)?;
        state.serialize_field("checks", &self.checks)?;
        state.serialize_field("status", &self.status())?;
        state.end()
    }
}

/// Descriptive metadata carried by a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Project identifier.
    pub project: String,
    /// Target version, possibly empty.
    pub version: String,
    /// Phase label, e.g. `RELEASE VALIDATION`.
    pub phase: String,
}

/// Full output of one validation run.
#[derive(Debug, Clone)]
pub struct Report {
    /// Descriptive metadata.
    pub meta: ReportMeta,
    /// When the report was built.
    pub generated_at: DateTime<Utc>,
    teams: Vec<Team>,
}

impl Report {
    /// Creates a report over the given teams.
    pub fn new(meta: ReportMeta, teams: Vec<Team>) -> Self {
        Self {
            meta,
            generated_at: Utc::now(),
            teams,
        }
    }

    /// Teams in their current order.
    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    /// Looks up a team by id.
    pub fn team(&self, id: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    /// Status derived from all teams.
    pub fn status(&self) -> Status {
        aggregate(self.teams.iter().map(Team::status))
    }

    /// Whether the release may proceed.
    pub fn is_go(&self) -> bool {
        self.status().is_go()
    }

    /// Every blocking check paired with its team.
    pub fn blocking_checks(&self) -> Vec<(&Team, &Check)> {
        self.teams
            .iter()
            .flat_map(|t| t.blocking_checks().map(move |c| (t, c)))
            .collect()
    }

    /// Re-sorts teams into dependency order.
    pub fn sort_by_dependencies(&mut self) -> Result<()> {
        let teams = std::mem::take(&mut self.teams);
        match order(teams.clone()) {
            Ok(sorted) => {
                self.teams = sorted;
                Ok(())
            }
            Err(e) => {
                self.teams = teams;
                Err(e)
            }
        }
    }

    /// Closing line for text output.
    pub fn final_message(&self) -> String {
        let version = if self.meta.version.is_empty() {
            "release"
        } else {
            self.meta.version.as_str()
        };
        if self.is_go() {
            format!("\u{1F680} TEAM: GO for {} \u{1F680}", version)
        } else if self.status() == Status::Skip {
            format!("\u{26AA} TEAM: NO-GO for {} (nothing was evaluated) \u{26AA}", version)
        } else {
            format!("\u{1F6D1} TEAM: NO-GO for {} \u{1F6D1}", version)
        }
    }

    /// Pretty-printed JSON with derived statuses.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text rendering for terminals.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let title = if self.meta.version.is_empty() {
            self.meta.project.clone()
        } else {
            format!("{} {}", self.meta.project, self.meta.version)
        };
        let _ = writeln!(out, "{}", title);
        if !self.meta.phase.is_empty() {
            let _ = writeln!(out, "{}", self.meta.phase);
        }
        let _ = writeln!(out);

        for team in &self.teams {
            let status = team.status();
            let _ = writeln!(out, "{} {:<6} {}", status.icon(), status, team.name);
            for check in team.checks() {
                match &check.detail {
                    Some(detail) => {
                        let _ = writeln!(
                            out,
                            "    {} {:<6} {} ({})",
                            check.status.icon(),
                            check.status,
                            check.id,
                            detail
                        );
                    }
                    None => {
                        let _ = writeln!(
                            out,
                            "    {} {:<6} {}",
                            check.status.icon(),
                            check.status,
                            check.id
                        );
                    }
                }
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.final_message());
        out
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Report", 6)?;
        state.serialize_field("project", &self.meta.project)?;
        state.serialize_field("version", &self.meta.version)?;
        state.serialize_field("phase", &self.meta.phase)?;
        state.serialize_field("teams", &self.teams)?;
        state.serialize_field("status", &self.status())?;
        state.serialize_field("generated_at", &self.generated_at)?;
        state.end()
    }
}
