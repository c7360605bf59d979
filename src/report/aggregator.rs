//! Runs checkers per area and collects their outcomes into teams.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::checks::presets::AreaPlan;
use crate::checks::{CheckOptions, Checker};
use crate::error::Result;
use crate::status::Status;

use super::{AreaSpec, Check, Report, ReportMeta, Team};

/// Collects checker output into teams, one area at a time.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    options: CheckOptions,
    skip: BTreeSet<String>,
}

impl Aggregator {
    /// Creates an aggregator passing `options` to every checker.
    pub fn new(options: CheckOptions) -> Self {
        Self {
            options,
            skip: BTreeSet::new(),
        }
    }

    /// Areas whose checkers are not run. They still appear in the report.
    pub fn with_skipped<I, S>(mut self, areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip.extend(areas.into_iter().map(Into::into));
        self
    }

    /// Whether `area_id` is skipped.
    pub fn is_skipped(&self, area_id: &str) -> bool {
        self.skip.contains(area_id)
    }

    /// Runs every checker for `area` and returns the populated team.
    ///
    /// A checker that fails to run contributes a `NO-GO` check naming it.
    pub async fn run_area(
        &self,
        area: &AreaSpec,
        checkers: &[Arc<dyn Checker>],
        dir: &Path,
    ) -> Team {
        let mut team = area.empty_team();
        if self.is_skipped(&area.id) {
            info!(area = %area.id, "area skipped");
            return team;
        }

        for checker in checkers {
            match checker.check(dir, &self.options).await {
                Ok(checks) if checks.is_empty() => {
                    warn!(area = %area.id, checker = checker.name(), "checker returned no checks");
                }
                Ok(checks) => team.extend_checks(checks),
                Err(e) => {
                    warn!(area = %area.id, checker = checker.name(), error = %e, "checker failed");
                    team.push_check(Check::no_go(checker.name(), e.to_string()));
                }
            }
        }

        let status = team.status();
        if status == Status::NoGo {
            warn!(area = %area.id, checks = team.checks().len(), %status, "area finished");
        } else {
            info!(area = %area.id, checks = team.checks().len(), %status, "area finished");
        }
        team
    }

    /// Runs every planned area in order and builds a dependency-sorted report.
    pub async fn run(&self, plans: &[AreaPlan], dir: &Path, meta: ReportMeta) -> Result<Report> {
        let mut teams = Vec::with_capacity(plans.len());
        for plan in plans {
            teams.push(self.run_area(&plan.area, &plan.checkers, dir).await);
        }

        let mut report = build_report(meta, teams);
        report.sort_by_dependencies()?;
        Ok(report)
    }
}

/// Wraps finished teams in a report; its status is derived from them.
pub fn build_report(meta: ReportMeta, teams: Vec<Team>) -> Report {
    Report::new(meta, teams)
}
