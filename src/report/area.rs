//! Static configuration of validation areas.

use serde::{Deserialize, Serialize};

use super::Team;

/// Product management area id.
pub const PM: &str = "pm-validation";
/// Quality assurance area id.
pub const QA: &str = "qa-validation";
/// Documentation area id.
pub const DOCS: &str = "docs-validation";
/// Security area id.
pub const SECURITY: &str = "security-validation";
/// Release management area id.
pub const RELEASE: &str = "release-validation";

/// One area of responsibility in the release process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaSpec {
    /// Team id, e.g. `qa-validation`.
    pub id: String,
    /// Display name, e.g. `qa`.
    pub name: String,
    /// Areas shown before this one.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl AreaSpec {
    /// Creates an area with no dependencies.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            depends_on: Vec::new(),
        }
    }

    /// Sets upstream area ids.
    pub fn with_depends_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    /// An empty team for this area.
    pub fn empty_team(&self) -> Team {
        Team::new(&self.id, &self.name).with_depends_on(self.depends_on.iter().cloned())
    }
}

/// The five standard areas. PM runs first; release sign-off comes last.
pub fn default_areas() -> Vec<AreaSpec> {
    vec![
        AreaSpec::new(PM, "pm"),
        AreaSpec::new(QA, "qa").with_depends_on(&[PM]),
        AreaSpec::new(DOCS, "documentation").with_depends_on(&[PM]),
        AreaSpec::new(SECURITY, "security").with_depends_on(&[PM]),
        AreaSpec::new(RELEASE, "release").with_depends_on(&[QA, DOCS, SECURITY]),
    ]
}

/// Returns true if `id` names one of the default areas.
pub fn is_known_area(id: &str) -> bool {
    [PM, QA, DOCS, SECURITY, RELEASE].contains(&id)
}
