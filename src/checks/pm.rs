//! Product-management checks: release notes and roadmap for the target version.
//!
//! Release notes come from `CHANGELOG.json` when present, otherwise from the
//! matching `## <version>` section of `CHANGELOG.md`. Missing notes or roadmap
//! data are warnings, never blockers.

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::report::Check;

use super::{normalize_version, CheckOptions, Checker, Version};

const CHANGELOG_JSON: &str = "CHANGELOG.json";
const CHANGELOG_MD: &str = "CHANGELOG.md";
const ROADMAP: &str = "ROADMAP.md";

#[derive(Debug, Deserialize)]
struct ChangelogFile {
    #[serde(default)]
    releases: Vec<ReleaseEntry>,
}

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    version: String,
    #[serde(default)]
    highlights: Vec<Value>,
    #[serde(default)]
    added: Vec<Value>,
    #[serde(default)]
    changed: Vec<Value>,
    #[serde(default)]
    fixed: Vec<Value>,
    #[serde(default)]
    deprecated: Vec<Value>,
}

/// What the changelog says about one release.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ReleaseNotes {
    changes: usize,
    highlights: usize,
    breaking: usize,
    deprecations: usize,
}

#[derive(Debug)]
enum Notes {
    Missing,
    Invalid(String),
    NoEntry(&'static str),
    Found(ReleaseNotes),
}

/// Runs the six product-management checks for the target version.
#[derive(Debug, Clone, Default)]
pub struct PmChecker;

impl PmChecker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Checker for PmChecker {
    async fn check(&self, dir: &Path, options: &CheckOptions) -> Result<Vec<Check>> {
        let version = options
            .version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(normalize_version);

        let notes = match &version {
            Some(v) => load_notes(dir, v).await?,
            None => Notes::NoEntry(""),
        };
        let roadmap = read_optional(&dir.join(ROADMAP)).await?;

        Ok(vec![
            version_recommendation(version.as_deref()),
            release_scope(version.as_deref(), &notes),
            changelog_quality(version.as_deref(), &notes),
            breaking_changes(&notes),
            roadmap_alignment(version.as_deref(), roadmap.as_deref()),
            deprecation_notices(&notes),
        ])
    }

    fn name(&self) -> &str {
        "pm"
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn load_notes(dir: &Path, version: &str) -> Result<Notes> {
    if let Some(json) = read_optional(&dir.join(CHANGELOG_JSON)).await? {
        return Ok(notes_from_json(&json, version));
    }
    if let Some(markdown) = read_optional(&dir.join(CHANGELOG_MD)).await? {
        return Ok(match notes_from_markdown(&markdown, version) {
            Some(notes) => Notes::Found(notes),
            None => Notes::NoEntry(CHANGELOG_MD),
        });
    }
    Ok(Notes::Missing)
}

fn notes_from_json(json: &str, version: &str) -> Notes {
    let file: ChangelogFile = match serde_json::from_str(json) {
        Ok(file) => file,
        Err(e) => return Notes::Invalid(format!("could not parse {}: {}", CHANGELOG_JSON, e)),
    };

    let Some(entry) = file
        .releases
        .into_iter()
        .find(|r| normalize_version(&r.version) == version)
    else {
        return Notes::NoEntry(CHANGELOG_JSON);
    };

    let breaking = entry
        .changed
        .iter()
        .filter(|c| c.get("breaking").and_then(Value::as_bool).unwrap_or(false))
        .count();
    Notes::Found(ReleaseNotes {
        changes: entry.added.len() + entry.changed.len() + entry.fixed.len(),
        highlights: entry.highlights.len(),
        breaking,
        deprecations: entry.deprecated.len(),
    })
}

/// Version named by a `## ` heading, e.g. `## [1.2.0] - 2025-01-01` or `## v1.2.0`.
fn heading_version(line: &str) -> Option<String> {
    let rest = line.strip_prefix("## ")?;
    let token = rest.split_whitespace().next()?;
    let token = token.trim_matches(|c| c == '[' || c == ']');
    Version::parse(token).ok().map(|_| normalize_version(token))
}

fn notes_from_markdown(markdown: &str, version: &str) -> Option<ReleaseNotes> {
    let mut lines = markdown.lines();
    lines.by_ref().find(|l| heading_version(l).as_deref() == Some(version))?;

    let mut notes = ReleaseNotes::default();
    let mut subsection = String::new();
    for line in lines {
        if line.starts_with("## ") {
            break;
        }
        if let Some(title) = line.strip_prefix("### ") {
            subsection = title.trim().to_ascii_lowercase();
            continue;
        }
        let trimmed = line.trim_start();
        if !(trimmed.starts_with("- ") || trimmed.starts_with("* ")) {
            continue;
        }

        match subsection.as_str() {
            "highlights" => notes.highlights += 1,
            "deprecated" => notes.deprecations += 1,
            _ => notes.changes += 1,
        }
        if trimmed.to_ascii_lowercase().contains("breaking") {
            notes.breaking += 1;
        }
    }
    Some(notes)
}

fn version_recommendation(version: Option<&str>) -> Check {
    const ID: &str = "version-recommendation";
    let Some(version) = version else {
        return Check::warn(ID, "no target version");
    };
    // version-format reports malformed versions.
    let Ok(parsed) = Version::parse(version) else {
        return Check::skip(ID, "not a semantic version");
    };

    let kind = if parsed.pre.is_some() {
        "pre-release"
    } else if parsed.major != 0 && parsed.minor == 0 && parsed.patch == 0 {
        "major release"
    } else if parsed.minor != 0 && parsed.patch == 0 {
        "minor (feature) release"
    } else {
        "patch release"
    };
    Check::go(ID).with_detail(format!("{} is a {}", version, kind))
}

fn notes_problem(id: &str, version: Option<&str>, notes: &Notes) -> Option<Check> {
    match notes {
        Notes::Missing => Some(Check::warn(
            id,
            format!("neither {} nor {} found", CHANGELOG_JSON, CHANGELOG_MD),
        )),
        Notes::Invalid(reason) => Some(Check::warn(id, reason.clone())),
        Notes::NoEntry(source) => Some(Check::warn(
            id,
            match version {
                Some(v) => format!("{} not found in {}", v, source),
                None => "no target version".to_string(),
            },
        )),
        Notes::Found(_) => None,
    }
}

fn release_scope(version: Option<&str>, notes: &Notes) -> Check {
    const ID: &str = "release-scope";
    match notes {
        Notes::Found(n) => Check::go(ID).with_detail(format!("{} changes documented", n.changes)),
        other => notes_problem(ID, version, other).unwrap_or_else(|| Check::go(ID)),
    }
}

fn changelog_quality(version: Option<&str>, notes: &Notes) -> Check {
    const ID: &str = "changelog-quality";
    match notes {
        Notes::Found(n) if n.highlights == 0 => Check::warn(ID, "no highlights for this release"),
        Notes::Found(n) => Check::go(ID).with_detail(format!("{} highlights present", n.highlights)),
        other => notes_problem(ID, version, other).unwrap_or_else(|| Check::go(ID)),
    }
}

fn breaking_changes(notes: &Notes) -> Check {
    const ID: &str = "breaking-changes";
    match notes {
        Notes::Missing => Check::warn(
            ID,
            format!("neither {} nor {} found", CHANGELOG_JSON, CHANGELOG_MD),
        ),
        Notes::Invalid(reason) => Check::warn(ID, reason.clone()),
        Notes::NoEntry(_) => {
            Check::go(ID).with_detail("no breaking changes (version not in changelog)")
        }
        Notes::Found(n) if n.breaking == 0 => Check::go(ID).with_detail("no breaking changes"),
        Notes::Found(n) => {
            Check::go(ID).with_detail(format!("{} breaking changes documented", n.breaking))
        }
    }
}

fn deprecation_notices(notes: &Notes) -> Check {
    const ID: &str = "deprecation-notices";
    match notes {
        Notes::Found(n) if n.deprecations > 0 => {
            Check::go(ID).with_detail(format!("{} deprecation notices", n.deprecations))
        }
        _ => Check::go(ID).with_detail("no deprecations"),
    }
}

/// Counts `### [x]` / `### [ ]` roadmap items whose `**Version:**` line names `version`.
fn roadmap_items(roadmap: &str, version: &str) -> (usize, usize) {
    let wanted = version.trim_start_matches('v');
    let (mut completed, mut pending) = (0, 0);
    let mut current: Option<bool> = None;

    for line in roadmap.lines() {
        if let Some(rest) = line.strip_prefix("### ") {
            current = if rest.starts_with("[x]") || rest.starts_with("[X]") {
                Some(true)
            } else if rest.starts_with("[ ]") {
                Some(false)
            } else {
                None
            };
            continue;
        }
        let Some(done) = current else { continue };
        let Some(tagged) = line.trim().strip_prefix("**Version:**") else {
            continue;
        };
        if tagged.trim().trim_start_matches('v') == wanted {
            if done {
                completed += 1;
            } else {
                pending += 1;
            }
            current = None;
        }
    }
    (completed, pending)
}

fn roadmap_alignment(version: Option<&str>, roadmap: Option<&str>) -> Check {
    const ID: &str = "roadmap-alignment";
    let Some(roadmap) = roadmap else {
        return Check::warn(ID, format!("{} not found", ROADMAP));
    };
    let Some(version) = version else {
        return Check::warn(ID, "no target version");
    };

    let (completed, pending) = roadmap_items(roadmap, version);
    let total = completed + pending;
    if total == 0 {
        Check::warn(ID, format!("no roadmap items tagged for {}", version))
    } else if pending > 0 {
        Check::warn(
            ID,
            format!(
                "{}/{} roadmap items completed ({} pending)",
                completed, total, pending
            ),
        )
    } else {
        Check::go(ID).with_detail(format!("{}/{} items completed", completed, total))
    }
}
