//! Dependency-ordered display of report teams.
//!
//! Kahn's algorithm, one wave at a time: every team whose dependencies are
//! already placed joins the current wave, and each wave is sorted by id.
//! The result depends only on the set of teams and edges, never on the
//! order teams were added.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{Error, Result};

use super::Team;

/// Groups team ids into dependency levels.
///
/// Dependencies naming a team that is not present are ignored. A cycle is a
/// configuration error.
pub fn levels(teams: &[Team]) -> Result<Vec<Vec<String>>> {
    let mut known: HashSet<&str> = HashSet::with_capacity(teams.len());
    for team in teams {
        if !known.insert(team.id.as_str()) {
            return Err(Error::DuplicateTeam(team.id.clone()));
        }
    }

    let mut waves: Vec<Vec<String>> = Vec::new();
    let mut placed: HashSet<&str> = HashSet::with_capacity(teams.len());
    let mut remaining: Vec<&Team> = teams.iter().collect();

    while !remaining.is_empty() {
        let mut ready: Vec<&str> = remaining
            .iter()
            .filter(|t| {
                t.depends_on.iter().all(|dep| {
                    let present = known.contains(dep.as_str());
                    if !present {
                        debug!(team = %t.id, dependency = %dep, "ignoring dependency on absent team");
                    }
                    !present || placed.contains(dep.as_str())
                })
            })
            .map(|t| t.id.as_str())
            .collect();

        if ready.is_empty() {
            let mut stuck: Vec<&str> = remaining.iter().map(|t| t.id.as_str()).collect();
            stuck.sort_unstable();
            return Err(Error::DependencyCycle(format!(
                "teams {} depend on each other",
                stuck.join(", ")
            )));
        }

        ready.sort_unstable();
        placed.extend(ready.iter().copied());
        remaining.retain(|t| !placed.contains(t.id.as_str()));
        waves.push(ready.into_iter().map(str::to_string).collect());
    }

    Ok(waves)
}

/// Sorts teams so each appears after everything it depends on, breaking ties
/// by ascending id.
pub fn order(teams: Vec<Team>) -> Result<Vec<Team>> {
    let waves = levels(&teams)?;

    let mut by_id: HashMap<String, Team> = teams.into_iter().map(|t| (t.id.clone(), t)).collect();
    let mut sorted = Vec::with_capacity(by_id.len());
    for id in waves.into_iter().flatten() {
        if let Some(team) = by_id.remove(&id) {
            sorted.push(team);
        }
    }

    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Check, Report, ReportMeta};
    use crate::status::Status;
    use proptest::prelude::*;

    fn ids(teams: &[Team]) -> Vec<&str> {
        teams.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn pm_first_then_alphabetical() {
        let teams = vec![
            Team::new("qa", "qa")
                .with_depends_on(["pm"])
                .with_checks([Check::no_go("tests", "2 failed")]),
            Team::new("docs", "documentation")
                .with_depends_on(["pm"])
                .with_checks([Check::go("readme"), Check::go("changelog")]),
            Team::new("pm", "pm").with_checks([Check::warn("scope", "large")]),
        ];

        let sorted = order(teams).unwrap();
        assert_eq!(ids(&sorted), vec!["pm", "docs", "qa"]);

        let report = Report::new(ReportMeta::default(), sorted);
        assert_eq!(report.status(), Status::NoGo);
    }

    #[test]
    fn levels_group_independent_teams() {
        let teams = vec![
            Team::new("release", "release").with_depends_on(["qa", "docs"]),
            Team::new("qa", "qa").with_depends_on(["pm"]),
            Team::new("docs", "docs").with_depends_on(["pm"]),
            Team::new("pm", "pm"),
        ];

        let waves = levels(&teams).unwrap();
        assert_eq!(
            waves,
            vec![
                vec!["pm".to_string()],
                vec!["docs".to_string(), "qa".to_string()],
                vec!["release".to_string()],
            ]
        );
    }

    #[test]
    fn level_ties_break_before_later_levels() {
        // "a" depends on "z", so it waits for the next wave even though it sorts first.
        let teams = vec![
            Team::new("a", "a").with_depends_on(["z"]),
            Team::new("z", "z"),
            Team::new("m", "m"),
        ];

        let sorted = order(teams).unwrap();
        assert_eq!(ids(&sorted), vec!["m", "z", "a"]);
    }

    #[test]
    fn cycle_is_reported() {
        let teams = vec![
            Team::new("a", "a").with_depends_on(["c"]),
            Team::new("b", "b").with_depends_on(["a"]),
            Team::new("c", "c").with_depends_on(["b"]),
            Team::new("root", "root"),
        ];

        match order(teams) {
            Err(Error::DependencyCycle(msg)) => assert!(msg.contains("a, b, c")),
            other => panic!("expected cycle error, got {:?}", other.map(|t| ids(&t).len())),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let teams = vec![Team::new("a", "a").with_depends_on(["a"])];
        assert!(matches!(order(teams), Err(Error::DependencyCycle(_))));
    }

    #[test]
    fn absent_dependency_is_ignored() {
        let teams = vec![
            Team::new("qa", "qa").with_depends_on(["pm"]),
            Team::new("docs", "docs"),
        ];

        let sorted = order(teams).unwrap();
        assert_eq!(ids(&sorted), vec!["docs", "qa"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let teams = vec![Team::new("qa", "qa"), Team::new("qa", "qa-again")];
        assert!(matches!(order(teams), Err(Error::DuplicateTeam(id)) if id == "qa"));
    }

    #[test]
    fn empty_input_orders_to_empty() {
        assert!(order(Vec::new()).unwrap().is_empty());
    }

    /// Builds a DAG where team `i` may only depend on teams with a smaller index.
    fn dag_strategy() -> impl Strategy<Value = Vec<Team>> {
        (1usize..9).prop_flat_map(|n| {
            proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n).prop_map(
                move |edges| {
                    (0..n)
                        .map(|i| {
                            let deps = (0..i)
                                .filter(|&j| edges[i][j])
                                .map(|j| format!("t{}", j));
                            Team::new(format!("t{}", i), format!("team {}", i)).with_depends_on(deps)
                        })
                        .collect()
                },
            )
        })
    }

    proptest! {
        #[test]
        fn every_team_follows_its_dependencies(teams in dag_strategy()) {
            let sorted = order(teams.clone()).unwrap();
            prop_assert_eq!(sorted.len(), teams.len());

            let position: HashMap<&str, usize> = sorted
                .iter()
                .enumerate()
                .map(|(i, t)| (t.id.as_str(), i))
                .collect();
            for team in &sorted {
                for dep in &team.depends_on {
                    prop_assert!(position[dep.as_str()] < position[team.id.as_str()]);
                }
            }
        }

        #[test]
        fn levels_are_sorted_and_minimal(teams in dag_strategy()) {
            let waves = levels(&teams).unwrap();
            prop_assert_eq!(waves.iter().map(Vec::len).sum::<usize>(), teams.len());

            let wave_of: HashMap<&str, usize> = waves
                .iter()
                .enumerate()
                .flat_map(|(k, wave)| wave.iter().map(move |id| (id.as_str(), k)))
                .collect();
            let deps: HashMap<&str, &Team> = teams.iter().map(|t| (t.id.as_str(), t)).collect();

            for (k, wave) in waves.iter().enumerate() {
                let mut sorted = wave.clone();
                sorted.sort();
                prop_assert_eq!(&sorted, wave);

                for id in wave {
                    let team = deps[id.as_str()];
                    prop_assert!(team.depends_on.iter().all(|d| wave_of[d.as_str()] < k));
                    if k > 0 {
                        prop_assert!(
                            team.depends_on.iter().any(|d| wave_of[d.as_str()] == k - 1),
                            "{} in wave {} has no dependency in wave {}", id, k, k - 1
                        );
                    }
                }
            }
        }

        #[test]
        fn order_ignores_input_order(teams in dag_strategy()) {
            let mut reversed = teams.clone();
            reversed.reverse();
            let a = order(teams).unwrap();
            let b = order(reversed).unwrap();
            prop_assert_eq!(ids(&a), ids(&b));
        }
    }
}
