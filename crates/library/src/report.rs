//! Plain-text run report.
//!
//! Rendered with [upon] from the [`Summary`], the per-ROM outcomes, and any
//! placement failures. Sections appear in this order:
//!
//! 1. Banner, start time, duration and catalog request count.
//! 2. Totals, with the number of duplicates set aside if any.
//! 3. Games with achievements, most achievements first.
//! 4. Error counts per kind, then every error grouped by kind.
//! 5. Percentages of the processed total.
//!
//! Empty sections are left out.

use crate::error::{ErrorKind, Result};
use crate::outcome::{ClassifiedRom, FailureKind, Outcome};
use crate::sort::{Action, Placement};
use crate::summary::Summary;
use exn::ResultExt;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use time::macros::format_description;
use tracing::instrument;
use upon::Engine;

const TEMPLATE: &str = "\
==================================================
SORTING COMPLETE - SUMMARY REPORT
==================================================

Started: {{ started }}
Processing Duration: {{ duration }}
Catalog Requests: {{ catalog_calls }}

Total ROMs processed: {{ total }}
ROMs with achievements: {{ with_achievements }}
ROMs without achievements: {{ without_achievements }}
ROMs not found in hash library: {{ unknown }}
{%- if has_duplicates %}
Duplicates set aside: {{ duplicates }}
{%- endif %}
{%- if has_games %}

Games with achievements:
------------------------------
{%- for game in games %}
{{ game.title }}: {{ game.achievements }} achievements
{%- endfor %}
{%- endif %}
{%- if has_errors %}

Error Summary:
------------------------------
{%- for entry in error_summary %}
{{ entry.kind }}: {{ entry.count }} occurrences
{%- endfor %}

Detailed Errors:
------------------------------
{%- for group in error_groups %}

{{ group.kind }}:
{%- for error in group.errors %}
  - {{ error.file }}: {{ error.message }}
{%- endfor %}
{%- endfor %}
{%- endif %}
{%- if has_percentages %}

Statistics:
------------------------------
ROMs with achievements: {{ with_achievements_percent }}%
ROMs with errors: {{ errors_percent }}%
ROMs not found: {{ unknown_percent }}%
{%- endif %}
";

/// One line of the detailed error listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    pub file: String,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Serialize)]
struct Game {
    title: String,
    achievements: u32,
}

#[derive(Serialize)]
struct ErrorCount {
    kind: String,
    count: usize,
}

#[derive(Serialize)]
struct ErrorLine<'a> {
    file: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct ErrorGroup<'a> {
    kind: String,
    errors: Vec<ErrorLine<'a>>,
}

#[derive(Serialize)]
struct Context<'a> {
    started: String,
    duration: String,
    catalog_calls: u64,
    total: usize,
    with_achievements: usize,
    without_achievements: usize,
    unknown: usize,
    has_duplicates: bool,
    duplicates: usize,
    has_games: bool,
    games: Vec<Game>,
    has_errors: bool,
    error_summary: Vec<ErrorCount>,
    error_groups: Vec<ErrorGroup<'a>>,
    has_percentages: bool,
    with_achievements_percent: String,
    errors_percent: String,
    unknown_percent: String,
}

pub struct Report<'a> {
    summary: &'a Summary,
    roms: &'a [ClassifiedRom],
    placements: &'a [Placement],
}

impl<'a> Report<'a> {
    pub fn new(summary: &'a Summary, roms: &'a [ClassifiedRom], placements: &'a [Placement]) -> Self {
        Self { summary, roms, placements }
    }

    /// Classification failures in input order, followed by placement failures.
    pub fn errors(&self) -> Vec<ReportedError> {
        let classification = self.roms.iter().filter_map(|rom| match &rom.outcome {
            Outcome::Error(failure) => Some(ReportedError {
                file: rom.file_name(),
                kind: failure.kind,
                message: failure.message.clone(),
            }),
            _ => None,
        });
        let placement = self.placements.iter().filter_map(|placement| {
            placement.failure().map(|failure| ReportedError {
                file: file_name(&placement.source),
                kind: failure.kind,
                message: failure.message.clone(),
            })
        });
        classification.chain(placement).collect()
    }

    /// Files with at least one error, whether from classification or placement.
    fn files_with_errors(&self) -> usize {
        let classification = self.roms.iter().filter(|rom| rom.outcome.failure().is_some()).map(|rom| &rom.path);
        let placement = self.placements.iter().filter(|placement| placement.failure().is_some()).map(|p| &p.source);
        classification.chain(placement).collect::<HashSet<_>>().len()
    }

    /// Distinct titles with achievements, most achievements first, then by title.
    fn games(&self) -> Vec<Game> {
        let mut by_title = BTreeMap::new();
        for rom in self.roms {
            if let Outcome::HasAchievements(count) = rom.outcome {
                by_title.insert(rom.title.clone().unwrap_or_else(|| rom.file_name()), count);
            }
        }
        let mut games: Vec<Game> = by_title.into_iter().map(|(title, achievements)| Game { title, achievements }).collect();
        // Stable sort keeps the alphabetical order from the map for equal counts.
        games.sort_by(|a, b| b.achievements.cmp(&a.achievements));
        games
    }

    #[instrument(skip_all)]
    pub fn render(&self) -> Result<String> {
        let errors = self.errors();
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut groups: Vec<ErrorGroup<'_>> = Vec::new();
        for error in &errors {
            let kind = error.kind.to_string();
            *counts.entry(kind.clone()).or_default() += 1;
            let line = ErrorLine { file: &error.file, message: &error.message };
            match groups.iter_mut().find(|group| group.kind == kind) {
                Some(group) => group.errors.push(line),
                None => groups.push(ErrorGroup { kind, errors: vec![line] }),
            }
        }

        let summary = self.summary;
        let games = self.games();
        let duplicates = self
            .placements
            .iter()
            .filter(|placement| matches!(placement.result, Ok(Action::SetAside { .. })))
            .count();
        let percent = |count: usize| format!("{:.2}", count as f64 * 100.0 / summary.processed.max(1) as f64);
        let started = summary
            .started
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC"))
            .or_raise(|| ErrorKind::Report)?;
        let context = Context {
            started,
            duration: format_duration(summary.duration),
            catalog_calls: summary.catalog_calls,
            total: summary.processed,
            with_achievements: summary.with_achievements,
            without_achievements: summary.without_achievements,
            unknown: summary.unknown,
            has_duplicates: duplicates > 0,
            duplicates,
            has_games: !games.is_empty(),
            games,
            has_errors: !errors.is_empty(),
            error_summary: counts.into_iter().map(|(kind, count)| ErrorCount { kind, count }).collect(),
            error_groups: groups,
            has_percentages: summary.processed > 0,
            with_achievements_percent: percent(summary.with_achievements),
            errors_percent: percent(self.files_with_errors()),
            unknown_percent: percent(summary.unknown),
        };

        let engine = Engine::new();
        let template = engine.compile(TEMPLATE).or_raise(|| ErrorKind::Report)?;
        template.render(&engine, &context).to_string().or_raise(|| ErrorKind::Report)
    }

    /// Renders the report and writes it to `path`, returning the text.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let text = self.render()?;
        std::fs::write(path, &text).or_raise(|| ErrorKind::WriteReport(path.to_path_buf()))?;
        tracing::info!(path = %path.display(), "Saved report");
        Ok(text)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `H:MM:SS.mmm`
fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    format!(
        "{}:{:02}:{:02}.{:03}",
        seconds / 3600,
        seconds / 60 % 60,
        seconds % 60,
        duration.subsec_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Failure;
    use rstest::rstest;
    use std::path::PathBuf;
    use time::UtcDateTime;
    use time::macros::datetime;

    fn rom(name: &str, title: Option<&str>, outcome: Outcome) -> ClassifiedRom {
        ClassifiedRom {
            path: PathBuf::from("roms").join(name),
            hash: None,
            title: title.map(String::from),
            outcome,
        }
    }

    fn summary_of(roms: &[ClassifiedRom]) -> Summary {
        let mut summary = Summary::new(UtcDateTime::from(datetime!(2026-10-18 09:30:00 UTC)));
        roms.iter().for_each(|rom| summary.record(&rom.outcome));
        summary.duration = Duration::from_millis(83_250);
        summary.catalog_calls = 4;
        summary
    }

    #[rstest]
    #[case(Duration::ZERO, "0:00:00.000")]
    #[case(Duration::from_millis(83_250), "0:01:23.250")]
    #[case(Duration::from_secs(3 * 3600 + 5), "3:00:05.000")]
    fn test_format_duration(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(duration), expected);
    }

    #[test]
    fn test_full_report() {
        let roms = vec![
            rom("a.gba", Some("Game A"), Outcome::HasAchievements(10)),
            rom("b.gba", Some("Game B"), Outcome::HasAchievements(25)),
            rom("c.gba", Some("Game C"), Outcome::NoAchievements),
            rom("d.gba", None, Outcome::Error(Failure::new(FailureKind::UnknownRom, "hash d is unknown"))),
            rom("e.gba", None, Outcome::Error(Failure::new(FailureKind::Read, "permission denied"))),
        ];
        let placements = vec![
            Placement { source: PathBuf::from("roms/a.gba"), result: Ok(Action::Copied(PathBuf::from("x"))) },
            Placement {
                source: PathBuf::from("roms/c.gba"),
                result: Err(Failure::new(FailureKind::Placement, "disk full")),
            },
        ];
        let summary = summary_of(&roms);
        let text = Report::new(&summary, &roms, &placements).render().unwrap();

        let expected = "\
==================================================
SORTING COMPLETE - SUMMARY REPORT
==================================================

Started: 2026-10-18 09:30:00 UTC
Processing Duration: 0:01:23.250
Catalog Requests: 4

Total ROMs processed: 5
ROMs with achievements: 2
ROMs without achievements: 1
ROMs not found in hash library: 1

Games with achievements:
------------------------------
Game B: 25 achievements
Game A: 10 achievements

Error Summary:
------------------------------
File Processing Error: 1 occurrences
Read Error: 1 occurrences
Unknown ROM: 1 occurrences

Detailed Errors:
------------------------------

Unknown ROM:
  - d.gba: hash d is unknown

Read Error:
  - e.gba: permission denied

File Processing Error:
  - c.gba: disk full

Statistics:
------------------------------
ROMs with achievements: 40.00%
ROMs with errors: 60.00%
ROMs not found: 20.00%
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_error_percentage_counts_files_once() {
        let roms = vec![rom("d.gba", None, Outcome::Error(Failure::new(FailureKind::UnknownRom, "unknown")))];
        let placements = vec![Placement {
            source: PathBuf::from("roms/d.gba"),
            result: Err(Failure::new(FailureKind::Placement, "disk full")),
        }];
        let summary = summary_of(&roms);
        let text = Report::new(&summary, &roms, &placements).render().unwrap();
        assert!(text.contains("Unknown ROM: 1 occurrences\n"));
        assert!(text.contains("File Processing Error: 1 occurrences\n"));
        assert!(text.contains("ROMs with errors: 100.00%\n"));
    }

    #[test]
    fn test_duplicates_set_aside_are_counted() {
        let roms = vec![
            rom("a.gba", Some("Game A"), Outcome::NoAchievements),
            rom("a [!].gba", Some("Game A"), Outcome::NoAchievements),
        ];
        let placements = vec![
            Placement { source: PathBuf::from("roms/a.gba"), result: Ok(Action::Copied(PathBuf::from("x"))) },
            Placement {
                source: PathBuf::from("roms/a [!].gba"),
                result: Ok(Action::SetAside { original: PathBuf::from("roms/a.gba"), target: PathBuf::from("y") }),
            },
        ];
        let summary = summary_of(&roms);
        let text = Report::new(&summary, &roms, &placements).render().unwrap();
        assert!(text.contains("ROMs not found in hash library: 0\nDuplicates set aside: 1\n\nStatistics:"));
    }

    #[test]
    fn test_empty_run_omits_sections() {
        let summary = summary_of(&[]);
        let text = Report::new(&summary, &[], &[]).render().unwrap();
        assert!(text.ends_with("ROMs not found in hash library: 0\n"));
        assert!(!text.contains("Games with achievements"));
        assert!(!text.contains("Error Summary"));
        assert!(!text.contains("Statistics"));
    }

    #[test]
    fn test_duplicate_titles_listed_once() {
        let roms = vec![
            rom("a.gba", Some("Same"), Outcome::HasAchievements(3)),
            rom("a (Rev 1).gba", Some("Same"), Outcome::HasAchievements(3)),
            rom("z.gba", None, Outcome::HasAchievements(3)),
        ];
        let summary = summary_of(&roms);
        let text = Report::new(&summary, &roms, &[]).render().unwrap();
        assert_eq!(text.matches("Same: 3 achievements").count(), 1);
        // Equal counts fall back to alphabetical order; untitled ROMs use the file name.
        assert!(text.contains("Same: 3 achievements\nz.gba: 3 achievements"));
    }

    #[test]
    fn test_save() {
        let temp_dir = tempfile::tempdir().unwrap();
        let roms = vec![rom("a.gba", Some("Game A"), Outcome::HasAchievements(1))];
        let summary = summary_of(&roms);
        let path = temp_dir.path().join("sorting_report.txt");
        let text = Report::new(&summary, &roms, &[]).save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
    }
}
