use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::rule::{ReverseRule, ReverseRules, RuleLineError};
use crate::utils::{self, is_comment_or_blank, slot_value_in_double_colon_del_list};

/// Rule tables in load order: (file name, provenance, embedded copy).
const RULE_TABLES: &[(&str, &str, &str)] = &[
    ("reverse_arabic.txt", "arabic", include_str!("../data/reverse_arabic.txt")),
    ("reverse_swahili.txt", "swahili", include_str!("../data/reverse_swahili.txt")),
    ("reverse_turkish.txt", "turkish", include_str!("../data/reverse_turkish.txt")),
    ("reverse_general.txt", "general", include_str!("../data/reverse_general.txt")),
];

const SCRIPTS_FILE: &str = "scripts.txt";
const EMBEDDED_SCRIPTS: &str = include_str!("../data/scripts.txt");

/// Writing direction of a target script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    LeftToRight,
    RightToLeft,
}

impl Direction {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "left-to-right" | "ltr" => Some(Direction::LeftToRight),
            "right-to-left" | "rtl" => Some(Direction::RightToLeft),
            _ => None,
        }
    }
}

/// Metadata about a target script. Carried for direction-aware consumers; it
/// does not influence matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDescriptor {
    pub script_name: String,
    pub direction: Direction,
    pub default_vowels: Vec<String>,
    /// e.g. `consonant_final -> a`.
    pub vowel_insertion_rules: BTreeMap<String, String>,
    pub alt_script_names: Vec<String>,
    /// Free-form traits such as `script_family -> Bantu`. Values are kept verbatim.
    pub character_properties: BTreeMap<String, String>,
}

/// Where the rule tables are read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RuleSource {
    /// The tables compiled into the crate.
    #[default]
    Embedded,
    /// A directory holding `reverse_*.txt` and optionally `scripts.txt`.
    Directory(PathBuf),
    /// In-memory tables as (provenance, content), loaded in order.
    Inline(Vec<(String, String)>),
}

#[derive(Error, Debug)]
pub(crate) enum TableLoadError {
    #[error("rule table '{}' not found", .path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read rule table '{}': {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// A data line that was skipped while loading a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line_number: usize,
    pub reason: RuleLineError,
}

/// Outcome of loading one rule table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableReport {
    pub provenance: String,
    pub loaded: usize,
    pub skipped: Vec<SkippedLine>,
    /// Set when the table could not be read; the table then contributes no rules.
    pub error: Option<String>,
}

/// Diagnostics gathered while the rule store was built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub tables: Vec<TableReport>,
    pub scripts_loaded: usize,
}

impl LoadReport {
    pub fn rules_loaded(&self) -> usize {
        self.tables.iter().map(|t| t.loaded).sum()
    }

    pub fn lines_skipped(&self) -> usize {
        self.tables.iter().map(|t| t.skipped.len()).sum()
    }

    pub fn missing_tables(&self) -> impl Iterator<Item = &TableReport> {
        self.tables.iter().filter(|t| t.error.is_some())
    }
}

/// The immutable rule store: rules, their prefix index, and script descriptors.
#[derive(Debug, Default)]
pub(crate) struct ReverseUromanInner {
    pub(crate) rules: ReverseRules,
    /// Every prefix of every rule source; spans outside this set cannot grow into a match.
    pub(crate) source_prefixes: HashSet<String>,
    pub(crate) scripts: HashMap<String, ScriptDescriptor>,
    pub(crate) load_report: LoadReport,
    next_order: usize,
}

impl ReverseUromanInner {
    pub(crate) fn new(source: &RuleSource) -> Self {
        let mut inner = Self::default();
        inner.load_resource_files(source);

        let report = &inner.load_report;
        info!(
            rules = report.rules_loaded(),
            skipped = report.lines_skipped(),
            scripts = report.scripts_loaded,
            "reverse romanization rules loaded"
        );
        inner
    }

    fn load_resource_files(&mut self, source: &RuleSource) {
        if let RuleSource::Inline(tables) = source {
            for (provenance, content) in tables {
                let report = self.load_rule_table(content, provenance);
                self.load_report.tables.push(report);
            }
            self.load_script_file(EMBEDDED_SCRIPTS);
            return;
        }

        for &(file_name, provenance, embedded) in RULE_TABLES {
            let table = match source {
                RuleSource::Directory(dir) => read_table(&dir.join(file_name)),
                _ => Ok(embedded.to_string()),
            };

            let report = match table {
                Ok(content) => self.load_rule_table(&content, provenance),
                Err(err) => {
                    warn!("{err}; continuing without '{provenance}' rules");
                    TableReport {
                        provenance: provenance.to_string(),
                        error: Some(err.to_string()),
                        ..TableReport::default()
                    }
                }
            };
            self.load_report.tables.push(report);
        }

        let scripts = match source {
            RuleSource::Directory(dir) => match fs::read_to_string(dir.join(SCRIPTS_FILE)) {
                Ok(content) => content,
                Err(err) => {
                    debug!("no readable {SCRIPTS_FILE} in {} ({err}); using built-in descriptors", dir.display());
                    EMBEDDED_SCRIPTS.to_string()
                }
            },
            _ => EMBEDDED_SCRIPTS.to_string(),
        };
        self.load_script_file(&scripts);
    }

    /// Loads one rule table. Malformed lines are skipped and reported.
    pub(crate) fn load_rule_table(&mut self, file: &str, provenance: &str) -> TableReport {
        let mut report = TableReport {
            provenance: provenance.to_string(),
            ..TableReport::default()
        };

        for (index, line) in file.lines().enumerate() {
            if is_comment_or_blank(line) {
                continue;
            }

            match ReverseRule::from_line(line, provenance, self.next_order) {
                Ok(rule) => {
                    self.next_order += 1;
                    self.add_rule(rule);
                    report.loaded += 1;
                }
                Err(reason) => {
                    warn!(table = provenance, line = index + 1, "skipping rule line: {reason}");
                    report.skipped.push(SkippedLine {
                        line_number: index + 1,
                        reason,
                    });
                }
            }
        }

        debug!(
            table = provenance,
            loaded = report.loaded,
            skipped = report.skipped.len(),
            "rule table loaded"
        );
        report
    }

    fn add_rule(&mut self, rule: ReverseRule) {
        self.register_source_prefix(&rule.source);
        self.rules.entry(rule.source.clone()).or_default().push(rule);
    }

    /// Registers all prefixes of a source pattern for span pruning.
    fn register_source_prefix(&mut self, s: &str) {
        let mut prefix = String::with_capacity(s.len());
        for c in s.chars() {
            prefix.push(c);
            if !self.source_prefixes.contains(&prefix) {
                self.source_prefixes.insert(prefix.clone());
            }
        }
    }

    /// Loads a script definition file (e.g., `scripts.txt`).
    fn load_script_file(&mut self, file: &str) {
        for line in file.lines() {
            if is_comment_or_blank(line) {
                continue;
            }

            let Some(script_name) = slot_value_in_double_colon_del_list(line, "script-name") else {
                continue;
            };
            let lc_script_name = script_name.to_lowercase();
            if self.scripts.contains_key(&lc_script_name) {
                warn!("duplicate script definition for '{script_name}' ignored");
                continue;
            }

            let direction = slot_value_in_double_colon_del_list(line, "direction")
                .and_then(|d| {
                    let parsed = Direction::parse(d);
                    if parsed.is_none() {
                        warn!("unknown direction '{d}' for script '{script_name}'");
                    }
                    parsed
                })
                .unwrap_or_default();
            let default_vowels = slot_value_in_double_colon_del_list(line, "default-vowel")
                .map(utils::split_list_value)
                .unwrap_or_default();
            let vowel_insertion_rules = slot_value_in_double_colon_del_list(line, "vowel-insertion")
                .map(|s| {
                    utils::split_list_value(s)
                        .into_iter()
                        .filter_map(|item| {
                            item.split_once('=')
                                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                        })
                        .collect()
                })
                .unwrap_or_default();
            let character_properties = slot_value_in_double_colon_del_list(line, "character-property")
                .map(parse_character_properties)
                .unwrap_or_default();
            let alt_script_names = slot_value_in_double_colon_del_list(line, "alt-script-name")
                .map(utils::split_list_value)
                .unwrap_or_default();

            let descriptor = ScriptDescriptor {
                script_name: script_name.to_string(),
                direction,
                default_vowels,
                vowel_insertion_rules,
                alt_script_names: alt_script_names.clone(),
                character_properties,
            };

            for alt_script_name in alt_script_names {
                self.scripts
                    .entry(alt_script_name.to_lowercase())
                    .or_insert_with(|| descriptor.clone());
            }
            self.scripts.insert(lc_script_name, descriptor);
            self.load_report.scripts_loaded += 1;
        }
    }

    /// Case-insensitive descriptor lookup, including alternative names.
    pub(crate) fn script(&self, name: &str) -> Option<&ScriptDescriptor> {
        self.scripts.get(&name.to_lowercase())
    }

    /// The rule for exactly `span` in `script` with the highest priority;
    /// the earliest-loaded one among equals.
    pub(crate) fn best_rule(&self, span: &str, script: &str) -> Option<&ReverseRule> {
        self.rules
            .get(span)?
            .iter()
            .filter(|rule| rule.script == script)
            .fold(None, |best: Option<&ReverseRule>, rule| match best {
                Some(b) if !rule.outranks(b) => Some(b),
                _ => Some(rule),
            })
    }

    pub(crate) fn is_source_prefix(&self, s: &str) -> bool {
        self.source_prefixes.contains(s)
    }
}

/// `key=value;key=value`; values may themselves contain commas.
fn parse_character_properties(value: &str) -> BTreeMap<String, String> {
    value
        .split(';')
        .filter_map(|item| item.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn read_table(path: &Path) -> Result<String, TableLoadError> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => TableLoadError::NotFound {
            path: path.to_path_buf(),
        },
        _ => TableLoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner_with(table: &str) -> (ReverseUromanInner, TableReport) {
        let mut inner = ReverseUromanInner::default();
        let report = inner.load_rule_table(table, "test");
        (inner, report)
    }

    #[test]
    fn skips_comments_blanks_and_malformed_lines() {
        let table = "# comment\n\nsh::ش::Arabic::200\nbroken line\nx::y\nk::ك::Arabic::many\n";
        let (inner, report) = inner_with(table);
        assert_eq!(report.loaded, 1);
        assert_eq!(
            report.skipped,
            vec![
                SkippedLine { line_number: 4, reason: RuleLineError::TooFewFields(1) },
                SkippedLine { line_number: 5, reason: RuleLineError::TooFewFields(2) },
                SkippedLine {
                    line_number: 6,
                    reason: RuleLineError::InvalidPriority("many".to_string())
                },
            ]
        );
        assert_eq!(inner.rules.len(), 1);
    }

    #[test]
    fn best_rule_filters_by_script_and_priority() {
        let (inner, _) = inner_with(
            "sh::سه::Arabic::100\nsh::ş::Turkish::100\nsh::ش::Arabic::500\n",
        );
        assert_eq!(inner.best_rule("sh", "Arabic").map(|r| r.target.as_str()), Some("ش"));
        assert_eq!(inner.best_rule("sh", "Turkish").map(|r| r.target.as_str()), Some("ş"));
        assert!(inner.best_rule("sh", "Swahili").is_none());
        assert!(inner.best_rule("zz", "Arabic").is_none());
    }

    #[test]
    fn equal_priorities_keep_first_loaded() {
        let (inner, _) = inner_with("th::ث::Arabic::200\nth::ذ::Arabic::200\n");
        assert_eq!(inner.best_rule("th", "Arabic").map(|r| r.target.as_str()), Some("ث"));
    }

    #[test]
    fn registers_all_prefixes() {
        let (inner, _) = inner_with("salam::سلام::Arabic::1000\n");
        for p in ["s", "sa", "sal", "sala", "salam"] {
            assert!(inner.is_source_prefix(p), "missing prefix {p}");
        }
        assert!(!inner.is_source_prefix("salama"));
        assert!(!inner.is_source_prefix("a"));
    }

    #[test]
    fn embedded_store_loads_every_table() {
        let inner = ReverseUromanInner::new(&RuleSource::Embedded);
        let report = &inner.load_report;
        assert_eq!(report.tables.len(), RULE_TABLES.len());
        assert!(report.tables.iter().all(|t| t.loaded > 0 && t.error.is_none()));
        assert_eq!(report.lines_skipped(), 0);
        assert!(report.scripts_loaded >= 4);
    }

    #[test]
    fn script_descriptors_parse() {
        let inner = ReverseUromanInner::new(&RuleSource::Embedded);
        let arabic = inner.script("arabic").expect("Arabic descriptor");
        assert_eq!(arabic.script_name, "Arabic");
        assert_eq!(arabic.direction, Direction::RightToLeft);
        assert_eq!(arabic.default_vowels, vec!["a", "i", "u"]);
        assert_eq!(
            arabic.vowel_insertion_rules.get("consonant_medial").map(String::as_str),
            Some("i")
        );
        assert_eq!(inner.script("Devanagari").map(|s| s.direction), Some(Direction::LeftToRight));
        assert!(inner.script("Klingon").is_none());
    }

    #[test]
    fn character_properties_keep_list_values() {
        let inner = ReverseUromanInner::new(&RuleSource::Embedded);
        let swahili = inner.script("Swahili").expect("Swahili descriptor");
        let props = &swahili.character_properties;
        assert_eq!(props.get("script_family").map(String::as_str), Some("Bantu"));
        assert_eq!(props.get("has_tone_marks").map(String::as_str), Some("false"));
        assert_eq!(
            props.get("loanword_languages").map(String::as_str),
            Some("Arabic,English,Portuguese")
        );
        assert!(inner.script("Turkish").is_some_and(|t| t.character_properties.is_empty()));
    }

    #[test]
    fn directory_scripts_file_replaces_builtin_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(SCRIPTS_FILE),
            "::script-name Arabic ::direction ltr ::default-vowel e ::alt-script-name Arb\n",
        )
        .unwrap();

        let inner = ReverseUromanInner::new(&RuleSource::Directory(dir.path().to_path_buf()));
        let arabic = inner.script("Arabic").expect("custom descriptor");
        assert_eq!(arabic.direction, Direction::LeftToRight);
        assert_eq!(arabic.default_vowels, vec!["e"]);
        assert!(inner.script("Arb").is_some());
        assert!(inner.script("Arab").is_none());
        assert!(inner.script("Devanagari").is_none());
        assert_eq!(inner.load_report.scripts_loaded, 1);
    }

    #[test]
    fn missing_directory_tables_are_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("reverse_arabic.txt"), "sh::ش::Arabic::200\n").unwrap();

        let inner = ReverseUromanInner::new(&RuleSource::Directory(dir.path().to_path_buf()));
        let report = &inner.load_report;
        assert_eq!(report.rules_loaded(), 1);
        assert_eq!(report.missing_tables().count(), RULE_TABLES.len() - 1);
        // Descriptors fall back to the built-in set.
        assert!(inner.script("Arabic").is_some());
    }
}
