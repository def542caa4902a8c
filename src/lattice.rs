use tracing::debug;
use unicode_properties::{GeneralCategoryGroup, UnicodeGeneralCategory};

use crate::core::ReverseUromanInner;
use crate::edge::Edge;
use crate::fallback::fallback_target;

/// Candidate edges for one (input, target script) pair, indexed by start offset.
///
/// Offsets count chars, not bytes.
pub(super) struct Lattice<'a> {
    pub s_chars: Vec<char>,
    pub script: &'a str,
    pub uroman: &'a ReverseUromanInner,
    // self.edges[start] = every edge beginning at `start`
    pub edges: Vec<Vec<Edge>>,
    pub max_vertex: usize,
}

impl<'a> Lattice<'a> {
    pub fn new(s: &str, uroman: &'a ReverseUromanInner, script: &'a str) -> Self {
        let s_chars: Vec<char> = s.chars().collect();
        let max_vertex = s_chars.len();

        Self {
            s_chars,
            script,
            uroman,
            edges: vec![Vec::new(); max_vertex],
            max_vertex,
        }
    }

    /// Builds the complete lattice: rule matches first, then the per-character layer.
    pub fn build(s: &str, uroman: &'a ReverseUromanInner, script: &'a str) -> Self {
        let mut lat = Self::new(s, uroman, script);
        lat.add_rule_matches();
        lat.add_fall_back_singles();
        debug!(
            script,
            chars = lat.max_vertex,
            edges = lat.edge_count(),
            "lattice built"
        );
        lat
    }

    pub fn add_edge(&mut self, edge: Edge) {
        debug_assert!(edge.start < edge.end && edge.end <= self.max_vertex);
        self.edges[edge.start].push(edge);
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    /// Adds one "matched" edge for every span whose exact text has a rule for
    /// the target script.
    ///
    /// For a fixed start, spans only grow while they are a prefix of some rule
    /// source; once a span leaves the prefix index no longer span can match.
    pub fn add_rule_matches(&mut self) {
        for start in 0..self.max_vertex {
            let mut span = String::new();
            for end in (start + 1)..=self.max_vertex {
                span.push(self.s_chars[end - 1]);
                if !self.uroman.is_source_prefix(&span) {
                    break;
                }
                if let Some(rule) = self.uroman.best_rule(&span, self.script) {
                    let edge = Edge::matched(start, end, span.clone(), rule);
                    self.add_edge(edge);
                }
            }
        }
    }

    /// Adds a single-character edge at every position, whether or not a rule
    /// already covers it. Letters get the script's fallback substitution;
    /// everything else is preserved as-is.
    pub fn add_fall_back_singles(&mut self) {
        for position in 0..self.max_vertex {
            let c = self.s_chars[position];
            let edge = if is_letter(c) {
                Edge::fallback(position, c, fallback_target(self.script, c), self.script)
            } else {
                Edge::preserve(position, c)
            };
            self.add_edge(edge);
        }
    }

    /// Every edge in the lattice, ordered by start, then longest first, then
    /// annotation class.
    pub fn all_edges(&self) -> Vec<Edge> {
        let mut result = Vec::with_capacity(self.edge_count());
        for edges_at in &self.edges {
            let mut sorted: Vec<&Edge> = edges_at.iter().collect();
            sorted.sort_by(|a, b| b.end.cmp(&a.end).then(a.annotation.cmp(&b.annotation)));
            result.extend(sorted.into_iter().cloned());
        }
        result
    }

    /// The preferred edge starting at `start`: longest, then matched over
    /// fallback over preserve, then higher priority, then earlier-loaded rule.
    pub fn best_right_neighbor_edge(&self, start: usize) -> Option<&Edge> {
        self.edges
            .get(start)?
            .iter()
            .max_by(|a, b| a.preference_key().cmp(&b.preference_key()))
    }

    /// Greedy left-to-right path over `[start, end)`.
    pub fn best_rom_edge_path(&self, start: usize, end: usize) -> Vec<Edge> {
        let mut result = Vec::new();
        let mut current_pos = start;
        while current_pos < end {
            if let Some(best_edge) = self.best_right_neighbor_edge(current_pos) {
                current_pos = best_edge.end;
                result.push(best_edge.clone());
            } else {
                // Unreachable while every position has a single-character edge.
                debug!(position = current_pos, "no edge starts here; skipping a character");
                current_pos += 1;
            }
        }
        result
    }
}

/// Letters (`\p{L}`) are transliterated; everything else is passed through.
fn is_letter(c: char) -> bool {
    matches!(c.general_category_group(), GeneralCategoryGroup::Letter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Annotation;

    fn store(table: &str) -> ReverseUromanInner {
        let mut inner = ReverseUromanInner::default();
        inner.load_rule_table(table, "test");
        inner
    }

    fn path_text(lat: &Lattice) -> String {
        lat.best_rom_edge_path(0, lat.max_vertex)
            .iter()
            .map(|e| e.txt())
            .collect()
    }

    #[test]
    fn every_position_gets_a_single_char_edge() {
        let inner = store("sh::ش::Arabic::200\n");
        let lat = Lattice::build("ash 1", &inner, "Arabic");
        for position in 0..lat.max_vertex {
            assert!(
                lat.edges[position].iter().any(|e| e.len() == 1),
                "position {position} lacks a single-char edge"
            );
        }
    }

    #[test]
    fn matched_edges_only_for_requested_script() {
        let inner = store("sh::ش::Arabic::200\nsh::ş::Turkish::200\n");
        let lat = Lattice::build("sh", &inner, "Turkish");
        let matched: Vec<&Edge> = lat.edges[0]
            .iter()
            .filter(|e| e.annotation == Annotation::Matched)
            .collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].target, "ş");
    }

    #[test]
    fn prefix_pruning_keeps_matches_behind_prefixes() {
        // "sal" is only reachable through "s" and "sa", both registered prefixes.
        let inner = store("sal::صل::Arabic::10\nsalam::سلام::Arabic::1000\n");
        let lat = Lattice::build("sala", &inner, "Arabic");
        let ends: Vec<usize> = lat.edges[0]
            .iter()
            .filter(|e| e.annotation == Annotation::Matched)
            .map(|e| e.end)
            .collect();
        assert_eq!(ends, vec![3]);
    }

    #[test]
    fn longest_match_wins() {
        let inner = store("kh::خ::Arabic::200\n");
        let lat = Lattice::build("kh", &inner, "Arabic");
        let path = lat.best_rom_edge_path(0, 2);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].target, "خ");
    }

    #[test]
    fn longer_low_priority_beats_shorter_high_priority() {
        let inner = store("s::ص::Arabic::900\nsh::ش::Arabic::1\n");
        let lat = Lattice::build("sh", &inner, "Arabic");
        assert_eq!(path_text(&lat), "ش");
    }

    #[test]
    fn single_char_rule_beats_fallback() {
        let inner = store("s::ص::Arabic::0\n");
        let lat = Lattice::build("s", &inner, "Arabic");
        let best = lat.best_right_neighbor_edge(0).unwrap();
        assert_eq!(best.annotation, Annotation::Matched);
        assert_eq!(best.target, "ص");
    }

    #[test]
    fn non_letters_are_preserved_as_source_script() {
        let inner = store("");
        let lat = Lattice::build("a-1", &inner, "Arabic");
        let path = lat.best_rom_edge_path(0, 3);
        assert_eq!(path[0].annotation, Annotation::Fallback);
        assert_eq!(path[0].script, "Arabic");
        assert_eq!(path[1].annotation, Annotation::Preserve);
        assert_eq!(path[1].script, "Latin");
        assert_eq!(path[2].target, "1");
    }

    #[test]
    fn path_tiles_the_input() {
        let inner = store("sh::ش::Arabic::200\nshu::شو::Arabic::300\nkr::كر::Arabic::100\n");
        let text = "shukran, 42 shh";
        let lat = Lattice::build(text, &inner, "Arabic");
        let path = lat.best_rom_edge_path(0, lat.max_vertex);
        let mut expected_start = 0;
        for edge in &path {
            assert_eq!(edge.start, expected_start);
            assert!(edge.end > edge.start);
            expected_start = edge.end;
        }
        assert_eq!(expected_start, text.chars().count());
    }

    #[test]
    fn all_edges_orders_longest_first_per_start() {
        let inner = store("sh::ش::Arabic::200\n");
        let lat = Lattice::build("sh", &inner, "Arabic");
        let all = lat.all_edges();
        assert_eq!(all.len(), 3);
        assert_eq!((all[0].start, all[0].end), (0, 2));
        assert_eq!((all[1].start, all[1].end), (0, 1));
        assert_eq!((all[2].start, all[2].end), (1, 2));
    }

    #[test]
    fn empty_input_has_no_edges() {
        let inner = store("sh::ش::Arabic::200\n");
        let lat = Lattice::build("", &inner, "Arabic");
        assert_eq!(lat.edge_count(), 0);
        assert!(lat.best_rom_edge_path(0, 0).is_empty());
    }
}
