//! Token pattern compilation
//!
//! Every token pattern of a language is compiled into one NFA (regex patterns
//! through `regex-syntax`'s HIR), then into a single DFA by subset
//! construction. Each DFA state records which terminals accept there, so one
//! walk over the input yields the matches for every terminal at once.

use crate::lexer::decode_char;
use hashbrown::HashMap;
use regex_syntax::hir::{Class, Hir, HirKind};
use smallvec::SmallVec;

/// Inclusive code point range
type CharRange = (u32, u32);

#[derive(Debug, Clone, Default)]
struct NfaState {
    transitions: Vec<(CharRange, u32)>,
    epsilon: Vec<u32>,
    accept: Option<u16>,
}

#[derive(Debug, Default)]
pub(crate) struct Nfa {
    states: Vec<NfaState>,
}

impl Nfa {
    pub fn new() -> Self {
        // State 0 is the shared start state.
        Self {
            states: vec![NfaState::default()],
        }
    }

    fn add_state(&mut self) -> u32 {
        self.states.push(NfaState::default());
        (self.states.len() - 1) as u32
    }

    fn transition(&mut self, from: u32, range: CharRange, to: u32) {
        self.states[from as usize].transitions.push((range, to));
    }

    fn epsilon(&mut self, from: u32, to: u32) {
        self.states[from as usize].epsilon.push(to);
    }

    /// Add a literal token for `terminal`.
    pub fn add_literal(&mut self, text: &str, terminal: u16) {
        let mut current = self.add_state();
        self.epsilon(0, current);
        for c in text.chars() {
            let next = self.add_state();
            self.transition(current, (c as u32, c as u32), next);
            current = next;
        }
        self.states[current as usize].accept = Some(terminal);
    }

    /// Add a regex token for `terminal`.
    pub fn add_regex(&mut self, pattern: &str, terminal: u16) -> Result<(), String> {
        let hir = regex_syntax::ParserBuilder::new()
            .build()
            .parse(pattern)
            .map_err(|e| e.to_string())?;
        let start = self.add_state();
        let end = self.add_state();
        self.epsilon(0, start);
        self.add_hir(&hir, start, end)?;
        self.states[end as usize].accept = Some(terminal);
        Ok(())
    }

    fn add_hir(&mut self, hir: &Hir, start: u32, end: u32) -> Result<(), String> {
        match hir.kind() {
            HirKind::Empty => self.epsilon(start, end),
            HirKind::Literal(literal) => {
                let text = String::from_utf8_lossy(&literal.0);
                let mut current = start;
                let count = text.chars().count();
                for (i, c) in text.chars().enumerate() {
                    let next = if i + 1 == count { end } else { self.add_state() };
                    self.transition(current, (c as u32, c as u32), next);
                    current = next;
                }
                if count == 0 {
                    self.epsilon(start, end);
                }
            }
            HirKind::Class(Class::Unicode(class)) => {
                for range in class.iter() {
                    self.transition(start, (range.start() as u32, range.end() as u32), end);
                }
            }
            HirKind::Class(Class::Bytes(class)) => {
                for range in class.iter() {
                    self.transition(start, (u32::from(range.start()), u32::from(range.end())), end);
                }
            }
            HirKind::Look(look) => {
                return Err(format!("look-around assertion {look:?} is not supported in tokens"));
            }
            HirKind::Capture(capture) => self.add_hir(&capture.sub, start, end)?,
            HirKind::Concat(items) => {
                let mut current = start;
                for (i, item) in items.iter().enumerate() {
                    let next = if i + 1 == items.len() { end } else { self.add_state() };
                    self.add_hir(item, current, next)?;
                    current = next;
                }
                if items.is_empty() {
                    self.epsilon(start, end);
                }
            }
            HirKind::Alternation(items) => {
                for item in items {
                    self.add_hir(item, start, end)?;
                }
            }
            HirKind::Repetition(repetition) => {
                let min = repetition.min;
                if min > 256 || repetition.max.is_some_and(|max| max > 256) {
                    return Err("repetition counts above 256 are not supported".into());
                }
                let mut current = start;
                for _ in 0..min {
                    let next = self.add_state();
                    self.add_hir(&repetition.sub, current, next)?;
                    current = next;
                }
                match repetition.max {
                    None => {
                        let loop_start = self.add_state();
                        let loop_end = self.add_state();
                        self.epsilon(current, loop_start);
                        self.add_hir(&repetition.sub, loop_start, loop_end)?;
                        self.epsilon(loop_end, loop_start);
                        self.epsilon(loop_start, end);
                    }
                    Some(max) => {
                        for _ in min..max {
                            let next = self.add_state();
                            self.epsilon(current, end);
                            self.add_hir(&repetition.sub, current, next)?;
                            current = next;
                        }
                        self.epsilon(current, end);
                    }
                }
            }
        }
        Ok(())
    }

    fn closure(&self, seeds: impl IntoIterator<Item = u32>) -> Vec<u32> {
        let mut seen = vec![false; self.states.len()];
        let mut stack: Vec<u32> = seeds.into_iter().collect();
        let mut result = Vec::new();
        while let Some(state) = stack.pop() {
            if std::mem::replace(&mut seen[state as usize], true) {
                continue;
            }
            result.push(state);
            stack.extend_from_slice(&self.states[state as usize].epsilon);
        }
        result.sort_unstable();
        result
    }
}

#[derive(Debug, Clone, Default)]
struct DfaState {
    /// Disjoint ranges sorted by start
    transitions: Vec<(CharRange, u32)>,
    /// Accepting terminals, sorted
    accepts: SmallVec<[u16; 2]>,
}

/// Combined DFA over all token patterns
#[derive(Debug, Clone)]
pub(crate) struct Dfa {
    states: Vec<DfaState>,
}

/// Every accepting position reached from one starting offset
#[derive(Debug, Clone, Default)]
pub(crate) struct Scan {
    /// `(end offset, DFA state)` in increasing order of end offset
    pub ends: SmallVec<[(usize, u32); 8]>,
    /// One past the last byte read; `len + 1` if end of input was observed
    pub examined: usize,
}

impl Dfa {
    pub fn from_nfa(nfa: &Nfa) -> Self {
        let mut states: Vec<DfaState> = Vec::new();
        let mut index: HashMap<Vec<u32>, u32, ahash::RandomState> = HashMap::default();
        let start = nfa.closure([0]);
        index.insert(start.clone(), 0);
        states.push(DfaState::default());
        let mut worklist = vec![start];
        let mut ids = vec![0u32];

        while let (Some(set), Some(id)) = (worklist.pop(), ids.pop()) {
            let mut accepts: SmallVec<[u16; 2]> = set
                .iter()
                .filter_map(|s| nfa.states[*s as usize].accept)
                .collect();
            accepts.sort_unstable();
            accepts.dedup();

            let moves: Vec<(CharRange, u32)> = set
                .iter()
                .flat_map(|s| nfa.states[*s as usize].transitions.iter().copied())
                .collect();
            let mut transitions = Vec::new();
            for (range, targets) in split_ranges(&moves) {
                let target_set = nfa.closure(targets);
                let target = if let Some(existing) = index.get(&target_set) {
                    *existing
                } else {
                    let new_id = states.len() as u32;
                    states.push(DfaState::default());
                    index.insert(target_set.clone(), new_id);
                    worklist.push(target_set);
                    ids.push(new_id);
                    new_id
                };
                match transitions.last_mut() {
                    Some(((_, hi), last_target)) if *last_target == target && *hi + 1 == range.0 => {
                        *hi = range.1;
                    }
                    _ => transitions.push((range, target)),
                }
            }
            states[id as usize] = DfaState { transitions, accepts };
        }
        Self { states }
    }

    fn next(&self, state: u32, c: char) -> Option<u32> {
        let c = c as u32;
        let transitions = &self.states[state as usize].transitions;
        transitions
            .binary_search_by(|((lo, hi), _)| {
                if c < *lo {
                    std::cmp::Ordering::Greater
                } else if c > *hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()
            .map(|i| transitions[i].1)
    }

    pub fn accepts(&self, state: u32) -> &[u16] {
        &self.states[state as usize].accepts
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Walk from `pos` until no pattern can continue.
    pub fn scan(&self, text: &[u8], pos: usize) -> Scan {
        let mut scan = Scan {
            ends: SmallVec::new(),
            examined: pos,
        };
        let mut state = 0;
        let mut cursor = pos;
        loop {
            let Some((c, width)) = decode_char(text, cursor) else {
                scan.examined = if cursor >= text.len() { text.len() + 1 } else { cursor + 1 };
                return scan;
            };
            scan.examined = cursor + width;
            let Some(next) = self.next(state, c) else {
                return scan;
            };
            state = next;
            cursor += width;
            if !self.accepts(state).is_empty() {
                scan.ends.push((cursor, state));
            }
        }
    }

    /// Whether `text` as a whole is accepted for `terminal`.
    pub fn matches_exactly(&self, text: &str, terminal: u16) -> bool {
        let scan = self.scan(text.as_bytes(), 0);
        scan.ends
            .iter()
            .any(|(end, state)| *end == text.len() && self.accepts(*state).contains(&terminal))
    }
}

/// Split overlapping ranges into disjoint ones, each with its target states.
fn split_ranges(moves: &[(CharRange, u32)]) -> Vec<(CharRange, Vec<u32>)> {
    let mut bounds: Vec<u32> = Vec::with_capacity(moves.len() * 2);
    for ((lo, hi), _) in moves {
        bounds.push(*lo);
        bounds.push(hi.saturating_add(1));
    }
    bounds.sort_unstable();
    bounds.dedup();

    let mut result: Vec<(CharRange, Vec<u32>)> = Vec::new();
    for window in bounds.windows(2) {
        let (lo, hi) = (window[0], window[1] - 1);
        let mut targets: Vec<u32> = moves
            .iter()
            .filter(|((a, b), _)| *a <= lo && hi <= *b)
            .map(|(_, t)| *t)
            .collect();
        if targets.is_empty() {
            continue;
        }
        targets.sort_unstable();
        targets.dedup();
        result.push(((lo, hi), targets));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dfa(literals: &[(&str, u16)], regexes: &[(&str, u16)]) -> Dfa {
        let mut nfa = Nfa::new();
        for (text, id) in literals {
            nfa.add_literal(text, *id);
        }
        for (pattern, id) in regexes {
            nfa.add_regex(pattern, *id).unwrap();
        }
        Dfa::from_nfa(&nfa)
    }

    fn accepted(dfa: &Dfa, text: &str) -> Vec<(usize, Vec<u16>)> {
        dfa.scan(text.as_bytes(), 0)
            .ends
            .iter()
            .map(|(end, state)| (*end, dfa.accepts(*state).to_vec()))
            .collect()
    }

    #[test]
    fn test_literal_and_pattern_share_prefix() {
        let dfa = dfa(&[("in", 1), ("instanceof", 2)], &[("[a-z]+", 3)]);
        let ends = accepted(&dfa, "inst ");
        assert_eq!(ends[0], (1, vec![3]));
        assert_eq!(ends[1], (2, vec![1, 3]));
        assert_eq!(ends.last().unwrap(), &(4, vec![3]));
    }

    #[test]
    fn test_examined_includes_lookahead_and_eof() {
        let dfa = dfa(&[], &[("[0-9]+", 1)]);
        let scan = dfa.scan(b"12;", 0);
        assert_eq!(scan.ends.last().unwrap().0, 2);
        assert_eq!(scan.examined, 3);
        let scan = dfa.scan(b"12", 0);
        assert_eq!(scan.examined, 3);
    }

    #[test]
    fn test_bounded_repetition_and_classes() {
        let dfa = dfa(&[], &[(r"0[xX][0-9a-fA-F]{1,2}", 1), (r"\s+", 2)]);
        assert!(dfa.matches_exactly("0xfF", 1));
        assert!(!dfa.matches_exactly("0xfff", 1));
        assert!(dfa.matches_exactly(" \n\t", 2));
    }

    #[test]
    fn test_unicode_ranges() {
        let dfa = dfa(&[], &[("[α-ω]+", 1)]);
        assert!(dfa.matches_exactly("λμ", 1));
        assert!(!dfa.matches_exactly("λa", 1));
    }

    #[test]
    fn test_look_around_rejected() {
        let mut nfa = Nfa::new();
        assert!(nfa.add_regex(r"\bfoo", 1).is_err());
    }

    #[test]
    fn test_split_ranges_disjoint() {
        let parts = split_ranges(&[((0, 10), 1), ((5, 15), 2)]);
        assert_eq!(
            parts,
            vec![((0, 4), vec![1]), ((5, 10), vec![1, 2]), ((11, 15), vec![2])]
        );
    }
}
