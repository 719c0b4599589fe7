//! Diff Engine
//!
//! Two strategies turn a pair of list snapshots into a patch script:
//!
//! - [`diff_by`] compares elements by an extracted id. It computes a shortest
//!   edit script over the ids (Myers), then pairs each deleted id with an
//!   insertion of the same id and emits those pairs as moves, so reordered
//!   elements keep their materialized state.
//!
//! - [`diff_tail`] has no notion of identity and only reports growth or
//!   truncation at the end of the list.
//!
//! Content changes of an element whose id did not move are invisible to both;
//! they are observed through a store focused on that element.
//!
//! # How `diff_by` Works
//!
//! 1. Myers' greedy algorithm finds the furthest reaching path for every edit
//!    distance `d` and records the frontier before each round. Backtracking
//!    through the recorded frontiers yields an ordered script of keeps,
//!    deletes (old index) and inserts (new index).
//!
//! 2. Deletes and inserts carrying the same id are paired first-in,
//!    first-out. Unpaired ones stay plain deletes and inserts.
//!
//! 3. The script is replayed over a working copy of the old positions with a
//!    cursor. Everything before the cursor already matches the new list,
//!    except paired elements still waiting for their insertion point. A
//!    paired insert moves its element from wherever it currently is to the
//!    cursor; a paired delete reached before its insert just steps over the
//!    element, and one reached after it has nothing left to do.
//!
//! 4. Runs of single inserts and deletes at consecutive positions are merged
//!    into `InsertMany` and `Delete { count }`.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use super::Patch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Keep,
    Delete(usize),
    Insert(usize),
}

/// Shortest edit script between `a` and `b`.
fn shortest_edit<I: PartialEq>(a: &[I], b: &[I]) -> Vec<Edit> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    let offset = max;
    let at = |k: isize| (k + offset) as usize;

    let mut v = vec![0_isize; 2 * max as usize + 2];
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'search: for d in 0..=max {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[at(k - 1)] < v[at(k + 1)]) {
                v[at(k + 1)]
            } else {
                v[at(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[at(k)] = x;
            if x >= n && y >= m {
                break 'search;
            }
            k += 2;
        }
    }

    let mut edits = Vec::with_capacity((n + m) as usize);
    let (mut x, mut y) = (n, m);
    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let prev_k = if k == -d || (k != d && v[at(k - 1)] < v[at(k + 1)]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[at(prev_k)];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            edits.push(Edit::Keep);
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            if x == prev_x {
                edits.push(Edit::Insert((y - 1) as usize));
            } else {
                edits.push(Edit::Delete((x - 1) as usize));
            }
        }
        x = prev_x;
        y = prev_y;
    }
    edits.reverse();
    edits
}

/// Accumulates patches, merging adjacent single edits.
struct Script<T> {
    patches: Vec<Patch<T>>,
}

impl<T> Script<T> {
    fn new() -> Self {
        Self { patches: Vec::new() }
    }

    fn insert(&mut self, element: T, at: usize) {
        match self.patches.last_mut() {
            Some(Patch::InsertMany { elements, index }) if *index + elements.len() == at => {
                elements.push(element);
            }
            Some(Patch::Insert { index, .. }) if *index + 1 == at => {
                let index = *index;
                if let Some(Patch::Insert { element: first, .. }) = self.patches.pop() {
                    self.patches.push(Patch::InsertMany {
                        elements: vec![first, element],
                        index,
                    });
                }
            }
            _ => self.patches.push(Patch::Insert { element, index: at }),
        }
    }

    fn delete(&mut self, at: usize) {
        match self.patches.last_mut() {
            Some(Patch::Delete { start, count }) if *start == at => *count += 1,
            _ => self.patches.push(Patch::Delete { start: at, count: 1 }),
        }
    }

    fn relocate(&mut self, from: usize, to: usize) {
        self.patches.push(Patch::Move { from, to });
    }
}

/// Patch script turning `old` into `new`, comparing elements by `id_of`.
///
/// # Example
///
/// ```rust
/// use lattice_store::patch::{diff_by, Patch};
///
/// let old = vec!["a", "b", "c"];
/// let new = vec!["c", "a", "b"];
///
/// assert_eq!(diff_by(&old, &new, |s| *s), vec![Patch::Move { from: 2, to: 0 }]);
/// ```
pub fn diff_by<T, I, F>(old: &[T], new: &[T], id_of: F) -> Vec<Patch<T>>
where
    T: Clone,
    I: Eq + Hash,
    F: Fn(&T) -> I,
{
    let old_ids: Vec<I> = old.iter().map(&id_of).collect();
    let new_ids: Vec<I> = new.iter().map(&id_of).collect();
    let edits = shortest_edit(&old_ids, &new_ids);

    // Pair deletions with insertions of the same id.
    let mut deleted: HashMap<&I, VecDeque<usize>> = HashMap::new();
    for edit in &edits {
        if let Edit::Delete(i) = edit {
            deleted.entry(&old_ids[*i]).or_default().push_back(*i);
        }
    }
    let mut source_of: HashMap<usize, usize> = HashMap::new();
    for edit in &edits {
        if let Edit::Insert(j) = edit {
            if let Some(i) = deleted.get_mut(&new_ids[*j]).and_then(VecDeque::pop_front) {
                source_of.insert(*j, i);
            }
        }
    }
    let mut paired = vec![false; old.len()];
    for i in source_of.values() {
        paired[*i] = true;
    }

    // Replay. `work` holds the old index of every slot, `None` for inserted ones.
    let mut work: Vec<Option<usize>> = (0..old.len()).map(Some).collect();
    let mut moved = vec![false; old.len()];
    let mut cursor = 0;
    let mut script = Script::new();

    for edit in edits {
        match edit {
            Edit::Keep => cursor += 1,
            Edit::Delete(i) if paired[i] => {
                if !moved[i] {
                    cursor += 1;
                }
            }
            Edit::Delete(_) => {
                work.remove(cursor);
                script.delete(cursor);
            }
            Edit::Insert(j) => match source_of.get(&j) {
                Some(&i) => {
                    let Some(from) = work.iter().position(|slot| *slot == Some(i)) else {
                        continue;
                    };
                    work.remove(from);
                    let to = if from < cursor { cursor - 1 } else { cursor };
                    work.insert(to, Some(i));
                    moved[i] = true;
                    cursor = to + 1;
                    script.relocate(from, to);
                }
                None => {
                    work.insert(cursor, None);
                    script.insert(new[j].clone(), cursor);
                    cursor += 1;
                }
            },
        }
    }

    script.patches
}

/// Patch script for lists without identity: growth or truncation at the end.
///
/// Equal lengths produce no patch, whatever the contents.
pub fn diff_tail<T: Clone>(old: &[T], new: &[T]) -> Vec<Patch<T>> {
    if new.len() > old.len() {
        let elements = new[old.len()..].to_vec();
        vec![Patch::InsertMany {
            elements,
            index: old.len(),
        }]
    } else if new.len() < old.len() {
        vec![Patch::Delete {
            start: new.len(),
            count: old.len() - new.len(),
        }]
    } else {
        Vec::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::apply_all;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct E(u32, &'static str);

    fn roundtrip(old: &[E], new: &[E]) -> Vec<Patch<E>> {
        let patches = diff_by(old, new, |e| e.0);
        let mut replay = old.to_vec();
        apply_all(&mut replay, patches.clone()).unwrap();
        assert_eq!(replay, new, "patches {patches:?}");
        patches
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn replay_chars(old: &str, new: &str) -> Vec<Patch<char>> {
        let (old, new) = (chars(old), chars(new));
        let patches = diff_by(&old, &new, |c| *c);
        let mut replay = old.clone();
        apply_all(&mut replay, patches.clone()).unwrap();
        assert_eq!(replay, new, "patches {patches:?}");
        patches
    }

    #[test]
    fn shortest_edit_of_classic_example() {
        let edits = shortest_edit(&chars("abcabba"), &chars("cbabac"));
        let changes = edits.iter().filter(|e| !matches!(e, Edit::Keep)).count();
        assert_eq!(changes, 5);
    }

    #[test]
    fn identical_lists_produce_nothing() {
        let list = vec![E(1, "a"), E(2, "b")];
        assert!(diff_by(&list, &list, |e| e.0).is_empty());
        assert!(diff_by::<E, u32, _>(&[], &[], |e| e.0).is_empty());
    }

    #[test]
    fn insert_at_front() {
        let old = vec![E(1, "a"), E(2, "b"), E(3, "c"), E(4, "d")];
        let mut new = old.clone();
        new.insert(0, E(0, "y"));

        let patches = roundtrip(&old, &new);
        assert_eq!(
            patches,
            vec![Patch::Insert {
                element: E(0, "y"),
                index: 0
            }]
        );
    }

    #[test]
    fn from_empty_is_one_insert_many() {
        let new = vec![E(1, "a"), E(2, "b"), E(3, "c")];
        let patches = roundtrip(&[], &new);
        assert_eq!(
            patches,
            vec![Patch::InsertMany {
                elements: new.clone(),
                index: 0
            }]
        );
    }

    #[test]
    fn to_empty_is_one_delete() {
        let old = vec![E(1, "a"), E(2, "b"), E(3, "c")];
        assert_eq!(roundtrip(&old, &[]), vec![Patch::Delete { start: 0, count: 3 }]);
    }

    #[test]
    fn reorder_emits_moves_only() {
        let patches = replay_chars("abcde", "aebcd");
        assert_eq!(patches, vec![Patch::Move { from: 4, to: 1 }]);

        let patches = replay_chars("abcde", "bcdea");
        assert_eq!(patches, vec![Patch::Move { from: 0, to: 4 }]);

        let patches = replay_chars("abcd", "dcba");
        assert!(patches.iter().all(|p| matches!(p, Patch::Move { .. })));
    }

    #[test]
    fn moved_element_is_never_recreated() {
        let old = vec![E(1, "a"), E(2, "b"), E(3, "c"), E(4, "d")];
        let new = vec![E(3, "c"), E(5, "x"), E(1, "a"), E(4, "d")];

        let patches = roundtrip(&old, &new);
        for patch in &patches {
            match patch {
                Patch::Insert { element, .. } => assert_eq!(element.0, 5),
                Patch::InsertMany { elements, .. } => assert!(elements.iter().all(|e| e.0 == 5)),
                _ => {}
            }
        }
        assert!(patches.iter().any(|p| matches!(p, Patch::Move { .. })));
    }

    #[test]
    fn content_change_in_place_is_invisible() {
        let old = vec![E(1, "a"), E(2, "b")];
        let new = vec![E(1, "a"), E(2, "changed")];
        assert!(diff_by(&old, &new, |e| e.0).is_empty());
    }

    #[test]
    fn mixed_edits_round_trip() {
        let cases = [
            ("abc", "abxc"),
            ("abcdef", "fbdxa"),
            ("kitten", "sitting"),
            ("aaab", "baaa"),
            ("abcabba", "cbabac"),
            ("xyz", ""),
            ("", "xyz"),
            ("abcdefgh", "hgfedcba"),
            ("abcd", "xyabcdzz"),
        ];
        for (old, new) in cases {
            replay_chars(old, new);
        }
    }

    #[test]
    fn adjacent_inserts_and_deletes_are_merged() {
        let patches = replay_chars("ad", "abcd");
        assert_eq!(
            patches,
            vec![Patch::InsertMany {
                elements: vec!['b', 'c'],
                index: 1
            }]
        );

        let patches = replay_chars("abcd", "ad");
        assert_eq!(patches, vec![Patch::Delete { start: 1, count: 2 }]);
    }

    #[test]
    fn tail_diff_grows_and_truncates() {
        assert_eq!(
            diff_tail(&['a', 'b'], &['a', 'b', 'c']),
            vec![Patch::InsertMany {
                elements: vec!['c'],
                index: 2
            }]
        );
        assert_eq!(
            diff_tail(&['a', 'b', 'c'], &['a']),
            vec![Patch::Delete { start: 1, count: 2 }]
        );
        assert!(diff_tail(&['a', 'b'], &['a', 'b']).is_empty());
        assert!(diff_tail(&['a', 'b'], &['x', 'y']).is_empty());
    }

    fn replays(old: &[u32], new: &[u32]) -> Result<Vec<Patch<u32>>, TestCaseError> {
        let patches = diff_by(old, new, |n| *n);
        let mut replay = old.to_vec();
        apply_all(&mut replay, patches.clone()).unwrap();
        prop_assert_eq!(&replay, new, "patches {:?}", patches);
        Ok(patches)
    }

    fn distinct_ids() -> impl Strategy<Value = Vec<u32>> {
        prop::sample::subsequence((0..32).collect::<Vec<u32>>(), 0..=32).prop_shuffle()
    }

    proptest! {
        #[test]
        fn distinct_ids_round_trip(old in distinct_ids(), new in distinct_ids()) {
            replays(&old, &new)?;
        }

        #[test]
        fn repeated_ids_round_trip(
            old in prop::collection::vec(0_u32..6, 0..24),
            new in prop::collection::vec(0_u32..6, 0..24),
        ) {
            replays(&old, &new)?;
        }

        /// Relocating one element yields exactly one move.
        #[test]
        fn single_relocation_is_one_move(
            (len, from, to) in (2_usize..40).prop_flat_map(|len| (Just(len), 0..len, 0..len)),
        ) {
            prop_assume!(from != to);
            let old: Vec<u32> = (0..len as u32).collect();
            let mut new = old.clone();
            let element = new.remove(from);
            new.insert(to, element);

            let patches = replays(&old, &new)?;
            prop_assert_eq!(patches.len(), 1, "patches {:?}", patches);
            prop_assert!(matches!(patches[0], Patch::Move { .. }), "patches {:?}", patches);
        }
    }
}
