//! Patches
//!
//! A [`Patch`] is one structural edit of a sequence. The diff engine turns
//! two successive snapshots of a list into a patch script; applying the
//! script in order to the old snapshot yields the new one.
//!
//! Indices always refer to the sequence as it is when the patch is applied,
//! i.e. after every earlier patch of the same script.

mod diff;
mod flow;

use serde::{Deserialize, Serialize};

use crate::error::PatchError;

pub use diff::{diff_by, diff_tail};
pub use flow::PatchFlow;

/// One edit of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Patch<T> {
    /// Insert `element` before the element at `index` (append at the end).
    Insert { element: T, index: usize },

    /// Insert `elements`, in order, starting at `index`.
    InsertMany { elements: Vec<T>, index: usize },

    /// Remove `count` elements starting at `start`.
    Delete { start: usize, count: usize },

    /// Take the element at `from` out and re-insert it so it ends up at `to`.
    Move { from: usize, to: usize },
}

impl<T> Patch<T> {
    /// Convert the payload. Positions are unchanged.
    pub fn map<U, F>(self, mut f: F) -> Patch<U>
    where
        F: FnMut(T) -> U,
    {
        match self {
            Patch::Insert { element, index } => Patch::Insert {
                element: f(element),
                index,
            },
            Patch::InsertMany { elements, index } => Patch::InsertMany {
                elements: elements.into_iter().map(f).collect(),
                index,
            },
            Patch::Delete { start, count } => Patch::Delete { start, count },
            Patch::Move { from, to } => Patch::Move { from, to },
        }
    }

    /// Number of elements this patch adds (negative when it removes).
    pub fn len_delta(&self) -> isize {
        match self {
            Patch::Insert { .. } => 1,
            Patch::InsertMany { elements, .. } => elements.len() as isize,
            Patch::Delete { count, .. } => -(*count as isize),
            Patch::Move { .. } => 0,
        }
    }

    /// Apply this patch to `target`.
    ///
    /// Fails without modifying `target` when the patch does not fit.
    pub fn apply_to(self, target: &mut Vec<T>) -> Result<(), PatchError> {
        let len = target.len();
        match self {
            Patch::Insert { element, index } => {
                check("insert", index, index <= len, len)?;
                target.insert(index, element);
            }
            Patch::InsertMany { elements, index } => {
                check("insert_many", index, index <= len, len)?;
                target.splice(index..index, elements);
            }
            Patch::Delete { start, count } => {
                let fits = start.checked_add(count).is_some_and(|end| end <= len);
                check("delete", start, fits, len)?;
                target.drain(start..start + count);
            }
            Patch::Move { from, to } => {
                check("move", from, from < len, len)?;
                check("move", to, to < len, len)?;
                let element = target.remove(from);
                target.insert(to, element);
            }
        }
        Ok(())
    }
}

fn check(patch: &'static str, index: usize, fits: bool, len: usize) -> Result<(), PatchError> {
    if fits {
        Ok(())
    } else {
        Err(PatchError { patch, index, len })
    }
}

/// Apply a whole script in order.
pub fn apply_all<T>(
    target: &mut Vec<T>,
    patches: impl IntoIterator<Item = Patch<T>>,
) -> Result<(), PatchError> {
    for patch in patches {
        patch.apply_to(target)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_keeps_positions() {
        let patch = Patch::InsertMany {
            elements: vec![1, 2],
            index: 3,
        };
        assert_eq!(
            patch.map(|n| n.to_string()),
            Patch::InsertMany {
                elements: vec!["1".to_string(), "2".to_string()],
                index: 3
            }
        );

        let moved: Patch<String> = Patch::<i32>::Move { from: 4, to: 0 }.map(|n| n.to_string());
        assert_eq!(moved, Patch::Move { from: 4, to: 0 });
    }

    #[test]
    fn apply_each_kind() {
        let mut list = vec!['a', 'b', 'c'];

        Patch::Insert { element: 'x', index: 3 }.apply_to(&mut list).unwrap();
        assert_eq!(list, vec!['a', 'b', 'c', 'x']);

        Patch::InsertMany {
            elements: vec!['y', 'z'],
            index: 0,
        }
        .apply_to(&mut list)
        .unwrap();
        assert_eq!(list, vec!['y', 'z', 'a', 'b', 'c', 'x']);

        Patch::Delete { start: 1, count: 2 }.apply_to(&mut list).unwrap();
        assert_eq!(list, vec!['y', 'b', 'c', 'x']);

        Patch::Move { from: 0, to: 3 }.apply_to(&mut list).unwrap();
        assert_eq!(list, vec!['b', 'c', 'x', 'y']);

        Patch::Move { from: 2, to: 0 }.apply_to(&mut list).unwrap();
        assert_eq!(list, vec!['x', 'b', 'c', 'y']);
    }

    #[test]
    fn out_of_bounds_patches_fail_cleanly() {
        let mut list = vec![1, 2];

        let err = Patch::Insert { element: 9, index: 3 }.apply_to(&mut list).unwrap_err();
        assert_eq!(err.index, 3);
        assert!(Patch::Delete { start: 1, count: 2 }.apply_to(&mut list).is_err());
        assert!(Patch::<i32>::Move { from: 0, to: 2 }.apply_to(&mut list).is_err());

        assert_eq!(list, vec![1, 2]);
    }

    #[test]
    fn overflowing_delete_is_rejected() {
        let mut list = vec![1, 2];
        let patch: Patch<i32> =
            serde_json::from_str(r#"{"op":"delete","start":18446744073709551615,"count":1}"#)
                .unwrap();

        let err = patch.apply_to(&mut list).unwrap_err();
        assert_eq!(err.patch, "delete");
        assert_eq!(err.len, 2);
        assert_eq!(list, vec![1, 2]);
    }

    #[test]
    fn serializes_with_op_tag() {
        let json = serde_json::to_value(Patch::<u8>::Delete { start: 2, count: 1 }).unwrap();
        assert_eq!(json, serde_json::json!({ "op": "delete", "start": 2, "count": 1 }));

        let back: Patch<u8> = serde_json::from_value(serde_json::json!({
            "op": "insert", "element": 7, "index": 0
        }))
        .unwrap();
        assert_eq!(back, Patch::Insert { element: 7, index: 0 });
    }

    #[test]
    fn len_delta() {
        assert_eq!(Patch::Insert { element: 1, index: 0 }.len_delta(), 1);
        assert_eq!(Patch::<u8>::Delete { start: 0, count: 3 }.len_delta(), -3);
    }
}
