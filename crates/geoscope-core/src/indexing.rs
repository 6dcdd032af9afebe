//! Element orderings declared by the caller.
//!
//! A structure stores its elements in an internal order. Callers may declare
//! that their per-element data arrays follow a different order by supplying a
//! permutation: entry `i` is the index in the caller's array holding the value
//! for internal element `i`. The expected length of data arrays then follows
//! from the permutation rather than from the raw element count.

use std::rc::Rc;

use crate::error::{GeoscopeError, Result};
use crate::types::ElementKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    element: ElementKind,
    indices: Rc<[usize]>,
    data_size: usize,
}

impl Permutation {
    /// Validates `indices` against a structure with `n_elements` elements.
    ///
    /// `expected_size` is the length of caller data arrays; when omitted it is
    /// one more than the largest index.
    pub fn new(
        element: ElementKind,
        indices: Vec<usize>,
        n_elements: usize,
        expected_size: Option<usize>,
    ) -> Result<Self> {
        if indices.len() != n_elements {
            return Err(GeoscopeError::InvalidPermutation {
                element,
                reason: format!(
                    "has {} entries for {n_elements} elements",
                    indices.len()
                ),
            });
        }
        let max = indices.iter().copied().max();
        let data_size = match (expected_size, max) {
            (Some(size), Some(max)) if max >= size => {
                return Err(GeoscopeError::InvalidPermutation {
                    element,
                    reason: format!("index {max} does not fit expected size {size}"),
                });
            }
            (Some(size), _) => size,
            (None, Some(max)) => max + 1,
            (None, None) => 0,
        };
        Ok(Self {
            element,
            indices: indices.into(),
            data_size,
        })
    }

    pub fn element(&self) -> ElementKind {
        self.element
    }

    /// Length caller data arrays must have.
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Caller array index for internal element `i`.
    pub fn get(&self, i: usize) -> usize {
        self.indices[i]
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Whether this is the default ordering over the same number of elements.
    pub fn is_identity(&self) -> bool {
        self.data_size == self.indices.len() && self.indices.iter().enumerate().all(|(i, &p)| i == p)
    }

    /// Reorders caller data into internal element order.
    pub fn gather<T: Copy>(&self, data: &[T]) -> Vec<T> {
        self.indices.iter().map(|&i| data[i]).collect()
    }
}

/// Expected caller data length for an element kind under an optional permutation.
pub fn expected_size(n_elements: usize, permutation: Option<&Permutation>) -> usize {
    permutation.map_or(n_elements, Permutation::data_size)
}

/// Fails with a size mismatch unless `actual == expected`.
pub fn check_size(name: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(GeoscopeError::SizeMismatch {
            name: name.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Test the implied data size of a permutation.
    #[test]
    fn test_data_size_defaults_to_max_plus_one() {
        let perm = Permutation::new(ElementKind::Edge, vec![4, 0, 2], 3, None).unwrap();
        assert_eq!(perm.data_size(), 5);
        assert_eq!(expected_size(3, Some(&perm)), 5);
        assert_eq!(expected_size(3, None), 3);
        assert_eq!(perm.gather(&[10, 11, 12, 13, 14]), vec![14, 10, 12]);
    }

    /// Test validation failures.
    #[test]
    fn test_invalid_permutations() {
        assert!(matches!(
            Permutation::new(ElementKind::Face, vec![0, 1], 3, None),
            Err(GeoscopeError::InvalidPermutation { .. })
        ));
        assert!(matches!(
            Permutation::new(ElementKind::Face, vec![0, 5], 2, Some(3)),
            Err(GeoscopeError::InvalidPermutation { .. })
        ));
    }

    /// Test identity detection.
    #[test]
    fn test_identity() {
        assert!(Permutation::new(ElementKind::Vertex, vec![0, 1, 2], 3, None)
            .unwrap()
            .is_identity());
        assert!(!Permutation::new(ElementKind::Vertex, vec![0, 1, 2], 3, Some(4))
            .unwrap()
            .is_identity());
        assert!(!Permutation::new(ElementKind::Vertex, vec![1, 0], 2, None)
            .unwrap()
            .is_identity());
    }

    proptest! {
        /// Test that exactly the implied size passes the size check.
        #[test]
        fn test_only_expected_size_accepted(
            indices in prop::collection::vec(0usize..50, 1..20),
            actual in 0usize..60,
        ) {
            let n = indices.len();
            let perm = Permutation::new(ElementKind::Halfedge, indices, n, None).unwrap();
            let expected = expected_size(n, Some(&perm));
            prop_assert_eq!(check_size("data", expected, actual).is_ok(), actual == expected);
        }
    }
}
