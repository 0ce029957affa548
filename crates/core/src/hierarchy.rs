//! Lazy navigation of the nested-set point tree
//!
//! Every helper here touches only the rows it returns: a single node is one
//! row, and the direct children of `P` are found by jumping from child to
//! child (`P.start + 1`, then each child's `end`), never reading rows outside
//! `[P.start, P.end)`. This lets consumers expand a huge tree one level at a
//! time.

use crate::error::{Error, Result};
use crate::readout::{Readout, RowRange};
use crate::types::{Point, PointHit};

/// The point at row `index`, if any
pub fn point_at(readout: &dyn Readout, index: usize) -> Result<Option<Point>> {
    readout.iter_points(RowRange::single(index)).next().transpose()
}

/// The point hit at row `index`, if any
pub fn point_hit_at(readout: &dyn Readout, index: usize) -> Result<Option<PointHit>> {
    readout
        .iter_point_hits(RowRange::single(index))
        .next()
        .transpose()
}

/// The root of the tree (row 0)
pub fn root(readout: &dyn Readout) -> Result<Option<Point>> {
    point_at(readout, 0)
}

/// Direct children of `parent`, in stored order
pub fn children(readout: &dyn Readout, parent: &Point) -> Result<Vec<Point>> {
    let mut children = Vec::new();
    let mut next = parent.start + 1;
    while next < parent.end {
        let child = point_at(readout, next)?.ok_or_else(|| {
            Error::invalid_definition(format!(
                "point '{}' spans rows {}..{} but row {} is missing",
                parent.name, parent.start, parent.end, next
            ))
        })?;
        if child.depth != parent.depth + 1 || child.end <= child.start || child.end > parent.end
        {
            return Err(Error::invalid_definition(format!(
                "row {} is not a direct child of '{}'",
                next, parent.name
            )));
        }
        next = child.end;
        children.push(child);
    }
    Ok(children)
}

/// Check the nested-set invariants of a full point table
pub fn validate_nested_set(points: &[Point]) -> Result<()> {
    // Stack of open ancestors: (end, depth)
    let mut open: Vec<(usize, usize)> = Vec::new();
    for (index, point) in points.iter().enumerate() {
        if point.start != index {
            return Err(Error::invalid_definition(format!(
                "point '{}' at row {} has start {}",
                point.name, index, point.start
            )));
        }
        if point.end <= point.start || point.end > points.len() {
            return Err(Error::invalid_definition(format!(
                "point '{}' has invalid bounds {}..{}",
                point.name, point.start, point.end
            )));
        }
        while matches!(open.last(), Some(&(end, _)) if end <= index) {
            open.pop();
        }
        match open.last() {
            None if index != 0 => {
                return Err(Error::invalid_definition(format!(
                    "point '{}' at row {} lies outside the root",
                    point.name, index
                )));
            }
            None if point.depth != 0 => {
                return Err(Error::invalid_definition(format!(
                    "root '{}' has depth {}",
                    point.name, point.depth
                )));
            }
            Some(&(parent_end, parent_depth)) => {
                if point.depth != parent_depth + 1 {
                    return Err(Error::invalid_definition(format!(
                        "point '{}' has depth {} under a parent of depth {}",
                        point.name, point.depth, parent_depth
                    )));
                }
                if point.end > parent_end {
                    return Err(Error::invalid_definition(format!(
                        "point '{}' overruns its parent ({} > {})",
                        point.name, point.end, parent_end
                    )));
                }
            }
            None => {}
        }
        open.push((point.end, point.depth));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readout::MemoryReadout;
    use crate::types::{Definition, Record};
    use std::cell::Cell;
    use std::sync::Arc;

    fn node(start: usize, depth: usize, end: usize, name: &str) -> Point {
        Point {
            start,
            depth,
            end,
            axis_start: 0,
            axis_end: 0,
            axis_value_start: 0,
            axis_value_end: 0,
            goal_start: 0,
            goal_end: usize::from(end == start + 1),
            bucket_start: 0,
            bucket_end: 0,
            target: 0,
            target_buckets: 0,
            name: name.to_string(),
            description: String::new(),
        }
    }

    /// top { a { a1, a2 }, b, c { c1 } }
    fn tree() -> Vec<Point> {
        vec![
            node(0, 0, 7, "top"),
            node(1, 1, 4, "a"),
            node(2, 2, 3, "a1"),
            node(3, 2, 4, "a2"),
            node(4, 1, 5, "b"),
            node(5, 1, 7, "c"),
            node(6, 2, 7, "c1"),
        ]
    }

    fn readout(points: Vec<Point>) -> MemoryReadout {
        let point_hits = (0..points.len())
            .map(|index| PointHit {
                index,
                ..Default::default()
            })
            .collect();
        let definition = Definition {
            points,
            ..Default::default()
        };
        let record = Record {
            point_hits,
            ..Default::default()
        };
        MemoryReadout::new(Arc::new(definition), record).unwrap()
    }

    /// Counts how many point rows are pulled through it
    struct Counting<'a> {
        inner: &'a MemoryReadout,
        rows: Cell<usize>,
    }

    impl Readout for Counting<'_> {
        fn def_sha(&self) -> &str {
            self.inner.def_sha()
        }
        fn rec_sha(&self) -> &str {
            self.inner.rec_sha()
        }
        fn source(&self) -> &str {
            self.inner.source()
        }
        fn source_key(&self) -> &str {
            self.inner.source_key()
        }
        fn iter_points(&self, range: RowRange) -> crate::readout::Rows<'_, Point> {
            let rows: Vec<_> = self.inner.iter_points(range).collect();
            self.rows.set(self.rows.get() + rows.len());
            Box::new(rows.into_iter())
        }
        fn iter_axes(&self, range: RowRange) -> crate::readout::Rows<'_, crate::types::Axis> {
            self.inner.iter_axes(range)
        }
        fn iter_axis_values(
            &self,
            range: RowRange,
        ) -> crate::readout::Rows<'_, crate::types::AxisValue> {
            self.inner.iter_axis_values(range)
        }
        fn iter_goals(&self, range: RowRange) -> crate::readout::Rows<'_, crate::types::Goal> {
            self.inner.iter_goals(range)
        }
        fn iter_bucket_goals(
            &self,
            range: RowRange,
        ) -> crate::readout::Rows<'_, crate::types::BucketGoal> {
            self.inner.iter_bucket_goals(range)
        }
        fn iter_point_hits(&self, range: RowRange) -> crate::readout::Rows<'_, PointHit> {
            self.inner.iter_point_hits(range)
        }
        fn iter_bucket_hits(
            &self,
            range: RowRange,
        ) -> crate::readout::Rows<'_, crate::types::BucketHit> {
            self.inner.iter_bucket_hits(range)
        }
    }

    #[test]
    fn test_single_node() {
        let readout = readout(tree());
        let point = point_at(&readout, 4).unwrap().unwrap();
        assert_eq!(point.name, "b");
        assert!(point_at(&readout, 7).unwrap().is_none());
        assert_eq!(point_hit_at(&readout, 4).unwrap().unwrap().index, 4);
    }

    #[test]
    fn test_children_of_root() {
        let readout = readout(tree());
        let top = root(&readout).unwrap().unwrap();
        let names: Vec<_> = children(&readout, &top)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_children_of_leaf_is_empty() {
        let readout = readout(tree());
        let leaf = point_at(&readout, 2).unwrap().unwrap();
        assert!(children(&readout, &leaf).unwrap().is_empty());
    }

    #[test]
    fn test_children_reads_one_row_per_child() {
        let inner = readout(tree());
        let counting = Counting {
            inner: &inner,
            rows: Cell::new(0),
        };
        let top = point_at(&counting, 0).unwrap().unwrap();
        counting.rows.set(0);
        let kids = children(&counting, &top).unwrap();
        assert_eq!(kids.len(), 3);
        // a, b and c only; grandchildren are skipped
        assert_eq!(counting.rows.get(), 3);
    }

    #[test]
    fn test_validate_accepts_tree() {
        assert!(validate_nested_set(&tree()).is_ok());
        assert!(validate_nested_set(&[]).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_depth() {
        let mut points = tree();
        points[2].depth = 1;
        assert!(matches!(
            validate_nested_set(&points),
            Err(Error::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_validate_rejects_overrun() {
        let mut points = tree();
        points[3].end = 5;
        assert!(validate_nested_set(&points).is_err());
    }

    #[test]
    fn test_validate_rejects_wrong_start() {
        let mut points = tree();
        points[1].start = 2;
        assert!(validate_nested_set(&points).is_err());
    }
}
