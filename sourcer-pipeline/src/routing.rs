//! Routing of inference rows to a classifier
//!
//! A row goes to the full model only when both component-type columns are
//! known. Rows knowing neither, or only one of them, are served by the reduced
//! model, which never reads the component columns. The partial case is its
//! own branch so it stays visible in logs and in the result ordering.

use crate::encoding::{EncodedTable, OUT_OF_VOCABULARY};
use crate::error::PipelineResult;
use crate::features::{FeatureGroup, COMPONENT_COLUMNS};
use std::fmt;

/// Branch a single inference row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Both component-type columns known
    WithComponents,
    /// Neither component-type column known
    WithoutComponents,
    /// Exactly one component-type column known
    Partial,
}

impl Route {
    /// Result ordering of the branches
    pub const ORDER: [Route; 3] = [Route::WithComponents, Route::WithoutComponents, Route::Partial];

    /// Branch for a row's encoded component columns
    pub fn classify(col_a: i64, col_b: i64) -> Route {
        match (col_a != OUT_OF_VOCABULARY, col_b != OUT_OF_VOCABULARY) {
            (true, true) => Route::WithComponents,
            (false, false) => Route::WithoutComponents,
            _ => Route::Partial,
        }
    }

    /// Classifier serving this branch
    pub fn feature_group(self) -> FeatureGroup {
        match self {
            Route::WithComponents => FeatureGroup::WithComponents,
            Route::WithoutComponents | Route::Partial => FeatureGroup::WithoutComponents,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Route::WithComponents => "with_components",
            Route::WithoutComponents => "without_components",
            Route::Partial => "partial",
        };
        f.write_str(name)
    }
}

/// Row indices of an encoded inference table, per branch, in table order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingPlan {
    pub with_components: Vec<usize>,
    pub without_components: Vec<usize>,
    pub partial: Vec<usize>,
}

impl RoutingPlan {
    pub fn build(encoded: &EncodedTable) -> PipelineResult<Self> {
        let col_a = encoded.column(COMPONENT_COLUMNS[0])?;
        let col_b = encoded.column(COMPONENT_COLUMNS[1])?;

        let mut plan = RoutingPlan::default();
        for (row, (a, b)) in col_a.into_iter().zip(col_b).enumerate() {
            match Route::classify(a, b) {
                Route::WithComponents => plan.with_components.push(row),
                Route::WithoutComponents => plan.without_components.push(row),
                Route::Partial => plan.partial.push(row),
            }
        }
        Ok(plan)
    }

    pub fn rows(&self, route: Route) -> &[usize] {
        match route {
            Route::WithComponents => &self.with_components,
            Route::WithoutComponents => &self.without_components,
            Route::Partial => &self.partial,
        }
    }

    /// Non-empty branches in result order
    pub fn branches(&self) -> impl Iterator<Item = (Route, &[usize])> + '_ {
        Route::ORDER
            .into_iter()
            .map(move |route| (route, self.rows(route)))
            .filter(|(_, rows)| !rows.is_empty())
    }

    pub fn total(&self) -> usize {
        self.with_components.len() + self.without_components.len() + self.partial.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn encoded(pairs: &[(i64, i64)]) -> EncodedTable {
        EncodedTable {
            columns: vec!["colA".into(), "colB".into(), "colC".into()],
            rows: pairs.iter().map(|&(a, b)| vec![a, b, 0]).collect(),
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(Route::classify(0, 3), Route::WithComponents);
        assert_eq!(Route::classify(-1, -1), Route::WithoutComponents);
        assert_eq!(Route::classify(2, -1), Route::Partial);
        assert_eq!(Route::classify(-1, 0), Route::Partial);
    }

    #[test]
    fn test_every_row_lands_in_exactly_one_branch() {
        let table = encoded(&[(0, 1), (-1, -1), (4, -1), (-1, 2), (3, 3), (-1, -1)]);
        let plan = RoutingPlan::build(&table).unwrap();

        let a: BTreeSet<_> = plan.with_components.iter().copied().collect();
        let b: BTreeSet<_> = plan.without_components.iter().copied().collect();
        let p: BTreeSet<_> = plan.partial.iter().copied().collect();

        assert!(a.is_disjoint(&b) && a.is_disjoint(&p) && b.is_disjoint(&p));
        let union: BTreeSet<_> = a.union(&b).chain(p.iter()).copied().collect();
        assert_eq!(union, (0..table.len()).collect());
        assert_eq!(plan.total(), table.len());

        assert_eq!(plan.with_components, vec![0, 4]);
        assert_eq!(plan.without_components, vec![1, 5]);
        assert_eq!(plan.partial, vec![2, 3]);
    }

    #[test]
    fn test_partial_rows_use_reduced_model() {
        assert_eq!(Route::Partial.feature_group(), FeatureGroup::WithoutComponents);
        assert_eq!(Route::WithComponents.feature_group(), FeatureGroup::WithComponents);
    }

    #[test]
    fn test_branches_skip_empty_and_keep_order() {
        let plan = RoutingPlan::build(&encoded(&[(-1, 5), (1, 1)])).unwrap();
        let routes: Vec<_> = plan.branches().map(|(r, _)| r).collect();
        assert_eq!(routes, vec![Route::WithComponents, Route::Partial]);
    }
}
