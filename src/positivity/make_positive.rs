use serde::{Deserialize, Serialize};

use crate::{algorithms::{basis_evaluation::evaluate_unit, refinement::BaseRefinement}, basis::base::BasisType, errors::SGError, storage::SparseGridData};

use super::candidate_set::{CandidateSetAlgorithm, FullGridCandidates, IntersectionCandidates};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateSearch
{
    /// Intersections of overlapping points with negative surplus.
    #[default]
    Intersections,
    /// Every point of the full grid; exponential in the dimension.
    FullGrid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MakePositiveOptions
{
    pub candidate_search: CandidateSearch,
    /// Surpluses and function values below this are treated as negative.
    pub tol: f64,
}

///
/// Inserts grid points where the sparse grid function is negative and sets their
/// surplus so that the function vanishes there. Candidates are processed by increasing
/// level sum; all candidates of one level sum are evaluated before any is inserted.
/// Missing ancestors of an inserted point get a zero surplus. Returns the sequence
/// numbers of all new points; `alpha` is extended accordingly.
///
/// The two searches do not propose the same points. The intersection search only
/// offers the finest common points of two or more overlapping negative points of the
/// input grid; per level sum these are exactly the full grid points outside the grid
/// that such a meet produces. The full grid search also finds negative nodes that lie
/// under a single negative point and therefore may insert more points.
///
pub fn make_positive(basis: BasisType, storage: &mut SparseGridData, alpha: &mut Vec<f64>, options: &MakePositiveOptions) -> Result<Vec<usize>, SGError>
{
    let mut search: Box<dyn CandidateSetAlgorithm> = match options.candidate_search
    {
        CandidateSearch::Intersections => Box::new(IntersectionCandidates::new(options.tol)),
        CandidateSearch::FullGrid => Box::new(FullGridCandidates::new(storage)?),
    };
    make_positive_with(basis, storage, alpha, search.as_mut(), options.tol)
}

///
/// [`make_positive`] driven by a caller supplied candidate search.
///
pub fn make_positive_with(basis: BasisType, storage: &mut SparseGridData, alpha: &mut Vec<f64>, search: &mut dyn CandidateSetAlgorithm,
    tol: f64) -> Result<Vec<usize>, SGError>
{
    if alpha.len() != storage.len()
    {
        return Err(SGError::NumberOfPointsAndValuesMismatch);
    }
    if matches!(basis, BasisType::Bspline { .. })
    {
        return Err(SGError::UnsupportedOperation);
    }
    let dim = storage.num_inputs() as u32;
    let max_level = storage.max_level().max(1) as u32;
    let original_len = storage.len();
    let refinement = BaseRefinement::default();
    for level_sum in dim..=dim * max_level
    {
        let candidates = search.next_candidates(storage, alpha, level_sum)?;
        let negative: Vec<_> = candidates.into_iter().filter(|p| !storage.contains(p)).filter_map(|p|
        {
            let value = evaluate_unit(basis, storage, alpha, &p.unit_coordinate());
            (value < tol).then_some((p, value))
        }).collect();
        for (point, value) in negative
        {
            refinement.create_point(storage, point.clone());
            alpha.resize(storage.len(), 0.0);
            if let Some(seq) = storage.index_of(&point)
            {
                alpha[seq] = -value;
            }
        }
        log::debug!("level sum {level_sum}: {} points in the grid", storage.len());
    }
    log::info!("make positive added {} points", storage.len() - original_len);
    Ok((original_len..storage.len()).collect())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::{generators, positivity::candidate_set::tests::{is_meet_of_negatives, negatives, small_grids}, storage::GridPoint};
    use rustc_hash::FxHashMap;

    ///
    /// Full grid search restricted to the points where negative points of the input
    /// grid meet.
    ///
    struct MeetsOfNegatives
    {
        full: FullGridCandidates,
        negatives: Option<Vec<GridPoint>>,
        original: SparseGridData,
    }

    impl CandidateSetAlgorithm for MeetsOfNegatives
    {
        fn next_candidates(&mut self, storage: &SparseGridData, alpha: &[f64], level_sum: u32) -> Result<Vec<GridPoint>, SGError> {
            let negatives: &[GridPoint] = self.negatives.get_or_insert_with(|| negatives(storage, alpha));
            Ok(self.full.next_candidates(storage, alpha, level_sum)?.into_iter()
                .filter(|p| !self.original.contains(p) && is_meet_of_negatives(negatives, p))
                .collect())
        }
    }

    fn surpluses(storage: &SparseGridData, alpha: &[f64]) -> FxHashMap<GridPoint, f64>
    {
        (0..storage.len()).map(|s| (storage.point(s), alpha[s])).collect()
    }

    fn negative_corner() -> (SparseGridData, Vec<f64>)
    {
        let mut storage = SparseGridData::new(2);
        generators::regular(&mut storage, 2).unwrap();
        let alpha = (0..storage.len()).map(|s|
        {
            match (storage.levels(s), storage.indices(s))
            {
                ([1, 1], _) => 1.0,
                ([2, 1], [1, 1]) | ([1, 2], [1, 1]) => -2.0,
                _ => 0.0,
            }
        }).collect();
        (storage, alpha)
    }

    #[test]
    fn intersection_of_negative_points_is_inserted()
    {
        let _ = env_logger::builder().is_test(true).try_init();
        let (mut storage, mut alpha) = negative_corner();
        let x = [0.25, 0.25];
        assert_eq!(evaluate_unit(BasisType::Linear, &storage, &alpha, &x), -1.75);
        let new = make_positive(BasisType::Linear, &mut storage, &mut alpha, &MakePositiveOptions::default()).unwrap();
        assert_eq!(new, vec![5]);
        assert_eq!(storage.point(5), GridPoint::new(&[2, 2], &[1, 1], true));
        assert_eq!(alpha.len(), storage.len());
        assert!(evaluate_unit(BasisType::Linear, &storage, &alpha, &x).abs() < 1e-12);
    }

    #[test]
    fn full_grid_search_finds_every_negative_node()
    {
        let (mut storage, mut alpha) = negative_corner();
        let options = MakePositiveOptions { candidate_search: CandidateSearch::FullGrid, ..Default::default() };
        let new = make_positive(BasisType::Linear, &mut storage, &mut alpha, &options).unwrap();
        // (0.25, 0.25), (0.25, 0.75) and (0.75, 0.25); (0.75, 0.75) is positive
        assert_eq!(new.len(), 3);
        for seq in new
        {
            let x = storage.unit_coordinate(seq);
            assert!(evaluate_unit(BasisType::Linear, &storage, &alpha, &x) >= -1e-12);
        }
    }

    #[test]
    fn intersection_search_matches_the_filtered_full_grid()
    {
        for (n, (storage, alpha)) in small_grids().into_iter().enumerate()
        {
            let (mut smart, mut smart_alpha) = (storage.clone(), alpha.clone());
            let new = make_positive(BasisType::Linear, &mut smart, &mut smart_alpha, &MakePositiveOptions::default()).unwrap();

            let mut filtered = MeetsOfNegatives { full: FullGridCandidates::new(&storage).unwrap(), negatives: None, original: storage.clone() };
            let (mut full, mut full_alpha) = (storage.clone(), alpha.clone());
            let full_new = make_positive_with(BasisType::Linear, &mut full, &mut full_alpha, &mut filtered, 0.0).unwrap();

            assert_eq!(new.len(), full_new.len(), "grid {n}");
            let expected = surpluses(&full, &full_alpha);
            for (point, a) in surpluses(&smart, &smart_alpha)
            {
                assert_eq!(expected.get(&point), Some(&a), "grid {n}");
            }
            // inserted candidates carry a positive surplus, their missing ancestors zero
            for seq in new.into_iter().filter(|&s| smart_alpha[s] != 0.0)
            {
                let value = evaluate_unit(BasisType::Linear, &smart, &smart_alpha, &smart.unit_coordinate(seq));
                assert!(value.abs() < 1e-12, "grid {n}");
            }
        }
    }

    #[test]
    fn full_grid_search_also_covers_single_negative_points()
    {
        let (storage, alpha) = negative_corner();
        let (mut smart, mut smart_alpha) = (storage.clone(), alpha.clone());
        make_positive(BasisType::Linear, &mut smart, &mut smart_alpha, &MakePositiveOptions::default()).unwrap();
        let (mut full, mut full_alpha) = (storage, alpha);
        let options = MakePositiveOptions { candidate_search: CandidateSearch::FullGrid, ..Default::default() };
        make_positive(BasisType::Linear, &mut full, &mut full_alpha, &options).unwrap();
        // (0.25, 0.75) lies under (2,1;1,1) alone
        let lone = GridPoint::new(&[2, 2], &[1, 3], false);
        assert!(full.contains(&lone));
        assert!(!smart.contains(&lone));
        for seq in 0..smart.len()
        {
            assert!(full.contains(&smart.point(seq)));
        }
    }

    #[test]
    fn bsplines_are_rejected()
    {
        let (mut storage, mut alpha) = negative_corner();
        assert_eq!(make_positive(BasisType::Bspline { degree: 3 }, &mut storage, &mut alpha, &MakePositiveOptions::default()),
            Err(SGError::UnsupportedOperation));
    }
}
