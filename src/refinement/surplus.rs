use crate::{algorithms::{coarsening::CoarseningFunctor, refinement::RefinementFunctor}, storage::SparseGridData};

///
/// Scores a point by the magnitude of its hierarchical surplus.
///
pub struct SurplusRefinement<'a>
{
    pub alpha: &'a [f64],
    pub refinements_num: usize,
    pub threshold: f64,
}

impl<'a> SurplusRefinement<'a>
{
    pub fn new(alpha: &'a [f64], refinements_num: usize, threshold: f64) -> Self
    {
        Self { alpha, refinements_num, threshold }
    }
}

impl RefinementFunctor for SurplusRefinement<'_>
{
    fn score(&self, _storage: &SparseGridData, seq: usize) -> f64 {
        self.alpha[seq].abs()
    }

    fn refinements_num(&self) -> usize {
        self.refinements_num
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }
}

///
/// Removes points whose surplus magnitude is small.
///
pub struct SurplusCoarsening<'a>
{
    pub alpha: &'a [f64],
    pub removements_num: usize,
    pub threshold: f64,
}

impl<'a> SurplusCoarsening<'a>
{
    pub fn new(alpha: &'a [f64], removements_num: usize, threshold: f64) -> Self
    {
        Self { alpha, removements_num, threshold }
    }
}

impl CoarseningFunctor for SurplusCoarsening<'_>
{
    fn score(&self, _storage: &SparseGridData, seq: usize) -> f64 {
        self.alpha[seq].abs()
    }

    fn start(&self) -> f64 {
        1e6
    }

    fn removements_num(&self) -> usize {
        self.removements_num
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::{algorithms::{coarsening::coarsen, refinement::BaseRefinement}, generators};

    #[test]
    fn dominant_surplus_is_refined_alone()
    {
        let mut storage = SparseGridData::new(2);
        generators::regular(&mut storage, 3).unwrap();
        let mut alpha = vec![0.1; storage.len()];
        let target = (0..storage.len()).find(|&s| storage.level(s, 0) == 2 && storage.level(s, 1) == 2).unwrap();
        alpha[target] = -5.0;
        let point = storage.point(target);
        let new = BaseRefinement::default().refine(&mut storage, &mut SurplusRefinement::new(&alpha, 1, 0.0)).unwrap();
        // the four children, whose parents all exist in a regular grid
        assert_eq!(new.len(), 4);
        for d in 0..2
        {
            assert!(storage.contains(&point.left_child(d).unwrap()));
            assert!(storage.contains(&point.right_child(d).unwrap()));
        }
    }

    #[test]
    fn small_surpluses_are_coarsened()
    {
        let mut storage = SparseGridData::new(1);
        generators::regular(&mut storage, 2).unwrap();
        let alpha: Vec<f64> = (0..storage.len()).map(|s| if storage.level(s, 0) == 2 && storage.index(s, 0) == 1 { 1e-8 } else { 1.0 }).collect();
        let mapping = coarsen(&mut storage, &SurplusCoarsening::new(&alpha, 5, 1e-6)).unwrap();
        assert_eq!(storage.len(), 2);
        assert_eq!(mapping.iter().filter(|m| m.is_none()).count(), 1);
    }
}
