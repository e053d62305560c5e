use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{algorithms::{basis_evaluation::basis_product, refinement::RefinementFunctor}, basis::base::BasisType, errors::SGError, storage::SparseGridData};

///
/// Refinement by an exponentially discounted error per point,
/// `accum = accum * beta + e * (1 - beta)` with `e = Σ_rows φ(x_row) * err_row`.
/// The accumulator survives refinement passes: new points are appended (and start from
/// their first error), coarsening must be followed by [`PersistentErrorRefinement::reindex`].
///
pub struct PersistentErrorRefinement
{
    basis: BasisType,
    beta: f64,
    refinements_num: usize,
    threshold: f64,
    points: Vec<f64>,
    errors: Vec<f64>,
    accum: Vec<f64>,
}

impl PersistentErrorRefinement
{
    pub fn new(basis: BasisType, beta: f64, refinements_num: usize, threshold: f64) -> Self
    {
        Self { basis, beta, refinements_num, threshold, points: Vec::new(), errors: Vec::new(), accum: Vec::new() }
    }

    ///
    /// Sets the dataset (row-major, real coordinates) and the current residual per row.
    ///
    pub fn set_training_data(&mut self, points: Vec<f64>, errors: Vec<f64>)
    {
        self.points = points;
        self.errors = errors;
    }

    pub fn accumulator(&self) -> &[f64]
    {
        &self.accum
    }

    ///
    /// Follows a coarsening step; `mapping` is the result of
    /// [`crate::algorithms::coarsening::coarsen`].
    ///
    pub fn reindex(&mut self, mapping: &[Option<usize>])
    {
        let mut accum = vec![0.0; mapping.iter().flatten().count()];
        for (old, new) in mapping.iter().enumerate()
        {
            if let (Some(new), Some(&value)) = (new, self.accum.get(old))
            {
                accum[*new] = value;
            }
        }
        self.accum = accum;
    }

    fn current_errors(&self, storage: &SparseGridData) -> Result<Vec<f64>, SGError>
    {
        let ndim = storage.num_inputs();
        if self.errors.is_empty() || self.points.len() != self.errors.len() * ndim
        {
            return Err(SGError::MissingTrainingData);
        }
        let bbox = storage.bounding_box();
        let unit: Vec<f64> = self.points.chunks_exact(ndim).flat_map(|x| bbox.to_unit_coordinate(x)).collect();
        Ok((0..storage.len()).into_par_iter().map(|seq|
        {
            unit.chunks_exact(ndim).zip(&self.errors)
                .map(|(x, err)| basis_product(&self.basis, storage, seq, x) * err)
                .sum()
        }).collect())
    }
}

impl RefinementFunctor for PersistentErrorRefinement
{
    fn prepare(&mut self, storage: &SparseGridData) -> Result<(), SGError> {
        let errors = self.current_errors(storage)?;
        let known = self.accum.len().min(storage.len());
        self.accum.truncate(known);
        for (seq, e) in errors.into_iter().enumerate()
        {
            if seq < known
            {
                self.accum[seq] = self.accum[seq] * self.beta + e * (1.0 - self.beta);
            }
            else
            {
                self.accum.push(e);
            }
        }
        Ok(())
    }

    fn score(&self, _storage: &SparseGridData, seq: usize) -> f64 {
        self.accum.get(seq).map_or(0.0, |a| a.abs())
    }

    fn refinements_num(&self) -> usize {
        self.refinements_num
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::{algorithms::refinement::BaseRefinement, generators};

    #[test]
    fn accumulator_discounts_previous_errors()
    {
        let mut storage = SparseGridData::new(1);
        generators::regular(&mut storage, 1).unwrap();
        let mut functor = PersistentErrorRefinement::new(BasisType::Linear, 0.5, 1, 0.0);
        assert_eq!(functor.prepare(&storage), Err(SGError::MissingTrainingData));
        functor.set_training_data(vec![0.5], vec![1.0]);
        functor.prepare(&storage).unwrap();
        assert_eq!(functor.accumulator(), &[1.0]);
        functor.set_training_data(vec![0.5], vec![2.0]);
        functor.prepare(&storage).unwrap();
        assert_eq!(functor.accumulator(), &[1.5]);
    }

    #[test]
    fn accumulator_follows_grid_changes()
    {
        let mut storage = SparseGridData::new(1);
        generators::regular(&mut storage, 1).unwrap();
        let mut functor = PersistentErrorRefinement::new(BasisType::Linear, 0.5, 1, 0.0);
        functor.set_training_data(vec![0.5, 0.25], vec![1.0, 1.0]);
        let new = BaseRefinement::default().refine(&mut storage, &mut functor).unwrap();
        assert_eq!(new.len(), 2);
        assert_eq!(functor.accumulator(), &[1.5]);
        functor.prepare(&storage).unwrap();
        // the old point is discounted, the new points start from their first error
        let left = storage.index_of(&crate::storage::GridPoint::new(&[2], &[1], false)).unwrap();
        assert_eq!(functor.accumulator().len(), 3);
        assert_eq!(functor.accumulator()[0], 1.5);
        assert_eq!(functor.accumulator()[left], 1.0);
        functor.reindex(&[Some(0), None, Some(1)]);
        assert_eq!(functor.accumulator().len(), 2);
    }
}
