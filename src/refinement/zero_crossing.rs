use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{algorithms::{basis_evaluation::evaluate, refinement::RefinementFunctor}, basis::base::BasisType, errors::SGError, storage::{GridPoint, SparseGridData}};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZeroCrossingOptions
{
    pub refinements_num: usize,
    pub threshold: f64,
    /// Multiply scores by `2^-|l|_1` so that coarse crossings are preferred.
    pub level_penalize: bool,
    /// Evaluate both functions once per pass in `prepare` instead of on every score.
    pub pre_compute: bool,
}

impl Default for ZeroCrossingOptions
{
    fn default() -> Self {
        Self { refinements_num: 1, threshold: 0.0, level_penalize: false, pre_compute: false }
    }
}

///
/// One sparse grid function taking part in the comparison.
///
#[derive(Clone, Copy)]
pub struct GridFunction<'a>
{
    pub basis: BasisType,
    pub storage: &'a SparseGridData,
    pub alpha: &'a [f64],
}

///
/// Refines where the difference of two functions (e.g. two class densities) changes
/// sign. For every direction and side the geometric neighbour of a point is located
/// in the hierarchy; if `f1 - f2` has different signs at the point and at the
/// neighbour, the jump of the difference is added to the score.
///
pub struct ZeroCrossingRefinement<'a>
{
    functions: [GridFunction<'a>; 2],
    options: ZeroCrossingOptions,
    cache: FxHashMap<u64, f64>,
}

fn sgn(x: f64) -> i8
{
    if x > 0.0 { 1 } else if x < 0.0 { -1 } else { 0 }
}

impl<'a> ZeroCrossingRefinement<'a>
{
    pub fn new(first: GridFunction<'a>, second: GridFunction<'a>, options: ZeroCrossingOptions) -> Result<Self, SGError>
    {
        for f in [&first, &second]
        {
            if f.alpha.len() != f.storage.len()
            {
                return Err(SGError::NumberOfPointsAndValuesMismatch);
            }
        }
        if first.storage.num_inputs() != second.storage.num_inputs()
        {
            return Err(SGError::DimensionMismatch);
        }
        Ok(Self { functions: [first, second], options, cache: FxHashMap::default() })
    }

    ///
    /// Value of `f` at `x`. Coordinates are pulled onto the domain of `f` to absorb
    /// rounding in the mapping from unit coordinates.
    ///
    fn value(f: &GridFunction, x: &[f64]) -> Result<f64, SGError>
    {
        let bb = f.storage.bounding_box();
        let x: Vec<f64> = x.iter().enumerate().map(|(d, &xd)| xd.max(bb.lower[d]).min(bb.upper[d])).collect();
        evaluate(f.basis, f.storage, f.alpha, &x)
    }

    ///
    /// `f1 - f2` at the grid coordinates of `point` in the refined grid.
    ///
    fn difference_uncached(&self, storage: &SparseGridData, point: &GridPoint) -> Result<f64, SGError>
    {
        let x = storage.bounding_box().to_real_coordinate(&point.unit_coordinate());
        Ok(Self::value(&self.functions[0], &x)? - Self::value(&self.functions[1], &x)?)
    }

    fn difference(&self, storage: &SparseGridData, point: &GridPoint) -> Result<f64, SGError>
    {
        match self.cache.get(&point.hash_key())
        {
            Some(&value) => Ok(value),
            None => self.difference_uncached(storage, point),
        }
    }

    ///
    /// Both functions must be defined on the whole domain of the refined grid. The domain
    /// is a box, so checking its two corners suffices.
    ///
    fn check_domain(&self, storage: &SparseGridData) -> Result<(), SGError>
    {
        let domain = storage.bounding_box();
        for f in &self.functions
        {
            if f.storage.num_inputs() != storage.num_inputs()
            {
                return Err(SGError::DimensionMismatch);
            }
            let bb = f.storage.bounding_box();
            if !bb.contains(&domain.lower) || !bb.contains(&domain.upper)
            {
                return Err(SGError::OutOfDomain);
            }
        }
        Ok(())
    }

    fn child(point: &GridPoint, dim: usize, left: bool) -> Option<GridPoint>
    {
        if left { point.left_child(dim) } else { point.right_child(dim) }
    }

    ///
    /// Closest point on the given side in direction `dim`: the outermost descendant of
    /// the child on that side if it exists, otherwise the first ancestor on that side.
    ///
    fn neighbour(storage: &SparseGridData, point: &GridPoint, dim: usize, left: bool) -> Option<GridPoint>
    {
        if point.level[dim] == 0
        {
            return None;
        }
        if let Some(mut down) = Self::child(point, dim, left).filter(|c| storage.contains(c))
        {
            loop
            {
                match Self::child(&down, dim, !left)
                {
                    Some(next) if storage.contains(&next) => down = next,
                    _ => return Some(down),
                }
            }
        }
        let mut up = point.clone();
        loop
        {
            let is_left = up.is_left_child(dim);
            let parent = up.parent(dim)?;
            // a right child has its left neighbour as parent and vice versa
            if is_left != left
            {
                return Some(parent);
            }
            up = parent;
        }
    }

    fn neighbours(storage: &SparseGridData, point: &GridPoint) -> Vec<GridPoint>
    {
        (0..storage.num_inputs()).flat_map(|d| [true, false].into_iter().filter_map(move |left| Self::neighbour(storage, point, d, left))).collect()
    }
}

impl RefinementFunctor for ZeroCrossingRefinement<'_>
{
    fn prepare(&mut self, storage: &SparseGridData) -> Result<(), SGError> {
        self.cache.clear();
        self.check_domain(storage)?;
        if !self.options.pre_compute
        {
            return Ok(());
        }
        let mut cache = FxHashMap::default();
        for seq in 0..storage.len()
        {
            let point = storage.point(seq);
            for p in Self::neighbours(storage, &point).into_iter().chain(std::iter::once(point))
            {
                let key = p.hash_key();
                if !cache.contains_key(&key)
                {
                    cache.insert(key, self.difference_uncached(storage, &p)?);
                }
            }
        }
        log::debug!("zero crossing cache holds {} evaluations", cache.len());
        self.cache = cache;
        Ok(())
    }

    fn score(&self, storage: &SparseGridData, seq: usize) -> f64 {
        let point = storage.point(seq);
        // prepare rejected every domain on which the evaluation could fail
        let Ok(here) = self.difference(storage, &point) else { return 0.0 };
        let mut score = 0.0;
        for neighbour in Self::neighbours(storage, &point)
        {
            let Ok(there) = self.difference(storage, &neighbour) else { continue };
            if sgn(here) != sgn(there)
            {
                score += (here - there).abs();
            }
        }
        if self.options.level_penalize
        {
            score *= 0.5_f64.powi(point.level_sum() as i32);
        }
        score
    }

    fn refinements_num(&self) -> usize {
        self.options.refinements_num
    }

    fn threshold(&self) -> f64 {
        self.options.threshold
    }
}
