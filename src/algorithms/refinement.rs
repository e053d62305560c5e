use serde::{Deserialize, Serialize};

use crate::{errors::SGError, storage::{GridPoint, SparseGridData, MAX_LEVEL}};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefinementMode
{
    /// Refine the selected points in every direction.
    #[default]
    Isotropic,
    /// Select (point, direction) pairs and refine only in that direction.
    Anisotropic,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementOptions
{
    pub refinement_mode: RefinementMode,
    /// Maximum level per direction, capped at [`MAX_LEVEL`]. `None` means no limit
    /// below that.
    pub level_limits: Option<Vec<u8>>,
}

impl RefinementOptions
{
    pub fn new(refinement_mode: RefinementMode) -> Self
    {
        Self { refinement_mode, ..Default::default() }
    }

    pub fn with_level_limits(mut self, level_limits: Vec<u8>) -> Self
    {
        self.level_limits = Some(level_limits);
        self
    }
}

///
/// Scores points for refinement. The driver selects the `refinements_num` best
/// refinable points whose score reaches `threshold`.
///
pub trait RefinementFunctor : Send + Sync
{
    ///
    /// Called once per refinement pass before any point is scored. Functors holding
    /// caches or accumulators rebuild them here.
    ///
    fn prepare(&mut self, _storage: &SparseGridData) -> Result<(), SGError>
    {
        Ok(())
    }

    fn score(&self, storage: &SparseGridData, seq: usize) -> f64;

    ///
    /// Score for refining `seq` in direction `dim` only. Defaults to the point score.
    ///
    fn score_per_dimension(&self, storage: &SparseGridData, seq: usize, _dim: usize) -> f64
    {
        self.score(storage, seq)
    }

    ///
    /// Worst possible score, used to seed the selection.
    ///
    fn start(&self) -> f64
    {
        0.0
    }

    fn refinements_num(&self) -> usize;

    fn threshold(&self) -> f64;
}

///
/// Keeps the `k` best entries seen so far. Empty slots hold `start`.
///
pub(crate) struct Selection<T>
{
    slots: Vec<(f64, Option<T>)>,
    better: fn(f64, f64) -> bool,
}

impl<T: Copy> Selection<T>
{
    pub(crate) fn largest(k: usize, start: f64) -> Self
    {
        Self { slots: vec![(start, None); k], better: |a, b| a > b }
    }

    pub(crate) fn smallest(k: usize, start: f64) -> Self
    {
        Self { slots: vec![(start, None); k], better: |a, b| a < b }
    }

    pub(crate) fn offer(&mut self, score: f64, item: T)
    {
        let better = self.better;
        // the slot every other slot beats
        let worst = self.slots.iter().enumerate().fold(None, |acc: Option<usize>, (i, slot)|
        {
            match acc
            {
                Some(j) if !better(self.slots[j].0, slot.0) => Some(j),
                _ => Some(i),
            }
        });
        if let Some(i) = worst
        {
            if better(score, self.slots[i].0)
            {
                self.slots[i] = (score, Some(item));
            }
        }
    }

    pub(crate) fn into_selected(self) -> Vec<(f64, T)>
    {
        self.slots.into_iter().filter_map(|(s, item)| item.map(|i| (s, i))).collect()
    }
}

///
/// Refinement driver. Creates children of the selected points together with every
/// hierarchical ancestor they need, so that the grid stays closed under `parent`.
///
#[derive(Default, Debug, Clone)]
pub struct BaseRefinement
{
    pub options: RefinementOptions,
}

impl BaseRefinement
{
    pub fn new(options: RefinementOptions) -> Self
    {
        Self { options }
    }

    fn level_limits(&self, storage: &SparseGridData) -> Result<Vec<u8>, SGError>
    {
        match self.options.level_limits.as_ref()
        {
            Some(limits) if limits.len() != storage.num_inputs() => Err(SGError::DimensionMismatch),
            Some(limits) => Ok(limits.iter().map(|&l| l.min(MAX_LEVEL)).collect()),
            None => Ok(vec![MAX_LEVEL; storage.num_inputs()]),
        }
    }

    ///
    /// True if the point at `seq` misses a child in `dim` and may still grow there.
    ///
    fn is_refinable_in_dim(storage: &SparseGridData, point: &GridPoint, dim: usize, limit: u8) -> bool
    {
        if point.level[dim] >= limit.min(MAX_LEVEL)
        {
            return false;
        }
        if point.level[dim] == 0
        {
            return !storage.contains(&point.root(dim));
        }
        point.left_child(dim).into_iter().chain(point.right_child(dim)).any(|child| !storage.contains(&child))
    }

    ///
    /// Sequence numbers of all points with at least one missing child.
    ///
    pub fn refinable_points(&self, storage: &SparseGridData) -> Result<Vec<usize>, SGError>
    {
        let limits = self.level_limits(storage)?;
        Ok((0..storage.len()).filter(|&seq|
        {
            let point = storage.point(seq);
            (0..storage.num_inputs()).any(|d| Self::is_refinable_in_dim(storage, &point, d, limits[d]))
        }).collect())
    }

    pub fn num_refinable_points(&self, storage: &SparseGridData) -> Result<usize, SGError>
    {
        Ok(self.refinable_points(storage)?.len())
    }

    ///
    /// Runs one refinement pass and returns the sequence numbers of the new points.
    /// Existing points keep their sequence numbers.
    ///
    pub fn refine(&self, storage: &mut SparseGridData, functor: &mut dyn RefinementFunctor) -> Result<Vec<usize>, SGError>
    {
        functor.prepare(storage)?;
        let limits = self.level_limits(storage)?;
        let original_len = storage.len();
        let threshold = functor.threshold();
        match self.options.refinement_mode
        {
            RefinementMode::Isotropic =>
            {
                let mut selection = Selection::largest(functor.refinements_num(), functor.start());
                for seq in self.refinable_points(storage)?
                {
                    selection.offer(functor.score(storage, seq), seq);
                }
                for (score, seq) in selection.into_selected()
                {
                    if score >= threshold
                    {
                        log::debug!("refining point {seq} with score {score}");
                        self.refine_point_with_limits(storage, seq, &limits)?;
                    }
                }
            }
            RefinementMode::Anisotropic =>
            {
                let mut selection = Selection::largest(functor.refinements_num(), functor.start());
                for seq in 0..storage.len()
                {
                    let point = storage.point(seq);
                    for dim in 0..storage.num_inputs()
                    {
                        if Self::is_refinable_in_dim(storage, &point, dim, limits[dim])
                        {
                            selection.offer(functor.score_per_dimension(storage, seq, dim), (seq, dim));
                        }
                    }
                }
                for (score, (seq, dim)) in selection.into_selected()
                {
                    if score >= threshold
                    {
                        log::debug!("refining point {seq} in direction {dim} with score {score}");
                        let point = storage.try_point(seq)?;
                        self.refine_1d(storage, &point, dim);
                    }
                }
            }
        }
        log::info!("refinement added {} points ({} total)", storage.len() - original_len, storage.len());
        Ok((original_len..storage.len()).collect())
    }

    ///
    /// Inserts all missing children of `seq` in every direction that has not reached
    /// its level limit.
    ///
    pub fn refine_point(&self, storage: &mut SparseGridData, seq: usize) -> Result<Vec<usize>, SGError>
    {
        let limits = self.level_limits(storage)?;
        let original_len = storage.len();
        self.refine_point_with_limits(storage, seq, &limits)?;
        Ok((original_len..storage.len()).collect())
    }

    fn refine_point_with_limits(&self, storage: &mut SparseGridData, seq: usize, limits: &[u8]) -> Result<(), SGError>
    {
        let point = storage.try_point(seq)?;
        for dim in 0..storage.num_inputs()
        {
            if point.level[dim] < limits[dim]
            {
                self.refine_1d(storage, &point, dim);
            }
        }
        Ok(())
    }

    ///
    /// Inserts the children of `point` in direction `dim`.
    ///
    pub fn refine_1d(&self, storage: &mut SparseGridData, point: &GridPoint, dim: usize)
    {
        if point.level[dim] >= MAX_LEVEL
        {
            return;
        }
        let children = if point.level[dim] == 0
        {
            vec![point.root(dim)]
        }
        else
        {
            point.left_child(dim).into_iter().chain(point.right_child(dim)).collect()
        };
        for child in children
        {
            if !storage.contains(&child)
            {
                self.create_point(storage, child);
            }
        }
    }

    ///
    /// Inserts `point` after making sure that all of its hierarchical ancestors exist.
    ///
    pub fn create_point(&self, storage: &mut SparseGridData, point: GridPoint)
    {
        let has_boundary = storage.has_boundary();
        for dim in 0..point.dim()
        {
            if has_boundary && point.level[dim] == 1
            {
                self.create_missing(storage, point.left_level_zero(dim));
                self.create_missing(storage, point.right_level_zero(dim));
            }
            if let Some(parent) = point.parent(dim)
            {
                self.create_missing(storage, parent);
            }
        }
        storage.insert_point(point.clone());
        if has_boundary
        {
            self.level_zero_consistency(storage, &point);
        }
    }

    fn create_missing(&self, storage: &mut SparseGridData, point: GridPoint)
    {
        if !storage.contains(&point)
        {
            self.create_point(storage, point);
        }
    }

    // both boundary points of a level zero direction must exist
    fn level_zero_consistency(&self, storage: &mut SparseGridData, point: &GridPoint)
    {
        for dim in 0..point.dim()
        {
            if point.level[dim] == 0
            {
                let mut partner = point.clone();
                partner.set(dim, 0, 1 - point.index[dim].min(1));
                self.create_missing(storage, partner);
            }
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::generators;

    struct FixedScores(Vec<f64>, usize);

    impl RefinementFunctor for FixedScores
    {
        fn score(&self, _storage: &SparseGridData, seq: usize) -> f64 {
            self.0.get(seq).copied().unwrap_or(0.0)
        }
        fn refinements_num(&self) -> usize {
            self.1
        }
        fn threshold(&self) -> f64 {
            0.0
        }
    }

    fn is_closed(storage: &SparseGridData) -> bool
    {
        (0..storage.len()).all(|seq|
        {
            let point = storage.point(seq);
            (0..storage.num_inputs()).all(|d| point.parent(d).map_or(true, |p| storage.contains(&p)))
        })
    }

    #[test]
    fn refinement_keeps_existing_sequence_numbers()
    {
        let mut storage = SparseGridData::new(2);
        generators::regular(&mut storage, 3).unwrap();
        let before: Vec<GridPoint> = (0..storage.len()).map(|s| storage.point(s)).collect();
        let leaf = (0..storage.len()).find(|&s| storage.level(s, 0) == 3).unwrap();
        let mut scores = vec![0.0; storage.len()];
        scores[leaf] = 1.0;
        let new = BaseRefinement::default().refine(&mut storage, &mut FixedScores(scores, 1)).unwrap();
        for (seq, p) in before.iter().enumerate()
        {
            assert_eq!(&storage.point(seq), p);
        }
        assert_eq!(new, (before.len()..storage.len()).collect::<Vec<_>>());
        assert!(new.len() >= 3);
        assert!(is_closed(&storage));
        assert!(!storage.is_leaf(leaf));
    }

    #[test]
    fn refinement_creates_missing_ancestors()
    {
        let mut storage = SparseGridData::new(2);
        generators::regular(&mut storage, 1).unwrap();
        let refinement = BaseRefinement::default();
        refinement.create_point(&mut storage, GridPoint::new(&[3, 2], &[5, 3], true));
        assert!(storage.contains(&GridPoint::new(&[2, 2], &[3, 3], false)));
        assert!(storage.contains(&GridPoint::new(&[1, 1], &[1, 1], false)));
        assert!(is_closed(&storage));
    }

    #[test]
    fn boundary_refinement_adds_level_zero_parents()
    {
        let mut storage = SparseGridData::new(2);
        generators::regular_with_boundaries(&mut storage, 1, 1).unwrap();
        let seq = storage.index_of(&GridPoint::new(&[1, 1], &[1, 1], false)).unwrap();
        BaseRefinement::default().refine_point(&mut storage, seq).unwrap();
        for child in [GridPoint::new(&[2, 1], &[1, 1], false), GridPoint::new(&[1, 2], &[1, 3], false)]
        {
            assert!(storage.contains(&child));
            for d in 0..2
            {
                assert!(storage.contains(&child.left_level_zero(d)));
                assert!(storage.contains(&child.right_level_zero(d)));
            }
        }
    }

    #[test]
    fn anisotropic_refinement_respects_direction_and_limits()
    {
        let mut storage = SparseGridData::new(2);
        generators::regular(&mut storage, 1).unwrap();
        let options = RefinementOptions::new(RefinementMode::Anisotropic).with_level_limits(vec![3, 1]);
        let refinement = BaseRefinement::new(options);
        let new = refinement.refine(&mut storage, &mut FixedScores(vec![1.0], 1)).unwrap();
        assert_eq!(new.len(), 2);
        assert!(new.iter().all(|&s| storage.level(s, 0) == 2 && storage.level(s, 1) == 1));
        assert_eq!(refinement.num_refinable_points(&storage).unwrap(), 2);

        let bad = BaseRefinement::new(RefinementOptions::default().with_level_limits(vec![1]));
        assert_eq!(bad.refinable_points(&storage), Err(SGError::DimensionMismatch));
    }

    #[test]
    fn refinement_stops_at_the_deepest_level()
    {
        let mut storage = SparseGridData::new(1);
        generators::regular(&mut storage, 1).unwrap();
        let refinement = BaseRefinement::new(RefinementOptions::default().with_level_limits(vec![u8::MAX]));
        let mut seq = 0;
        for _ in 0..40
        {
            let point = storage.point(seq);
            let new = refinement.refine_point(&mut storage, seq).unwrap();
            match point.right_child(0)
            {
                Some(child) =>
                {
                    assert_eq!(new.len(), 2);
                    seq = storage.index_of(&child).unwrap();
                }
                None => assert!(new.is_empty()),
            }
        }
        assert_eq!(storage.max_level(), MAX_LEVEL);
        assert_eq!(storage.len(), 1 + 2 * (MAX_LEVEL as usize - 1));
        assert_eq!(storage.index(seq, 0), (1_u32 << MAX_LEVEL) - 1);
        assert!(!refinement.refinable_points(&storage).unwrap().contains(&seq));
        let deepest = storage.point(seq);
        refinement.refine_1d(&mut storage, &deepest, 0);
        assert_eq!(storage.len(), 1 + 2 * (MAX_LEVEL as usize - 1));
    }

    #[test]
    fn selection_keeps_best_entries()
    {
        let mut selection = Selection::largest(2, 0.0);
        for (score, item) in [(0.5, 0), (2.0, 1), (1.0, 2), (0.1, 3)]
        {
            selection.offer(score, item);
        }
        let mut items: Vec<usize> = selection.into_selected().into_iter().map(|(_, i)| i).collect();
        items.sort();
        assert_eq!(items, vec![1, 2]);

        let mut selection = Selection::smallest(1, 1e6);
        selection.offer(3.0, 'a');
        selection.offer(-1.0, 'b');
        assert_eq!(selection.into_selected(), vec![(-1.0, 'b')]);
    }
}
