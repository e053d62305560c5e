use crate::{algorithms::refinement::Selection, errors::SGError, storage::SparseGridData};

///
/// Scores points for removal. The `removements_num` leaves with the lowest scores not
/// exceeding `threshold` are removed.
///
pub trait CoarseningFunctor : Send + Sync
{
    fn score(&self, storage: &SparseGridData, seq: usize) -> f64;

    ///
    /// Worst possible score for coarsening, used to seed the selection.
    ///
    fn start(&self) -> f64;

    fn removements_num(&self) -> usize;

    fn threshold(&self) -> f64;
}

///
/// Removes the selected leaves and compacts the storage. Boundary points are never
/// removed. Returns the mapping from old to new sequence numbers (see
/// [`SparseGridData::remove`]).
///
pub fn coarsen(storage: &mut SparseGridData, functor: &dyn CoarseningFunctor) -> Result<Vec<Option<usize>>, SGError>
{
    let threshold = functor.threshold();
    let mut selection = Selection::smallest(functor.removements_num(), functor.start());
    for seq in 0..storage.len()
    {
        // the last point is kept so the grid never becomes empty
        if !storage.is_leaf(seq) || !storage.is_inner_point(seq) || storage.len() == 1
        {
            continue;
        }
        let score = functor.score(storage, seq);
        if score <= threshold
        {
            selection.offer(score, seq);
        }
    }
    let mut removed: Vec<usize> = selection.into_selected().into_iter().map(|(_, seq)| seq).collect();
    removed.sort_unstable();
    log::debug!("coarsening removes points {removed:?}");
    let mapping = storage.remove(&removed);
    log::info!("coarsening removed {} points ({} left)", removed.len(), storage.len());
    Ok(mapping)
}

///
/// Compacts a vector indexed by the old sequence numbers according to `mapping`.
///
pub fn apply_mapping(values: &mut Vec<f64>, mapping: &[Option<usize>]) -> Result<(), SGError>
{
    if values.len() != mapping.len()
    {
        return Err(SGError::NumberOfPointsAndValuesMismatch);
    }
    let new_len = mapping.iter().flatten().count();
    let mut compacted = vec![0.0; new_len];
    for (old, new) in mapping.iter().enumerate()
    {
        if let Some(new) = new
        {
            compacted[*new] = values[old];
        }
    }
    *values = compacted;
    Ok(())
}
