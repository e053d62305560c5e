use indexmap::IndexMap;

use crate::{errors::SGError, generators, storage::{is_ancestor_1d, GridPoint, SparseGridData}};

///
/// Produces points that may be inserted to repair negative regions of a sparse grid
/// function, one level sum at a time.
///
pub trait CandidateSetAlgorithm
{
    fn next_candidates(&mut self, storage: &SparseGridData, alpha: &[f64], level_sum: u32) -> Result<Vec<GridPoint>, SGError>;
}

///
/// Supports of `a` and `b` overlap in `dim` iff the 1D functions are equal or nested.
///
fn overlap_in_dim(a: &GridPoint, b: &GridPoint, dim: usize) -> bool
{
    let (la, ia, lb, ib) = (a.level[dim], a.index[dim], b.level[dim], b.index[dim]);
    if la == lb
    {
        ia == ib
    }
    else if la < lb
    {
        is_ancestor_1d(la, ia, lb, ib)
    }
    else
    {
        is_ancestor_1d(lb, ib, la, ia)
    }
}

pub fn have_overlapping_support(a: &GridPoint, b: &GridPoint) -> bool
{
    (0..a.dim()).all(|d| overlap_in_dim(a, b, d))
}

///
/// Finest point of two overlapping points: the support of the result is the
/// intersection of both supports.
///
pub fn intersection(a: &GridPoint, b: &GridPoint) -> GridPoint
{
    let mut result = a.clone();
    for d in 0..a.dim()
    {
        if b.level[d] > a.level[d]
        {
            result.set(d, b.level[d], b.index[d]);
        }
    }
    result.set_is_leaf(true);
    result
}

///
/// Sorted intersection of two hash lists.
///
fn common_partners(a: &[u64], b: &[u64]) -> Vec<u64>
{
    let (mut i, mut j) = (0, 0);
    let mut result = Vec::new();
    while i < a.len() && j < b.len()
    {
        match a[i].cmp(&b[j])
        {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal =>
            {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    result
}

fn merge_sorted(a: &[u64], b: &[u64]) -> Vec<u64>
{
    let mut merged: Vec<u64> = a.iter().chain(b).copied().collect();
    merged.sort_unstable();
    merged.dedup();
    merged
}

///
/// Candidate search by intersecting the supports of points with negative surplus.
/// Round `k` combines the intersections of `k - 1` points with one more overlapping
/// negative point, so after `d` rounds every intersection of up to `d` mutually
/// overlapping points is known. Intersections that already exist in the grid are not
/// candidates themselves but are still extended in the following rounds. When an
/// intersection is reached from several pairs, their partner lists are merged.
///
pub struct IntersectionCandidates
{
    pub tol: f64,
    /// Number of pairwise support comparisons done so far.
    pub costs: usize,
    iteration: usize,
    negatives: IndexMap<u64, GridPoint>,
    partners: IndexMap<u64, Vec<u64>>,
    candidates: IndexMap<u64, GridPoint>,
}

impl Default for IntersectionCandidates
{
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl IntersectionCandidates
{
    pub fn new(tol: f64) -> Self
    {
        Self { tol, costs: 0, iteration: 0, negatives: IndexMap::new(), partners: IndexMap::new(), candidates: IndexMap::new() }
    }

    ///
    /// All candidates found by the search, independent of their level sum.
    ///
    pub fn candidates(&self) -> impl Iterator<Item = &GridPoint>
    {
        self.candidates.values()
    }

    fn initialize(&mut self, storage: &SparseGridData, alpha: &[f64])
    {
        self.negatives = (0..storage.len()).filter(|&seq| alpha[seq] < self.tol).map(|seq|
        {
            let point = storage.point(seq);
            (point.hash_key(), point)
        }).collect();
        self.partners = self.negatives.keys().map(|&h| (h, Vec::new())).collect();
        let points: Vec<(u64, &GridPoint)> = self.negatives.iter().map(|(&h, p)| (h, p)).collect();
        let mut pairs = 0;
        for (i, &(hi, gpi)) in points.iter().enumerate()
        {
            for &(hj, gpj) in &points[i + 1..]
            {
                self.costs += 1;
                if have_overlapping_support(gpi, gpj) && !gpi.is_hierarchical_ancestor(gpj) && !gpj.is_hierarchical_ancestor(gpi)
                {
                    if let Some(list) = self.partners.get_mut(&hi)
                    {
                        list.push(hj);
                    }
                    if let Some(list) = self.partners.get_mut(&hj)
                    {
                        list.push(hi);
                    }
                    pairs += 1;
                }
            }
        }
        for list in self.partners.values_mut()
        {
            list.sort_unstable();
        }
        log::debug!("{} negative points with {} overlapping pairs", self.negatives.len(), pairs);
    }

    fn find_intersections(&mut self, storage: &SparseGridData)
    {
        // frontier entries: the intersection point and the negative points that overlap
        // every point it was built from
        let mut frontier: IndexMap<u64, (GridPoint, Vec<u64>)> = self.negatives.iter()
            .map(|(&h, p)| (h, (p.clone(), self.partners.get(&h).cloned().unwrap_or_default())))
            .collect();
        for k in 2..=storage.num_inputs().max(2)
        {
            let mut next: IndexMap<u64, (GridPoint, Vec<u64>)> = IndexMap::new();
            let mut found = 0;
            for (gpi, partners_i) in frontier.values()
            {
                for hj in partners_i
                {
                    self.costs += 1;
                    let (Some(gpj), Some(partners_j)) = (self.negatives.get(hj), self.partners.get(hj)) else { continue };
                    let point = intersection(gpi, gpj);
                    let key = point.hash_key();
                    if !storage.contains(&point) && !self.candidates.contains_key(&key)
                    {
                        self.candidates.insert(key, point.clone());
                        found += 1;
                    }
                    let common: Vec<u64> = common_partners(partners_i, partners_j).into_iter()
                        .filter(|h| self.negatives.get(h).is_some_and(|gpk| have_overlapping_support(gpk, &point)))
                        .collect();
                    if common.is_empty()
                    {
                        continue;
                    }
                    match next.get_mut(&key)
                    {
                        Some((_, existing)) => *existing = merge_sorted(existing, &common),
                        None =>
                        {
                            next.insert(key, (point, common));
                        }
                    }
                }
            }
            log::debug!("intersections k = {k}: {found} new, {} total", self.candidates.len());
            frontier = next;
            if frontier.is_empty()
            {
                break;
            }
        }
    }
}

impl CandidateSetAlgorithm for IntersectionCandidates
{
    fn next_candidates(&mut self, storage: &SparseGridData, alpha: &[f64], level_sum: u32) -> Result<Vec<GridPoint>, SGError> {
        if alpha.len() != storage.len()
        {
            return Err(SGError::NumberOfPointsAndValuesMismatch);
        }
        if self.iteration == 0
        {
            self.costs = 0;
            self.initialize(storage, alpha);
            self.find_intersections(storage);
            log::info!("candidate search: {} candidates, {} comparisons", self.candidates.len(), self.costs);
        }
        self.iteration += 1;
        Ok(self.candidates.values().filter(|p| p.level_sum() == level_sum).cloned().collect())
    }
}

///
/// Every point of the full grid up to the maximum level of the original grid.
/// Exponential in the dimension.
///
pub struct FullGridCandidates
{
    full_grid: SparseGridData,
}

impl FullGridCandidates
{
    pub fn new(storage: &SparseGridData) -> Result<Self, SGError>
    {
        let mut full_grid = SparseGridData::new(storage.num_inputs());
        generators::full(&mut full_grid, storage.max_level().max(1) as usize)?;
        Ok(Self { full_grid })
    }
}

impl CandidateSetAlgorithm for FullGridCandidates
{
    fn next_candidates(&mut self, _storage: &SparseGridData, _alpha: &[f64], level_sum: u32) -> Result<Vec<GridPoint>, SGError> {
        Ok((0..self.full_grid.len()).filter(|&seq| self.full_grid.level_sum(seq) == level_sum).map(|seq| self.full_grid.point(seq)).collect())
    }
}
