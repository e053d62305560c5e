use std::hash::{Hash, Hasher};
use bitfield_struct::bitfield;
use indexmap::IndexSet;
use nohash_hasher::BuildNoHashHasher;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use crate::errors::SGError;

pub type FastU64Map<V> = std::collections::HashMap<u64, V, BuildNoHashHasher<u64>>;

/// Deepest level a grid point may have, so that `2^level` fits into the `u32` indices.
pub const MAX_LEVEL: u8 = 31;

#[bitfield(u8, new=false)]
#[derive(Serialize, Deserialize, PartialEq, Eq)]
pub struct GridPointFlags
{
    pub is_leaf: bool,
    pub is_inner: bool,
    #[bits(6)]
    pub _empty: u8
}

impl GridPointFlags
{
    pub fn new(level: &[u8], is_leaf: bool) -> Self
    {
        let mut r = Self::default();
        r.set_is_leaf(is_leaf);
        r.set_is_inner(!level.contains(&0));
        r
    }
    /// update `is_inner` flag...
    pub fn update_is_inner(&mut self, level: &[u8])
    {
        self.set_is_inner(!level.contains(&0));
    }
}

///
/// A single hierarchical coordinate: one (level, index) pair per dimension.
///
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct GridPoint
{
    pub level: Vec<u8>,
    pub index: Vec<u32>,
    pub(crate) flags: GridPointFlags,
}

impl Hash for GridPoint
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.level.hash(state);
        self.index.hash(state);
    }
}

impl PartialOrd for GridPoint
{
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(std::cmp::Ord::cmp(self, other))
    }
}
impl Ord for GridPoint
{
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index).then(self.level.cmp(&other.level))
    }
}

impl PartialEq for GridPoint
{
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level && self.index == other.index
    }
}
impl Eq for GridPoint{}

/// Returns true if `(la, ia)` is a strict 1D hierarchical ancestor of `(lb, ib)`.
/// Level zero (boundary) functions are ancestors of every interior function.
#[inline]
pub(crate) fn is_ancestor_1d(la: u8, ia: u32, lb: u8, ib: u32) -> bool
{
    if la >= lb
    {
        return false;
    }
    if la == 0
    {
        return true;
    }
    ia == ((ib >> (lb - la)) | 1)
}

impl GridPoint
{
    pub fn new(level: &[u8], index: &[u32], is_leaf: bool) -> Self
    {
        let flags = GridPointFlags::new(level, is_leaf);
        Self { level: level.to_vec(), index: index.to_vec(), flags }
    }

    #[inline]
    pub fn dim(&self) -> usize
    {
        self.level.len()
    }

    #[inline]
    pub fn set(&mut self, dim: usize, level: u8, index: u32)
    {
        self.level[dim] = level;
        self.index[dim] = index;
    }

    pub fn is_leaf(&self) -> bool
    {
        self.flags.is_leaf()
    }
    pub fn set_is_leaf(&mut self, is_leaf: bool)
    {
        self.flags.set_is_leaf(is_leaf);
    }
    ///
    /// This is an inner point if no levels are zero...
    ///
    pub fn is_inner_point(&self) -> bool
    {
        !self.level.contains(&0)
    }
    pub fn level_sum(&self) -> u32
    {
        self.level.iter().map(|&l| l as u32).sum()
    }
    #[inline]
    pub fn level_max(&self) -> u8
    {
        self.level.iter().copied().max().unwrap_or(0)
    }
    pub fn level_min(&self) -> u8
    {
        self.level.iter().copied().min().unwrap_or(0)
    }

    ///
    /// Left child in direction `dim`. The level zero points have the level one point as
    /// their child; points on [`MAX_LEVEL`] have none.
    ///
    pub fn left_child(&self, dim: usize) -> Option<GridPoint>
    {
        self.child(dim, false)
    }
    pub fn right_child(&self, dim: usize) -> Option<GridPoint>
    {
        self.child(dim, true)
    }
    fn child(&self, dim: usize, right: bool) -> Option<GridPoint>
    {
        let mut r = self.clone();
        match self.level[dim]
        {
            0 => r.set(dim, 1, 1),
            l if l >= MAX_LEVEL => return None,
            l =>
            {
                let i = self.index[dim].checked_mul(2)?;
                let i = if right { i.checked_add(1)? } else { i.checked_sub(1)? };
                r.set(dim, l + 1, i);
            }
        }
        Some(r)
    }
    ///
    /// returns an index with the top level in direction dim
    ///
    pub fn root(&self, dim: usize) -> GridPoint
    {
        let mut r = self.clone();
        r.set(dim, 1, 1);
        r
    }

    ///
    /// Interior parent in direction `dim`. Level one points have the two level zero
    /// points as parents, which are only meaningful on boundary grids, so `None` is
    /// returned for levels zero and one.
    ///
    pub fn parent(&self, dim: usize) -> Option<GridPoint>
    {
        if self.level[dim] <= 1
        {
            return None;
        }
        let mut r = self.clone();
        r.index[dim] = (self.index[dim] >> 1) | 1;
        r.level[dim] -= 1;
        Some(r)
    }

    #[inline]
    pub fn is_left_child(&self, dim: usize) -> bool
    {
        self.level[dim] > 1 && (self.index[dim] >> 1) % 2 == 0
    }

    pub fn left_level_zero(&self, dim: usize) -> GridPoint
    {
        let mut r = self.clone();
        r.set(dim, 0, 0);
        r
    }

    pub fn right_level_zero(&self, dim: usize) -> GridPoint
    {
        let mut r = self.clone();
        r.set(dim, 0, 1);
        r
    }

    ///
    /// True if this point is a strict hierarchical ancestor of `other` in direction `dim`.
    ///
    #[inline]
    pub fn is_hierarchical_ancestor_in_dim(&self, other: &GridPoint, dim: usize) -> bool
    {
        is_ancestor_1d(self.level[dim], self.index[dim], other.level[dim], other.index[dim])
    }

    ///
    /// True if in every direction this point equals `other` or is one of its
    /// ancestors, and the two points are not identical.
    ///
    pub fn is_hierarchical_ancestor(&self, other: &GridPoint) -> bool
    {
        if self == other
        {
            return false;
        }
        (0..self.dim()).all(|d|
            (self.level[d] == other.level[d] && self.index[d] == other.index[d]) ||
            self.is_hierarchical_ancestor_in_dim(other, d))
    }

    #[inline]
    pub fn coordinate(&self, dim: usize) -> f64
    {
        self.index[dim] as f64 / (1_u64 << self.level[dim]) as f64
    }

    pub fn unit_coordinate(&self) -> Vec<f64>
    {
        (0..self.dim()).map(|d| self.coordinate(d)).collect()
    }

    pub fn zero_index(num_inputs: usize) -> Self
    {
        Self{ level: vec![0; num_inputs], index: vec![0; num_inputs], flags: GridPointFlags(0) }
    }

    pub fn level_one(num_inputs: usize) -> Self
    {
        Self::new(&vec![1; num_inputs], &vec![1; num_inputs], true)
    }

    #[inline]
    pub fn hash_key(&self) -> u64
    {
        self.into()
    }
}

impl From<GridPoint> for u64
{
    fn from(val: GridPoint) -> Self {
        (&val).into()
    }
}
impl From<&GridPoint> for u64
{
    fn from(val: &GridPoint) -> Self {
        let hasher = &mut FxHasher::default();
        val.hash(hasher);
        hasher.finish()
    }
}

pub struct GridPointRef<'a> {
    pub(crate) index: &'a [u32],
    pub(crate) level: &'a [u8],
    pub(crate) flags: &'a GridPointFlags
}
impl GridPointRef<'_>
{
    pub fn level_sum(&self) -> u32
    {
        self.level.iter().map(|&l| l as u32).sum()
    }
    pub fn is_leaf(&self) -> bool
    {
        self.flags.is_leaf()
    }
    pub fn level(&self) -> &[u8]
    {
        self.level
    }
    pub fn index(&self) -> &[u32]
    {
        self.index
    }
}

impl std::hash::Hash for GridPointRef<'_>
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.level.hash(state);
        self.index.hash(state);
    }
}
impl From<GridPointRef<'_>> for u64
{
    fn from(val: GridPointRef<'_>) -> Self {
        let hasher = &mut FxHasher::default();
        val.hash(hasher);
        hasher.finish()
    }
}

impl From<GridPointRef<'_>> for GridPoint
{
    fn from(value: GridPointRef<'_>) -> Self {
        GridPoint { level: value.level.to_owned(), index: value.index.to_owned(), flags: *value.flags }
    }
}

///
/// Physical domain of a grid. The unit cube is mapped onto `[lower, upper]` in each
/// direction; the Dirichlet flags mark boundaries whose values are prescribed.
///
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct BoundingBox
{
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub dirichlet_left: Vec<bool>,
    pub dirichlet_right: Vec<bool>,
}

impl BoundingBox
{
    #[inline]
    pub fn new(lower: &[f64], upper: &[f64]) -> Self
    {
        Self { lower: lower.to_vec(), upper: upper.to_vec(), dirichlet_left: vec![false; lower.len()], dirichlet_right: vec![false; lower.len()] }
    }
    pub fn with_dim(num_inputs: usize) -> Self
    {
        Self::new(&vec![0.0; num_inputs], &vec![1.0; num_inputs])
    }
    pub fn set_dirichlet(&mut self, dim: usize, left: bool, right: bool)
    {
        self.dirichlet_left[dim] = left;
        self.dirichlet_right[dim] = right;
    }
    #[inline]
    pub fn dim(&self) -> usize
    {
        self.lower.len()
    }
    /// Interval width `q` in direction `dim`.
    #[inline]
    pub fn width(&self, dim: usize) -> f64
    {
        self.upper[dim] - self.lower[dim]
    }
    /// Interval offset `t` in direction `dim`.
    #[inline]
    pub fn offset(&self, dim: usize) -> f64
    {
        self.lower[dim]
    }
    #[inline]
    pub fn is_unit_interval(&self, dim: usize) -> bool
    {
        self.width(dim) == 1.0 && self.offset(dim) == 0.0
    }

    ///
    /// Volume of hypercube (width(dim1)*...*width(dim_n))
    ///
    #[inline]
    pub fn volume(&self) -> f64
    {
        (0..self.dim()).map(|d| self.width(d)).product()
    }
    #[inline]
    pub fn to_unit_coordinate(&self, point: &[f64]) -> Vec<f64>
    {
        let mut r = point.to_vec();
        self.to_unit_coordinate_in_place(&mut r);
        r
    }
    #[inline]
    pub fn to_unit_coordinate_in_place(&self, point: &mut [f64])
    {
        for (i, x) in point.iter_mut().enumerate()
        {
            *x = (*x - self.lower[i])/(self.upper[i] - self.lower[i]);
        }
    }
    #[inline]
    pub fn to_real_coordinate(&self, point: &[f64]) -> Vec<f64>
    {
        let mut r = point.to_vec();
        self.to_real_coordinate_in_place(&mut r);
        r
    }
    #[inline]
    pub fn to_real_coordinate_in_place(&self, point: &mut [f64])
    {
        for (i, x) in point.iter_mut().enumerate()
        {
            *x = self.lower[i] + (self.upper[i] - self.lower[i]) * *x;
        }
    }
    #[inline]
    pub fn contains(&self, point: &[f64]) -> bool
    {
        point.len() == self.dim() &&
            point.iter().enumerate().all(|(d, &x)| self.lower[d] <= x && x <= self.upper[d])
    }
}

///
/// Hash-indexed storage of all grid points. Points are stored densely by sequence
/// number; the map resolves a point's content hash to its sequence number.
///
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SparseGridData
{
    pub(crate) bounding_box: BoundingBox,
    pub(crate) index: Vec<u32>,
    pub(crate) level: Vec<u8>,
    pub(crate) flags: Vec<GridPointFlags>,
    pub(crate) num_inputs: usize,
    #[serde(skip)]
    pub(crate) map: FastU64Map<u32>,
    pub(crate) has_boundary: bool,
}

impl SparseGridData
{
    pub fn new(num_inputs: usize) -> Self
    {
        Self { bounding_box: BoundingBox::with_dim(num_inputs), index: Vec::new(), level: Vec::new(), flags: Vec::new(), num_inputs, map: FastU64Map::default(), has_boundary: false }
    }
    #[inline]
    pub fn num_inputs(&self) -> usize
    {
        self.num_inputs
    }
    #[inline]
    pub fn point(&self, seq: usize) -> GridPoint
    {
        let range = seq*self.num_inputs..(seq+1)*self.num_inputs;
        GridPoint { index: self.index[range.clone()].to_vec(), level: self.level[range].to_vec(), flags: self.flags[seq] }
    }
    #[inline]
    pub fn try_point(&self, seq: usize) -> Result<GridPoint, SGError>
    {
        if seq >= self.len()
        {
            return Err(SGError::InvalidIndex);
        }
        Ok(self.point(seq))
    }

    #[inline]
    pub fn is_empty(&self) -> bool
    {
        self.flags.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize
    {
        self.flags.len()
    }

    #[inline(always)]
    pub fn has_boundary(&self) -> bool
    {
        self.has_boundary
    }

    #[inline]
    pub fn index(&self, seq: usize, dim: usize) -> u32
    {
        self.index[self.num_inputs*seq + dim]
    }

    #[inline(always)]
    pub fn level(&self, seq: usize, dim: usize) -> u8
    {
        self.level[self.num_inputs*seq + dim]
    }

    #[inline]
    pub fn levels(&self, seq: usize) -> &[u8]
    {
        &self.level[seq*self.num_inputs..(seq+1)*self.num_inputs]
    }

    #[inline]
    pub fn indices(&self, seq: usize) -> &[u32]
    {
        &self.index[seq*self.num_inputs..(seq+1)*self.num_inputs]
    }

    #[inline]
    pub fn is_leaf(&self, seq: usize) -> bool
    {
        self.flags[seq].is_leaf()
    }

    #[inline]
    pub fn set_is_leaf(&mut self, seq: usize, value: bool)
    {
        self.flags[seq].set_is_leaf(value);
    }

    #[inline]
    pub fn is_inner_point(&self, seq: usize) -> bool
    {
        self.level_min(seq) > 0
    }

    #[inline]
    pub fn level_sum(&self, seq: usize) -> u32
    {
        self.levels(seq).iter().map(|&i| i as u32).sum()
    }

    #[inline]
    pub fn level_max(&self, seq: usize) -> u8
    {
        self.levels(seq).iter().copied().max().unwrap_or(0)
    }

    #[inline]
    pub fn level_min(&self, seq: usize) -> u8
    {
        self.levels(seq).iter().copied().min().unwrap_or(0)
    }

    ///
    /// Maximum level over all points and directions.
    ///
    pub fn max_level(&self) -> u8
    {
        self.level.iter().copied().max().unwrap_or(0)
    }

    ///
    /// Inserts a point and returns its sequence number. If the point already exists the
    /// existing sequence number is returned and the storage is left untouched.
    ///
    pub fn insert_point(&mut self, mut point: GridPoint) -> usize
    {
        if let Some(seq) = self.index_of(&point)
        {
            return seq;
        }
        // make sure our is_inner flag is up-to-date...
        point.flags.update_is_inner(&point.level);
        let key: u64 = (&point).into();
        let seq = self.flags.len();
        self.flags.push(point.flags);
        self.index.extend_from_slice(&point.index);
        self.level.extend_from_slice(&point.level);
        self.map.insert(key, seq as u32);
        self.refresh_leaf_flags(seq, &point);
        seq
    }

    ///
    /// Inserts a point that must not exist yet.
    ///
    pub fn try_insert_point(&mut self, point: GridPoint) -> Result<usize, SGError>
    {
        if self.contains(&point)
        {
            return Err(SGError::PointExists);
        }
        Ok(self.insert_point(point))
    }

    ///
    /// Overwrites the point stored at `seq`, used by the generators to reuse a slot.
    ///
    #[inline]
    pub fn update(&mut self, mut point: GridPoint, seq: usize) -> Result<(), SGError>
    {
        if seq >= self.len()
        {
            return Err(SGError::InvalidIndex);
        }
        let old_key: u64 = self.point(seq).hash_key();
        if self.map.get(&old_key) == Some(&(seq as u32))
        {
            self.map.remove(&old_key);
        }
        point.flags.update_is_inner(&point.level);
        let key: u64 = (&point).into();
        self.map.insert(key, seq as u32);
        self.index[seq*self.num_inputs..(seq+1)*self.num_inputs].copy_from_slice(&point.index);
        self.level[seq*self.num_inputs..(seq+1)*self.num_inputs].copy_from_slice(&point.level);
        self.flags[seq] = point.flags;
        Ok(())
    }

    ///
    /// Return the nodes in the grid...
    ///
    pub fn nodes(&self) -> NodeIterator<'_> {
        NodeIterator::new(self)
    }

    ///
    /// Return the real coordinates for each node...
    ///
    pub fn points(&self) -> PointIterator<'_>
    {
        PointIterator::new(self)
    }

    pub fn generate_map(&mut self)
    {
        let mut map = FastU64Map::default();
        for (i, node) in self.nodes().enumerate()
        {
            map.insert(node.into(), i as u32);
        }
        self.map = map;
    }
    #[inline]
    pub fn map_initialized(&self) -> bool
    {
        self.len() == self.map.len()
    }
    #[inline]
    pub fn contains(&self, point: &GridPoint) -> bool
    {
        self.map.contains_key(&point.into())
    }
    #[inline]
    pub fn index_of(&self, point: &GridPoint) -> Option<usize>
    {
        self.map.get(&point.into()).map(|&v| v as usize)
    }

    ///
    /// Removes the given sequence numbers and compacts the storage. The returned vector
    /// maps every old sequence number to its new one (`None` for removed points);
    /// coefficient vectors indexed by the old numbering must be permuted with it.
    ///
    pub fn remove(&mut self, seqs: &[usize]) -> Vec<Option<usize>>
    {
        let removed: IndexSet<usize> = seqs.iter().copied().collect();
        let points_to_keep: IndexSet<usize> = (0..self.len()).filter(|i| !removed.contains(i)).collect();
        self.retain(&points_to_keep);
        let mut mapping = vec![None; removed.len() + points_to_keep.len()];
        for (new_seq, &old_seq) in points_to_keep.iter().enumerate()
        {
            mapping[old_seq] = Some(new_seq);
        }
        mapping
    }

    ///
    /// Keeps only `points_to_keep`, in the order given by the set.
    ///
    pub fn retain(&mut self, points_to_keep: &IndexSet<usize>)
    {
        let mut indices = Vec::with_capacity(points_to_keep.len()*self.num_inputs);
        let mut levels = Vec::with_capacity(points_to_keep.len()*self.num_inputs);
        let mut flags =  Vec::with_capacity(points_to_keep.len());
        for &i in points_to_keep
        {
            indices.extend(self.indices(i));
            levels.extend(self.levels(i));
            flags.push(self.flags[i]);
        }
        self.index = indices;
        self.level = levels;
        self.flags = flags;
        self.generate_map();
        self.update_leaves();
    }

    ///
    /// True if `point` has at least one child in storage in any direction.
    ///
    pub fn has_children(&self, point: &GridPoint) -> bool
    {
        (0..self.num_inputs).any(|dim| self.has_children_in_dim(point, dim))
    }

    pub fn has_children_in_dim(&self, point: &GridPoint, dim: usize) -> bool
    {
        if point.level[dim] > 0
        {
            point.left_child(dim).is_some_and(|c| self.contains(&c)) || point.right_child(dim).is_some_and(|c| self.contains(&c))
        }
        else
        {
            // Boundary node in this dimension - check for level-1 child
            self.contains(&point.root(dim))
        }
    }

    fn parents_in_dim(&self, point: &GridPoint, dim: usize) -> Vec<GridPoint>
    {
        match point.level[dim]
        {
            0 => vec![],
            1 if self.has_boundary => vec![point.left_level_zero(dim), point.right_level_zero(dim)],
            1 => vec![],
            _ => point.parent(dim).into_iter().collect(),
        }
    }

    fn refresh_leaf_flags(&mut self, seq: usize, point: &GridPoint)
    {
        let is_leaf = !self.has_children(point);
        self.flags[seq].set_is_leaf(is_leaf);
        for dim in 0..self.num_inputs
        {
            for parent in self.parents_in_dim(point, dim)
            {
                if let Some(p) = self.index_of(&parent)
                {
                    self.flags[p].set_is_leaf(false);
                }
            }
        }
    }

    pub fn update_leaves(&mut self)
    {
        for i in 0..self.len()
        {
            let point = self.point(i);
            let is_leaf = !self.has_children(&point);
            self.flags[i].set_is_leaf(is_leaf);
        }
    }

    #[inline]
    pub fn bounding_box(&self) -> &BoundingBox
    {
        &self.bounding_box
    }
    #[inline]
    pub fn bounding_box_mut(&mut self) -> &mut BoundingBox
    {
        &mut self.bounding_box
    }

    pub fn unit_coordinate(&self, seq: usize) -> Vec<f64>
    {
        (0..self.num_inputs).map(|d| self.index(seq, d) as f64 / (1_u64 << self.level(seq, d)) as f64).collect()
    }

    pub fn real_coordinate(&self, seq: usize) -> Vec<f64>
    {
        let mut point = self.unit_coordinate(seq);
        self.bounding_box.to_real_coordinate_in_place(&mut point);
        point
    }
}

pub struct NodeIterator<'a> {
    storage: &'a SparseGridData,
    current_seq: usize,
}
impl<'a> NodeIterator<'a>
{
    pub fn new( storage: &'a SparseGridData) -> Self
    {
        Self { storage, current_seq: 0 }
    }
}

impl<'a> Iterator for NodeIterator<'a> {
    type Item = GridPointRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_seq < self.storage.len() {
            let seq = self.current_seq;
            self.current_seq += 1;
            Some(GridPointRef { index: self.storage.indices(seq), level: self.storage.levels(seq), flags: &self.storage.flags[seq] })
        } else {
            None
        }
    }
}

pub struct PointIterator<'a> {
    pub storage: &'a SparseGridData,
    current_seq: usize,
}
impl<'a> PointIterator<'a>
{
    pub fn new( storage: &'a SparseGridData) -> Self
    {
        Self { storage, current_seq: 0 }
    }
}

impl Iterator for PointIterator<'_> {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_seq < self.storage.len() {
            let point = self.storage.real_coordinate(self.current_seq);
            self.current_seq += 1;
            Some(point)
        } else {
            None
        }
    }
}
