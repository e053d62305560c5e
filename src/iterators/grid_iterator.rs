use crate::storage::{GridPoint, SparseGridData, MAX_LEVEL};

pub trait GridIteratorT
{
    fn point(&self) -> &GridPoint;
    fn point_index(&self, dim: usize) -> u32;
    fn point_level(&self, dim: usize) -> u8;
    fn seq(&self) -> Option<usize>;
    fn reset_to_level_zero(&mut self) -> bool;
    fn reset_to_level_one(&mut self) -> bool;
    fn reset_to_left_level_zero(&mut self, dim: usize) -> bool;
    fn reset_to_right_level_zero(&mut self, dim: usize) -> bool;
    fn reset_to_level_one_in_dim(&mut self, dim: usize) -> bool;
    fn left_child(&mut self, dim: usize) -> bool;
    fn right_child(&mut self, dim: usize) -> bool;
    fn step_left(&mut self, dim: usize) -> bool;
    fn step_right(&mut self, dim: usize) -> bool;
    fn up(&mut self, dim: usize) -> bool;
    fn is_inner_point(&self) -> bool;
    fn is_leaf(&self) -> bool;
}

///
/// Cursor over the implicit hierarchy of a grid. Moving the cursor only changes the
/// (level, index) tuple; `seq` is `None` whenever the point under the cursor is not
/// stored.
///
pub struct GridIterator<'a>
{
    pub(crate) storage: &'a SparseGridData,
    index: GridPoint,
    seq: Option<usize>,
}

impl<'a> GridIterator<'a>
{
    pub fn new(storage: &'a SparseGridData) -> Self
    {
        let point = GridPoint::level_one(storage.num_inputs());
        let seq = storage.index_of(&point);
        Self { storage, index: point, seq }
    }

    pub fn set_point(&mut self, point: GridPoint)
    {
        self.index = point;
        self.seq = self.storage.index_of(&self.index);
    }

    #[inline]
    fn lookup(&mut self) -> bool
    {
        self.seq = self.storage.index_of(&self.index);
        self.seq.is_some()
    }

    ///
    /// Returns true if the left child in `dim` of the current point is stored.
    ///
    pub fn has_left_child(&self, dim: usize) -> bool
    {
        self.index.left_child(dim).is_some_and(|c| self.storage.contains(&c))
    }

    pub fn has_right_child(&self, dim: usize) -> bool
    {
        self.index.right_child(dim).is_some_and(|c| self.storage.contains(&c))
    }
}

impl GridIteratorT for GridIterator<'_>
{
    #[inline(always)]
    fn point(&self) -> &GridPoint
    {
        &self.index
    }

    #[inline(always)]
    fn point_index(&self, dim: usize) -> u32
    {
        self.index.index[dim]
    }

    #[inline(always)]
    fn point_level(&self, dim: usize) -> u8
    {
        self.index.level[dim]
    }

    #[inline(always)]
    fn seq(&self) -> Option<usize>
    {
        self.seq
    }

    fn reset_to_level_zero(&mut self) -> bool
    {
        self.index.index.fill(0);
        self.index.level.fill(0);
        self.lookup()
    }

    fn reset_to_level_one(&mut self) -> bool
    {
        self.index.index.fill(1);
        self.index.level.fill(1);
        self.lookup()
    }

    fn reset_to_left_level_zero(&mut self, dim: usize) -> bool
    {
        self.index.set(dim, 0, 0);
        self.lookup()
    }

    fn reset_to_right_level_zero(&mut self, dim: usize) -> bool
    {
        self.index.set(dim, 0, 1);
        self.lookup()
    }

    fn reset_to_level_one_in_dim(&mut self, dim: usize) -> bool
    {
        self.index.set(dim, 1, 1);
        self.lookup()
    }

    fn left_child(&mut self, dim: usize) -> bool
    {
        let i = self.index.index[dim];
        let l = self.index.level[dim];
        // the cursor may stand on MAX_LEVEL + 1, where nothing is stored
        if l == 0 || l > MAX_LEVEL
        {
            self.seq = None;
            return false;
        }
        self.index.set(dim, l + 1, 2 * i - 1);
        self.lookup()
    }

    fn right_child(&mut self, dim: usize) -> bool
    {
        let i = self.index.index[dim];
        let l = self.index.level[dim];
        // the cursor may stand on MAX_LEVEL + 1, where nothing is stored
        if l == 0 || l > MAX_LEVEL
        {
            self.seq = None;
            return false;
        }
        self.index.set(dim, l + 1, 2 * i + 1);
        self.lookup()
    }

    fn step_left(&mut self, dim: usize) -> bool
    {
        let i = self.index.index[dim];
        if i < 2
        {
            self.seq = None;
            return false;
        }
        self.index.index[dim] = i - 2;
        self.lookup()
    }

    fn step_right(&mut self, dim: usize) -> bool
    {
        self.index.index[dim] += 2;
        self.lookup()
    }

    fn up(&mut self, dim: usize) -> bool
    {
        let i = self.index.index[dim];
        let l = self.index.level[dim];
        if l <= 1
        {
            self.seq = None;
            return false;
        }
        self.index.set(dim, l - 1, (i >> 1) | 1);
        self.lookup()
    }

    fn is_inner_point(&self) -> bool
    {
        self.index.is_inner_point()
    }

    fn is_leaf(&self) -> bool
    {
        match self.seq
        {
            Some(seq) => self.storage.is_leaf(seq),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn navigation_follows_index_arithmetic()
    {
        let mut storage = SparseGridData::new(1);
        for (l, i) in [(1, 1), (2, 1), (2, 3), (3, 5)]
        {
            storage.insert_point(GridPoint::new(&[l], &[i], false));
        }
        let mut it = GridIterator::new(&storage);
        assert_eq!(it.seq(), Some(0));
        assert!(!it.is_leaf());
        assert!(it.left_child(0));
        assert_eq!(it.seq(), Some(1));
        assert!(it.step_right(0));
        assert_eq!(it.seq(), Some(2));
        assert!(it.left_child(0));
        assert_eq!(it.point().index[0], 5);
        assert!(it.is_leaf());
        assert!(it.up(0));
        assert!(it.up(0));
        assert_eq!(it.seq(), Some(0));
        assert!(!it.up(0));
    }

    #[test]
    fn cursor_stops_below_the_deepest_level()
    {
        let mut storage = SparseGridData::new(1);
        let mut deepest = GridPoint::new(&[1], &[1], false);
        while deepest.level[0] < MAX_LEVEL
        {
            storage.insert_point(deepest.clone());
            deepest = deepest.right_child(0).unwrap();
        }
        storage.insert_point(deepest.clone());
        assert_eq!(deepest.index[0], (1_u32 << MAX_LEVEL) - 1);
        assert_eq!(deepest.right_child(0), None);
        let mut it = GridIterator::new(&storage);
        it.set_point(deepest.clone());
        assert!(it.seq().is_some());
        assert!(!it.has_left_child(0));
        assert!(!it.has_right_child(0));
        assert!(!it.right_child(0));
        assert_eq!(it.point_level(0), MAX_LEVEL + 1);
        assert_eq!(it.point_index(0), u32::MAX);
        assert!(!it.right_child(0));
        assert!(!it.left_child(0));
        assert_eq!(it.point_level(0), MAX_LEVEL + 1);
        assert!(it.up(0));
        assert_eq!(it.point(), &deepest);
    }
}
