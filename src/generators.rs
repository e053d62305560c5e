use crate::{errors::SGError, storage::{GridPoint, SparseGridData}};

///
/// All points of a 1D level-`n` grid in direction 0, every other direction at level one.
///
fn seed_first_dimension(storage: &mut SparseGridData, n: u32, with_boundary: bool)
{
    let mut point = GridPoint::level_one(storage.num_inputs());
    if with_boundary
    {
        point.set(0, 0, 0);
        storage.insert_point(point.clone());
        point.set(0, 0, 1);
        storage.insert_point(point.clone());
    }
    for l in 1..=n
    {
        for i in (1..(1_u32 << l)).step_by(2)
        {
            point.set(0, l as u8, i);
            storage.insert_point(point.clone());
        }
    }
}

fn require_empty(storage: &SparseGridData) -> Result<(), SGError>
{
    if storage.is_empty()
    {
        Ok(())
    }
    else
    {
        Err(SGError::StorageNotEmpty)
    }
}

///
/// Writes `point` into slot `g` the first time and appends it afterwards. Every point of
/// the previous pass is extended in place, so the slot is reused for its first child.
///
fn place(storage: &mut SparseGridData, point: &GridPoint, g: usize, first: &mut bool) -> Result<(), SGError>
{
    if *first
    {
        storage.update(point.clone(), g)?;
        *first = false;
    }
    else
    {
        storage.insert_point(point.clone());
    }
    Ok(())
}

///
/// Generates a regular sparse grid of level `level` without boundary points, i.e. all
/// interior points with `|l|_1 <= level + dim - 1`.
///
pub fn regular(storage: &mut SparseGridData, level: usize) -> Result<(), SGError>
{
    require_empty(storage)?;
    let dim = storage.num_inputs() as u32;
    let n = level as u32;
    seed_first_dimension(storage, n, false);
    // extend every point of the previous pass along direction d
    for d in 1..storage.num_inputs()
    {
        let ngrids = storage.len();
        for g in 0..ngrids
        {
            let mut point = storage.point(g);
            // direction d is still at its level one placeholder
            let level_sum = point.level_sum() - 1;
            let mut first = true;
            let mut l = 1;
            while l + level_sum <= n + dim - 1
            {
                for i in (1..(1_u32 << l)).step_by(2)
                {
                    point.set(d, l as u8, i);
                    place(storage, &point, g, &mut first)?;
                }
                l += 1;
            }
        }
    }
    storage.update_leaves();
    Ok(())
}

///
/// Generates a full grid of level `level` without boundary points.
///
pub fn full(storage: &mut SparseGridData, level: usize) -> Result<(), SGError>
{
    require_empty(storage)?;
    let n = level as u32;
    seed_first_dimension(storage, n, false);
    for d in 1..storage.num_inputs()
    {
        let ngrids = storage.len();
        for g in 0..ngrids
        {
            let mut point = storage.point(g);
            let mut first = true;
            for l in 1..=n
            {
                for i in (1..(1_u32 << l)).step_by(2)
                {
                    point.set(d, l as u8, i);
                    place(storage, &point, g, &mut first)?;
                }
            }
        }
    }
    storage.update_leaves();
    Ok(())
}

///
/// Generates a full grid of level `level` including the level zero boundary points.
///
pub fn full_with_boundaries(storage: &mut SparseGridData, level: usize) -> Result<(), SGError>
{
    require_empty(storage)?;
    let n = level as u32;
    storage.has_boundary = true;
    seed_first_dimension(storage, n, true);
    for d in 1..storage.num_inputs()
    {
        let ngrids = storage.len();
        for g in 0..ngrids
        {
            let mut point = storage.point(g);
            let mut first = true;
            point.set(d, 0, 0);
            place(storage, &point, g, &mut first)?;
            point.set(d, 0, 1);
            place(storage, &point, g, &mut first)?;
            for l in 1..=n
            {
                for i in (1..(1_u32 << l)).step_by(2)
                {
                    point.set(d, l as u8, i);
                    place(storage, &point, g, &mut first)?;
                }
            }
        }
    }
    storage.update_leaves();
    Ok(())
}

///
/// Generates a regular sparse grid with boundary points. Boundary functions are added
/// on a coarser level than the interior ones: a point with `z` level zero directions is
/// kept while `|l|_1 <= level + dim - z - boundary_level`, which for `boundary_level = 1`
/// gives the usual truncated boundary grid.
///
pub fn regular_with_boundaries(storage: &mut SparseGridData, level: usize, boundary_level: usize) -> Result<(), SGError>
{
    require_empty(storage)?;
    let n = level as u32;
    let boundary_level = boundary_level.max(1) as u32;
    storage.has_boundary = true;
    seed_first_dimension(storage, n, true);
    for d in 1..storage.num_inputs()
    {
        let cur_dim = d as u32 + 1;
        let ngrids = storage.len();
        for g in 0..ngrids
        {
            let mut point = storage.point(g);
            let level_sum: u32 = point.level[..d].iter().map(|&l| l as u32).sum();
            let num_zero_levels = point.level[..d].iter().filter(|&&l| l == 0).count() as u32;
            let mut first = true;
            if level_sum + boundary_level + num_zero_levels < n + cur_dim || num_zero_levels == cur_dim - 1
            {
                point.set(d, 0, 0);
                place(storage, &point, g, &mut first)?;
                point.set(d, 0, 1);
                place(storage, &point, g, &mut first)?;
            }
            let upper_bound = if num_zero_levels > 0
            {
                if n + cur_dim < boundary_level + num_zero_levels
                {
                    continue;
                }
                n + cur_dim - num_zero_levels - boundary_level
            }
            else
            {
                n + cur_dim - 1
            };
            let mut l = 1;
            while l + level_sum <= upper_bound && l <= n
            {
                for i in (1..(1_u32 << l)).step_by(2)
                {
                    point.set(d, l as u8, i);
                    place(storage, &point, g, &mut first)?;
                }
                l += 1;
            }
        }
    }
    storage.update_leaves();
    Ok(())
}
