use criterion::{criterion_group, criterion_main, Criterion};
use sgcore::{basis::base::BasisType, errors::SGError, grid::Grid};

fn build_six_d_grid(basis: BasisType) -> Result<(Grid, Vec<f64>), SGError>
{
    let mut grid = Grid::new(basis, 6);
    grid.regular(5)?;
    let f = |x: &[f64]| x.iter().map(|xi| xi * xi * xi).sum::<f64>();
    let mut alpha: Vec<f64> = grid.points().map(|x| f(&x)).collect();
    grid.hierarchize(&mut alpha)?;
    Ok((grid, alpha))
}

fn six_d_evaluation(c: &mut Criterion)
{
    let (grid, alpha) = build_six_d_grid(BasisType::Linear).unwrap();
    let x: Vec<f64> = [0.3, 0.1, 0.2, 0.1, 0.4, 0.7].repeat(1000);
    c.bench_function("6d evaluate_batch", |b| b.iter(|| grid.evaluate_batch(&alpha, &x).unwrap()));
}

fn six_d_operators(c: &mut Criterion)
{
    let (grid, alpha) = build_six_d_grid(BasisType::Linear).unwrap();
    let mut result = vec![0.0; grid.len()];
    c.bench_function("6d mass_mult", |b| b.iter(|| grid.mass_mult(&alpha, &mut result).unwrap()));
    c.bench_function("6d laplace_mult", |b| b.iter(|| grid.laplace_mult(&alpha, &mut result).unwrap()));
    let mut values = alpha.clone();
    c.bench_function("6d hierarchize", |b| b.iter(|| grid.hierarchize(&mut values).unwrap()));
}

criterion_group!(benches, six_d_evaluation, six_d_operators);
criterion_main!(benches);
