use std::f64::consts::PI;

/// Compute the Legendre polynomial P_n(x) and its derivative using recurrence
fn legendre_and_derivative(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    let mut dp0 = 0.0;
    let mut dp1 = 1.0;

    for k in 2..=n {
        let kf = k as f64;
        let pk = ((2.0 * kf - 1.0) * x * p1 - (kf - 1.0) * p0) / kf;
        let dpk = ((2.0 * kf - 1.0) * (p1 + x * dp1) - (kf - 1.0) * dp0) / kf;

        p0 = p1;
        p1 = pk;
        dp0 = dp1;
        dp1 = dpk;
    }

    (p1, dp1)
}

/// Compute Gauss-Legendre nodes and weights on the interval (0, 1), sorted by node.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut pairs = Vec::with_capacity(n);
    let eps = 1e-14;

    for i in 0..n {
        // Chebyshev-like initial guess
        let theta = PI * (i as f64 + 0.75) / (n as f64 + 0.5);
        let mut x = theta.cos();

        for _ in 0..100 {
            let (p, dp) = legendre_and_derivative(n, x);
            let dx = -p / dp;
            x += dx;
            if dx.abs() < eps {
                break;
            }
        }

        let (_, dp) = legendre_and_derivative(n, x);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        pairs.push((0.5 * (x + 1.0), 0.5 * w));
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    pairs.into_iter().unzip()
}

///
/// Integrate `f` over `[a, b]` with an `n` point Gauss-Legendre rule, exact for
/// polynomials of degree `2n - 1`.
///
pub fn integrate_interval<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, n: usize) -> f64
{
    let (nodes, weights) = gauss_legendre(n);
    integrate_with_rule(&f, a, b, &nodes, &weights)
}

///
/// Same as [`integrate_interval`] with a precomputed rule on (0, 1).
///
pub fn integrate_with_rule<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64, nodes: &[f64], weights: &[f64]) -> f64
{
    let width = b - a;
    nodes.iter().zip(weights).map(|(&x, &w)| w * f(a + width * x)).sum::<f64>() * width
}
