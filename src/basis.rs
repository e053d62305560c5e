pub mod base;
pub mod bspline;
pub mod gauss_legendre;
pub mod linear;
pub mod modified_linear;
pub mod poly;
