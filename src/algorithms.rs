pub mod basis_evaluation;
pub mod coarsening;
pub mod hierarchisation;
pub mod l2_dot_product;
pub mod laplace;
pub mod mod_linear_mass;
pub mod quadrature;
pub mod refinement;
pub(crate) mod sweep;
pub mod up_down;
