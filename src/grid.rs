use serde::{Deserialize, Serialize};

use crate::algorithms::{basis_evaluation, coarsening::{self, CoarseningFunctor}, hierarchisation, l2_dot_product::OperationLTwoDotProduct, laplace::OperationLaplace, mod_linear_mass::OperationModLinearMass, quadrature, refinement::{BaseRefinement, RefinementFunctor, RefinementOptions}};
use crate::basis::base::BasisType;
use crate::errors::SGError;
use crate::generators;
use crate::positivity::make_positive::{make_positive, MakePositiveOptions};
use crate::serialization::{self, SerializationFormat};
use crate::storage::{BoundingBox, GridPoint, PointIterator, SparseGridData};

///
/// A sparse grid: the point storage together with the basis its coefficients refer to.
/// Coefficient vectors are owned by the caller and indexed by sequence number.
///
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid
{
    basis: BasisType,
    storage: SparseGridData,
}

impl Grid
{
    pub fn new(basis: BasisType, num_inputs: usize) -> Self
    {
        Self { basis, storage: SparseGridData::new(num_inputs) }
    }

    pub fn basis(&self) -> BasisType
    {
        self.basis
    }

    pub fn storage(&self) -> &SparseGridData
    {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut SparseGridData
    {
        &mut self.storage
    }

    pub fn num_inputs(&self) -> usize
    {
        self.storage.num_inputs()
    }

    pub fn len(&self) -> usize
    {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.storage.is_empty()
    }

    /// Real coordinates of every point in sequence order.
    pub fn points(&self) -> PointIterator<'_>
    {
        self.storage.points()
    }

    pub fn point(&self, seq: usize) -> Result<GridPoint, SGError>
    {
        self.storage.try_point(seq)
    }

    pub fn bounding_box(&self) -> &BoundingBox
    {
        self.storage.bounding_box()
    }

    pub fn bounding_box_mut(&mut self) -> &mut BoundingBox
    {
        self.storage.bounding_box_mut()
    }

    fn require_boundary_basis(&self) -> Result<(), SGError>
    {
        if self.basis.has_boundary() { Ok(()) } else { Err(SGError::UnsupportedOperation) }
    }

    fn require_interior_basis(&self) -> Result<(), SGError>
    {
        if self.basis.has_boundary() { Err(SGError::UnsupportedOperation) } else { Ok(()) }
    }

    /// Regular sparse grid of the given level without boundary points.
    pub fn regular(&mut self, level: usize) -> Result<(), SGError>
    {
        self.require_interior_basis()?;
        generators::regular(&mut self.storage, level)
    }

    pub fn full(&mut self, level: usize) -> Result<(), SGError>
    {
        self.require_interior_basis()?;
        generators::full(&mut self.storage, level)
    }

    pub fn full_with_boundaries(&mut self, level: usize) -> Result<(), SGError>
    {
        self.require_boundary_basis()?;
        generators::full_with_boundaries(&mut self.storage, level)
    }

    pub fn regular_with_boundaries(&mut self, level: usize, boundary_level: usize) -> Result<(), SGError>
    {
        self.require_boundary_basis()?;
        generators::regular_with_boundaries(&mut self.storage, level, boundary_level)
    }

    ///
    /// Inserts every missing child of `seq`. Returns the new sequence numbers.
    ///
    pub fn refine_point(&mut self, seq: usize) -> Result<Vec<usize>, SGError>
    {
        BaseRefinement::default().refine_point(&mut self.storage, seq)
    }

    ///
    /// One refinement pass driven by `functor`. Existing points keep their sequence
    /// numbers, so coefficient vectors only need to be extended.
    ///
    pub fn refine(&mut self, functor: &mut dyn RefinementFunctor, options: &RefinementOptions) -> Result<Vec<usize>, SGError>
    {
        BaseRefinement::new(options.clone()).refine(&mut self.storage, functor)
    }

    ///
    /// Removes the leaves selected by `functor` and compacts every vector in `alphas`.
    ///
    pub fn coarsen(&mut self, functor: &dyn CoarseningFunctor, alphas: &mut [&mut Vec<f64>]) -> Result<Vec<Option<usize>>, SGError>
    {
        if alphas.iter().any(|alpha| alpha.len() != self.storage.len())
        {
            return Err(SGError::NumberOfPointsAndValuesMismatch);
        }
        let mapping = coarsening::coarsen(&mut self.storage, functor)?;
        for alpha in alphas.iter_mut()
        {
            coarsening::apply_mapping(alpha, &mapping)?;
        }
        Ok(mapping)
    }

    pub fn evaluate(&self, alpha: &[f64], x: &[f64]) -> Result<f64, SGError>
    {
        basis_evaluation::evaluate(self.basis, &self.storage, alpha, x)
    }

    pub fn evaluate_batch(&self, alpha: &[f64], points: &[f64]) -> Result<Vec<f64>, SGError>
    {
        basis_evaluation::evaluate_batch(self.basis, &self.storage, alpha, points)
    }

    /// Nodal values to hierarchical surpluses, in place.
    pub fn hierarchize(&self, values: &mut [f64]) -> Result<(), SGError>
    {
        if values.len() != self.storage.len()
        {
            return Err(SGError::NumberOfPointsAndValuesMismatch);
        }
        hierarchisation::hierarchize(self.basis, values, &self.storage)
    }

    /// Hierarchical surpluses to nodal values, in place.
    pub fn dehierarchize(&self, alpha: &mut [f64]) -> Result<(), SGError>
    {
        if alpha.len() != self.storage.len()
        {
            return Err(SGError::NumberOfPointsAndValuesMismatch);
        }
        hierarchisation::dehierarchize(self.basis, alpha, &self.storage)
    }

    pub fn integrate(&self, alpha: &[f64]) -> Result<f64, SGError>
    {
        quadrature::integrate(self.basis, &self.storage, alpha)
    }

    pub fn first_moment(&self, alpha: &[f64]) -> Result<f64, SGError>
    {
        quadrature::first_moment(self.basis, &self.storage, alpha)
    }

    pub fn weighted_quadrature<F: Fn(usize, f64) -> f64>(&self, alpha: &[f64], density: F, order: usize) -> Result<f64, SGError>
    {
        quadrature::weighted_quadrature(self.basis, &self.storage, alpha, density, order)
    }

    ///
    /// `result = M alpha` with the L2 mass matrix of the basis.
    ///
    pub fn mass_mult(&self, alpha: &[f64], result: &mut [f64]) -> Result<(), SGError>
    {
        match self.basis
        {
            BasisType::Linear | BasisType::LinearBoundary => OperationLTwoDotProduct::new(&self.storage).mult(alpha, result),
            BasisType::ModifiedLinear => OperationModLinearMass::new(&self.storage).mult(alpha, result),
            _ => Err(SGError::UnsupportedOperation),
        }
    }

    ///
    /// `result = L alpha` with the stiffness matrix of the Laplace operator.
    ///
    pub fn laplace_mult(&self, alpha: &[f64], result: &mut [f64]) -> Result<(), SGError>
    {
        match self.basis
        {
            BasisType::Linear | BasisType::LinearBoundary => OperationLaplace::new(&self.storage).mult(alpha, result),
            _ => Err(SGError::UnsupportedOperation),
        }
    }

    ///
    /// Inserts points until the function is non-negative at every candidate point.
    /// `alpha` is extended for the new points.
    ///
    pub fn make_positive(&mut self, alpha: &mut Vec<f64>, options: &MakePositiveOptions) -> Result<Vec<usize>, SGError>
    {
        make_positive(self.basis, &mut self.storage, alpha, options)
    }

    pub fn serialize(&self, format: SerializationFormat) -> Result<Vec<u8>, SGError>
    {
        serialization::serialize(self, format)
    }

    pub fn deserialize(bytes: &[u8], format: SerializationFormat) -> Result<Self, SGError>
    {
        let mut grid: Self = serialization::deserialize(bytes, format)?;
        grid.storage.generate_map();
        Ok(grid)
    }

    pub fn save(&self, path: &str, format: SerializationFormat) -> Result<(), SGError>
    {
        serialization::save(self, path, format)
    }

    pub fn load(path: &str, format: SerializationFormat) -> Result<Self, SGError>
    {
        let mut grid: Self = serialization::load(path, format)?;
        grid.storage.generate_map();
        Ok(grid)
    }
}
