use super::GlobalMatrix;
use crate::base::MatrixFormat;
use crate::StrError;
use russell_lab::{Matrix, Vector};
use russell_sparse::{CooMatrix, Genie, LinSolParams, LinSolver, Sym};

/// Defines the linear solver used by the nonlinear solver
///
/// The lifecycle is: `create` → `pre_process` (whenever the pattern changes) →
/// `factor` (at every reformation) → `back_solve` (many times) → `destroy`.
pub trait LinearSolver {
    /// Returns true if the solver handles matrices stored with the given format
    fn supports(&self, format: MatrixFormat) -> bool;

    /// Prepares the solver for a system with `neq` equations
    fn create(&mut self, neq: usize, format: MatrixFormat) -> Result<(), StrError>;

    /// Analyzes the sparsity pattern of the matrix
    fn pre_process(&mut self, kk: &GlobalMatrix) -> Result<(), StrError>;

    /// Factorizes the matrix
    fn factor(&mut self, kk: &GlobalMatrix) -> Result<(), StrError>;

    /// Solves the system with the last factorized matrix
    fn back_solve(&mut self, x: &mut Vector, b: &Vector) -> Result<(), StrError>;

    /// Releases the data derived from the sparsity pattern
    fn destroy(&mut self) {}

    /// Sets the partitions of the equations (for block solvers)
    fn set_partitions(&mut self, _partitions: &[usize]) {}
}

/// Implements a direct sparse solver (UMFPACK, KLU, or MUMPS)
pub struct SparseSolver {
    /// Solver type
    genie: Genie,

    /// Parameters of the factorization
    params: LinSolParams,

    /// Shows messages from the solver
    verbose: bool,

    /// Storage symmetry (derived from the matrix format)
    sym: Sym,

    /// Number of equations
    neq: usize,

    /// Holds the matrix handed to the solver
    coo: Option<CooMatrix>,

    /// Holds the solver
    solver: Option<LinSolver<'static>>,

    /// Holds the partitions requested by the nonlinear solver
    partitions: Vec<usize>,

    /// Indicates that the matrix has been factorized
    factorized: bool,
}

impl SparseSolver {
    /// Allocates a new instance
    pub fn new(genie: Genie, params: LinSolParams, verbose: bool) -> Self {
        SparseSolver {
            genie,
            params,
            verbose,
            sym: Sym::No,
            neq: 0,
            coo: None,
            solver: None,
            partitions: Vec::new(),
            factorized: false,
        }
    }

    /// Returns the partitions set by the nonlinear solver
    pub fn partitions(&self) -> &[usize] {
        &self.partitions
    }
}

impl LinearSolver for SparseSolver {
    fn supports(&self, format: MatrixFormat) -> bool {
        match format {
            MatrixFormat::Unsymmetric => true,
            MatrixFormat::Symmetric => !matches!(symmetric_storage(self.genie), Sym::No),
        }
    }

    fn create(&mut self, neq: usize, format: MatrixFormat) -> Result<(), StrError> {
        if neq == 0 {
            return Err("the number of equations must be greater than zero");
        }
        if !self.supports(format) {
            return Err("the linear solver does not support the requested matrix format");
        }
        self.sym = match format {
            MatrixFormat::Symmetric => symmetric_storage(self.genie),
            MatrixFormat::Unsymmetric => Sym::No,
        };
        self.neq = neq;
        self.coo = None;
        self.solver = None;
        self.factorized = false;
        Ok(())
    }

    fn pre_process(&mut self, kk: &GlobalMatrix) -> Result<(), StrError> {
        if kk.rows() != self.neq {
            return Err("the matrix is incompatible with the linear solver");
        }
        let format = if matches!(self.sym, Sym::No) {
            MatrixFormat::Unsymmetric
        } else {
            MatrixFormat::Symmetric
        };
        let nnz = kk.coo_nnz(format, self.sym.triangular());
        self.coo = Some(CooMatrix::new(self.neq, self.neq, nnz, self.sym)?);
        self.solver = Some(LinSolver::new(self.genie)?);
        self.factorized = false;
        Ok(())
    }

    fn factor(&mut self, kk: &GlobalMatrix) -> Result<(), StrError> {
        let lower_only = self.sym.triangular();
        let coo = self.coo.as_mut().ok_or("the linear solver must be pre-processed first")?;
        let solver = self.solver.as_mut().ok_or("the linear solver must be pre-processed first")?;
        kk.to_coo(coo, lower_only)?;
        solver.actual.factorize(coo, Some(self.params))?;
        self.factorized = true;
        Ok(())
    }

    fn back_solve(&mut self, x: &mut Vector, b: &Vector) -> Result<(), StrError> {
        if !self.factorized {
            return Err("the linear solver must be factorized first");
        }
        let solver = self.solver.as_mut().ok_or("the linear solver must be factorized first")?;
        solver.actual.solve(x, b, self.verbose)
    }

    fn destroy(&mut self) {
        self.coo = None;
        self.solver = None;
        self.factorized = false;
    }

    fn set_partitions(&mut self, partitions: &[usize]) {
        self.partitions = partitions.to_vec();
    }
}

/// Returns the storage used by each solver type for symmetric matrices
///
/// KLU has no symmetric mode; MUMPS takes the lower triangle; UMFPACK takes the full matrix.
fn symmetric_storage(genie: Genie) -> Sym {
    match genie {
        Genie::Klu => Sym::No,
        Genie::Mumps => Sym::YesLower,
        Genie::Umfpack => Sym::YesFull,
    }
}

/// Implements a dense LU solver with partial pivoting
///
/// Useful for small systems and for checking the sparse solvers.
#[derive(Clone, Debug)]
pub struct DenseSolver {
    format: MatrixFormat,
    symmetric_supported: bool,
    lu: Matrix,
    pivots: Vec<usize>,
    factorized: bool,
    nfactor: usize,
    nsolve: usize,
}

impl DenseSolver {
    /// Allocates a new instance
    ///
    /// If `symmetric_supported` is false, the solver rejects the symmetric format
    /// (this allows testing the fallback to the non-symmetric format).
    pub fn new(symmetric_supported: bool) -> Self {
        DenseSolver {
            format: MatrixFormat::Unsymmetric,
            symmetric_supported,
            lu: Matrix::new(0, 0),
            pivots: Vec::new(),
            factorized: false,
            nfactor: 0,
            nsolve: 0,
        }
    }

    /// Returns the format selected by `create`
    pub fn format(&self) -> MatrixFormat {
        self.format
    }

    /// Returns the number of factorizations
    pub fn nfactor(&self) -> usize {
        self.nfactor
    }

    /// Returns the number of back-solves
    pub fn nsolve(&self) -> usize {
        self.nsolve
    }
}

impl LinearSolver for DenseSolver {
    fn supports(&self, format: MatrixFormat) -> bool {
        match format {
            MatrixFormat::Unsymmetric => true,
            MatrixFormat::Symmetric => self.symmetric_supported,
        }
    }

    fn create(&mut self, neq: usize, format: MatrixFormat) -> Result<(), StrError> {
        if neq == 0 {
            return Err("the number of equations must be greater than zero");
        }
        if !self.supports(format) {
            return Err("the linear solver does not support the requested matrix format");
        }
        self.format = format;
        self.lu = Matrix::new(neq, neq);
        self.pivots = vec![0; neq];
        self.factorized = false;
        Ok(())
    }

    fn pre_process(&mut self, kk: &GlobalMatrix) -> Result<(), StrError> {
        if kk.rows() != self.lu.dims().0 {
            return Err("the matrix is incompatible with the linear solver");
        }
        Ok(())
    }

    fn factor(&mut self, kk: &GlobalMatrix) -> Result<(), StrError> {
        let n = kk.rows();
        if n != self.lu.dims().0 {
            return Err("the matrix is incompatible with the linear solver");
        }
        self.lu = kk.to_dense();
        for k in 0..n {
            // pivot
            let mut p = k;
            let mut max = f64::abs(self.lu.get(k, k));
            for i in (k + 1)..n {
                let value = f64::abs(self.lu.get(i, k));
                if value > max {
                    max = value;
                    p = i;
                }
            }
            if max == 0.0 {
                self.factorized = false;
                return Err("the matrix is singular");
            }
            self.pivots[k] = p;
            if p != k {
                for j in 0..n {
                    let tmp = self.lu.get(k, j);
                    self.lu.set(k, j, self.lu.get(p, j));
                    self.lu.set(p, j, tmp);
                }
            }
            // eliminate
            let pivot = self.lu.get(k, k);
            for i in (k + 1)..n {
                let factor = self.lu.get(i, k) / pivot;
                self.lu.set(i, k, factor);
                if factor != 0.0 {
                    for j in (k + 1)..n {
                        let value = self.lu.get(i, j) - factor * self.lu.get(k, j);
                        self.lu.set(i, j, value);
                    }
                }
            }
        }
        self.factorized = true;
        self.nfactor += 1;
        Ok(())
    }

    fn back_solve(&mut self, x: &mut Vector, b: &Vector) -> Result<(), StrError> {
        if !self.factorized {
            return Err("the linear solver must be factorized first");
        }
        let n = self.lu.dims().0;
        if x.dim() != n || b.dim() != n {
            return Err("vectors are incompatible with the linear solver");
        }
        for i in 0..n {
            x[i] = b[i];
        }
        for k in 0..n {
            let p = self.pivots[k];
            if p != k {
                let tmp = x[k];
                x[k] = x[p];
                x[p] = tmp;
            }
        }
        // forward substitution (unit lower triangle)
        for i in 0..n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu.get(i, j) * x[j];
            }
            x[i] = sum;
        }
        // backward substitution
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= self.lu.get(i, j) * x[j];
            }
            x[i] = sum / self.lu.get(i, i);
        }
        self.nsolve += 1;
        Ok(())
    }

    fn destroy(&mut self) {
        self.factorized = false;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{DenseSolver, LinearSolver, SparseSolver};
    use crate::base::MatrixFormat;
    use crate::fem::{GlobalMatrix, MatrixProfile};
    use russell_lab::{approx_eq, Vector};
    use russell_sparse::{Genie, LinSolParams};

    fn sample_matrix() -> GlobalMatrix {
        //  ┌          ┐
        //  │  2  1  0 │
        //  │  1  3  1 │
        //  │  0  1  4 │
        //  └          ┘
        let mut profile = MatrixProfile::new(3);
        profile.add(&[0, 1]).unwrap();
        profile.add(&[1, 2]).unwrap();
        let mut kk = GlobalMatrix::new(3);
        kk.create(&profile);
        kk.set(0, 0, 2.0).unwrap();
        kk.set(0, 1, 1.0).unwrap();
        kk.set(1, 0, 1.0).unwrap();
        kk.set(1, 1, 3.0).unwrap();
        kk.set(1, 2, 1.0).unwrap();
        kk.set(2, 1, 1.0).unwrap();
        kk.set(2, 2, 4.0).unwrap();
        kk
    }

    #[test]
    fn dense_solver_works() {
        let kk = sample_matrix();
        let mut solver = DenseSolver::new(true);
        let mut x = Vector::new(3);
        let b = Vector::from(&[3.0, 5.0, 5.0]);
        assert_eq!(solver.back_solve(&mut x, &b).err(), Some("the linear solver must be factorized first"));
        solver.create(3, MatrixFormat::Symmetric).unwrap();
        solver.pre_process(&kk).unwrap();
        solver.factor(&kk).unwrap();
        solver.back_solve(&mut x, &b).unwrap();
        approx_eq(x[0], 1.0, 1e-14);
        approx_eq(x[1], 1.0, 1e-14);
        approx_eq(x[2], 1.0, 1e-14);
        assert_eq!(solver.nfactor(), 1);
        assert_eq!(solver.nsolve(), 1);
        assert_eq!(solver.format(), MatrixFormat::Symmetric);
    }

    #[test]
    fn dense_solver_captures_errors() {
        let mut solver = DenseSolver::new(false);
        assert!(!solver.supports(MatrixFormat::Symmetric));
        assert_eq!(
            solver.create(3, MatrixFormat::Symmetric).err(),
            Some("the linear solver does not support the requested matrix format")
        );
        solver.create(3, MatrixFormat::Unsymmetric).unwrap();
        let mut kk = sample_matrix();
        kk.zero();
        assert_eq!(solver.factor(&kk).err(), Some("the matrix is singular"));
    }

    #[test]
    fn sparse_solver_works() {
        let kk = sample_matrix();
        for format in [MatrixFormat::Symmetric, MatrixFormat::Unsymmetric] {
            let mut solver = SparseSolver::new(Genie::Umfpack, LinSolParams::new(), false);
            assert!(solver.supports(format));
            solver.create(3, format).unwrap();
            solver.set_partitions(&[1, 2]);
            assert_eq!(solver.partitions(), &[1, 2]);
            solver.pre_process(&kk).unwrap();
            solver.factor(&kk).unwrap();
            let mut x = Vector::new(3);
            let b = Vector::from(&[3.0, 5.0, 5.0]);
            solver.back_solve(&mut x, &b).unwrap();
            approx_eq(x[0], 1.0, 1e-13);
            approx_eq(x[1], 1.0, 1e-13);
            approx_eq(x[2], 1.0, 1e-13);
        }
    }

    #[test]
    fn sparse_solver_captures_errors() {
        let kk = sample_matrix();
        let mut solver = SparseSolver::new(Genie::Klu, LinSolParams::new(), false);
        assert!(!solver.supports(MatrixFormat::Symmetric));
        assert_eq!(
            solver.create(0, MatrixFormat::Unsymmetric).err(),
            Some("the number of equations must be greater than zero")
        );
        solver.create(3, MatrixFormat::Unsymmetric).unwrap();
        assert_eq!(
            solver.factor(&kk).err(),
            Some("the linear solver must be pre-processed first")
        );
    }
}
