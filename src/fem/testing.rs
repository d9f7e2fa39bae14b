use super::{Assembler, DenseSolver, FeModel, GlobalMatrix, GlobalVector, LinearSolver, MatrixProfile};
use crate::base::{EqId, MatrixFormat, NewtonError};
use russell_lab::{Matrix, Vector};

/// Implements a model that does nothing
#[allow(dead_code)]
pub(crate) struct NullModel {}

#[allow(dead_code)]
impl NullModel {
    pub(crate) fn new() -> Self {
        NullModel {}
    }
}

impl FeModel for NullModel {
    fn residual(&mut self, _rr: &mut GlobalVector, _first_pass: bool) -> Result<bool, NewtonError> {
        Ok(true)
    }
    fn stiffness_matrix(&mut self, _assembler: &mut Assembler) -> Result<bool, NewtonError> {
        Ok(true)
    }
    fn build_matrix_profile(&mut self, _profile: &mut MatrixProfile) -> Result<(), NewtonError> {
        Ok(())
    }
    fn update(&mut self, _uu: &Vector) -> Result<(), NewtonError> {
        Ok(())
    }
}

/// Implements a model with R(u) = f - K u - β u³ (one element with all equations)
#[allow(dead_code)]
pub(crate) struct LinearModel {
    kk: Matrix,
    ff: Vector,
    beta: f64,
    u_start: Vector,
    u: Vector,
    lm: Vec<EqId>,
    pub(crate) n_residual: usize,
    pub(crate) n_stiffness: usize,
    pub(crate) n_update: usize,
}

#[allow(dead_code)]
impl LinearModel {
    pub(crate) fn new(kk: &Matrix, ff: &[f64]) -> Self {
        let n = ff.len();
        LinearModel {
            kk: kk.clone(),
            ff: Vector::from(&ff),
            beta: 0.0,
            u_start: Vector::new(n),
            u: Vector::new(n),
            lm: (0..n).map(|i| i as EqId).collect(),
            n_residual: 0,
            n_stiffness: 0,
            n_update: 0,
        }
    }

    pub(crate) fn with_cubic_term(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    pub(crate) fn u(&self) -> &Vector {
        &self.u
    }
}

impl FeModel for LinearModel {
    fn residual(&mut self, rr: &mut GlobalVector, _first_pass: bool) -> Result<bool, NewtonError> {
        self.n_residual += 1;
        let n = self.u.dim();
        let mut fe = Vector::new(n);
        for i in 0..n {
            fe[i] = self.ff[i] - self.beta * f64::powi(self.u[i], 3);
            for j in 0..n {
                fe[i] -= self.kk.get(i, j) * self.u[j];
            }
        }
        rr.assemble(&self.lm, &fe)?;
        Ok(true)
    }

    fn stiffness_matrix(&mut self, assembler: &mut Assembler) -> Result<bool, NewtonError> {
        self.n_stiffness += 1;
        let mut ke = self.kk.clone();
        for i in 0..self.u.dim() {
            ke.set(i, i, ke.get(i, i) + 3.0 * self.beta * self.u[i] * self.u[i]);
        }
        assembler.assemble(&self.lm, &ke)?;
        Ok(true)
    }

    fn build_matrix_profile(&mut self, profile: &mut MatrixProfile) -> Result<(), NewtonError> {
        profile.add(&self.lm)?;
        Ok(())
    }

    fn update(&mut self, uu: &Vector) -> Result<(), NewtonError> {
        self.n_update += 1;
        for i in 0..self.u.dim() {
            self.u[i] = self.u_start[i] + uu[i];
        }
        Ok(())
    }

    fn accept_step(&mut self) -> Result<(), NewtonError> {
        self.u_start = self.u.clone();
        Ok(())
    }

    fn reject_step(&mut self) {
        self.u = self.u_start.clone();
    }
}

/// Returns a factorized dense solver
#[allow(dead_code)]
pub(crate) fn dense_solver(kk: &Matrix) -> DenseSolver {
    let (n, _) = kk.dims();
    let mut profile = MatrixProfile::new(n);
    for i in 0..n {
        for j in 0..n {
            profile.add_entry(i, j).unwrap();
        }
    }
    let mut global = GlobalMatrix::new(n);
    global.create(&profile);
    for i in 0..n {
        for j in 0..n {
            global.set(i, j, kk.get(i, j)).unwrap();
        }
    }
    let mut solver = DenseSolver::new(true);
    solver.create(n, MatrixFormat::Unsymmetric).unwrap();
    solver.factor(&global).unwrap();
    solver
}

/// Returns a factorized dense solver with a diagonal matrix
#[allow(dead_code)]
pub(crate) fn diagonal_solver(diagonal: &[f64]) -> DenseSolver {
    let n = diagonal.len();
    let mut kk = Matrix::new(n, n);
    for i in 0..n {
        kk.set(i, i, diagonal[i]);
    }
    dense_solver(&kk)
}
