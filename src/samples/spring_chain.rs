use super::GapContact;
use crate::base::{encode_prescribed, EqId, NewtonError, EXCLUDED};
use crate::fem::{Assembler, Constraint, FeModel, GlobalVector, MatrixProfile};
use crate::StrError;
use russell_lab::{Matrix, Vector};

/// Implements a chain of nonlinear springs fixed at the first node
///
/// ```text
///  fixed
///   |--/\/\/--(1)--/\/\/--(2)-- ... --/\/\/--(n) → load or prescribed displacement
///   0
/// ```
///
/// Each node has one degree of freedom (the displacement `u`). The force and tangent
/// stiffness of a spring with elongation `δ = u_b - u_a` are:
///
/// ```text
/// f  = k (δ + β δ³)
/// kt = k (1 + 3 β δ²)
/// ```
///
/// A spring with a stretch `1 + δ ≤ 0` is inverted, yielding [NewtonError::NegativeJacobian].
/// The last node is either loaded (`F = load · t`) or has a prescribed displacement
/// (`u = value · t`), where `t` is the time set by [FeModel::set_time] (1.0 by default).
pub struct SpringChain {
    /// Number of springs
    n_springs: usize,

    /// Spring stiffness
    stiffness: f64,

    /// Coefficient of the cubic term
    beta: f64,

    /// Load at the last node (at t = 1)
    load: f64,

    /// Prescribed displacement of the last node (at t = 1)
    prescribed: Option<f64>,

    /// Equation id of each node
    lm: Vec<EqId>,

    /// Displacements at the start of the time step
    u_start: Vec<f64>,

    /// Current displacements
    u: Vec<f64>,

    /// Time at the end of the current time step
    t: f64,

    /// Contact constraints
    contacts: Vec<GapContact>,

    /// Number of calls to residual
    pub n_residual: usize,

    /// Number of calls to stiffness_matrix
    pub n_stiffness: usize,
}

impl SpringChain {
    /// Allocates a new instance
    pub fn new(n_springs: usize, stiffness: f64, beta: f64) -> Result<Self, StrError> {
        if n_springs < 1 {
            return Err("the number of springs must be ≥ 1");
        }
        if stiffness <= 0.0 {
            return Err("the spring stiffness must be > 0.0");
        }
        let mut lm = vec![EXCLUDED; n_springs + 1];
        for node in 1..=n_springs {
            lm[node] = (node - 1) as EqId;
        }
        Ok(SpringChain {
            n_springs,
            stiffness,
            beta,
            load: 0.0,
            prescribed: None,
            lm,
            u_start: vec![0.0; n_springs + 1],
            u: vec![0.0; n_springs + 1],
            t: 1.0,
            contacts: Vec::new(),
            n_residual: 0,
            n_stiffness: 0,
        })
    }

    /// Applies a load at the last node
    pub fn set_load(&mut self, load: f64) -> &mut Self {
        self.load = load;
        self.prescribed = None;
        self.lm[self.n_springs] = (self.n_springs - 1) as EqId;
        self
    }

    /// Prescribes the displacement of the last node
    pub fn set_prescribed(&mut self, value: f64) -> &mut Self {
        self.load = 0.0;
        self.prescribed = Some(value);
        self.lm[self.n_springs] = encode_prescribed(self.n_springs - 1);
        self
    }

    /// Adds a contact constraint
    pub fn add_contact(&mut self, mut contact: GapContact) -> Result<&mut Self, StrError> {
        if contact.nodes().iter().any(|node| *node == 0 || *node > self.n_springs) {
            return Err("the contact nodes must be in [1, n_springs]");
        }
        contact.update_gaps(&self.u);
        self.contacts.push(contact);
        Ok(self)
    }

    /// Returns the number of equations
    pub fn neq(&self) -> usize {
        self.n_springs
    }

    /// Returns the equation ids of all nodes
    pub fn equations(&self) -> &[EqId] {
        &self.lm
    }

    /// Returns the current displacements of all nodes
    pub fn displacements(&self) -> &[f64] {
        &self.u
    }

    /// Returns the i-th contact constraint
    pub fn contact(&self, i: usize) -> &GapContact {
        &self.contacts[i]
    }

    /// Returns the force of a spring
    pub fn spring_force(&self, spring: usize) -> f64 {
        let delta = self.u[spring + 1] - self.u[spring];
        self.stiffness * (delta + self.beta * delta * delta * delta)
    }

    fn spring_equations(&self, spring: usize) -> [EqId; 2] {
        [self.lm[spring], self.lm[spring + 1]]
    }

    fn elongation(&self, spring: usize) -> Result<f64, NewtonError> {
        let delta = self.u[spring + 1] - self.u[spring];
        if 1.0 + delta <= 0.0 {
            return Err(NewtonError::NegativeJacobian {
                element: spring,
                gauss_point: 0,
                jacobian: 1.0 + delta,
            });
        }
        Ok(delta)
    }
}

impl FeModel for SpringChain {
    fn prep_step(&mut self, ui: &mut Vector) -> Result<(), NewtonError> {
        if let Some(value) = self.prescribed {
            ui[self.n_springs - 1] = value * self.t - self.u_start[self.n_springs];
        }
        Ok(())
    }

    fn residual(&mut self, rr: &mut GlobalVector, _first_pass: bool) -> Result<bool, NewtonError> {
        self.n_residual += 1;
        for spring in 0..self.n_springs {
            let delta = self.elongation(spring)?;
            let f = self.stiffness * (delta + self.beta * delta * delta * delta);
            rr.assemble(&self.spring_equations(spring), &Vector::from(&[f, -f]))?;
        }
        if self.prescribed.is_none() && self.load != 0.0 {
            rr.assemble(&[self.lm[self.n_springs]], &Vector::from(&[self.load * self.t]))?;
        }
        for contact in &self.contacts {
            contact.residual(rr, &self.lm)?;
        }
        Ok(true)
    }

    fn stiffness_matrix(&mut self, assembler: &mut Assembler) -> Result<bool, NewtonError> {
        self.n_stiffness += 1;
        for spring in 0..self.n_springs {
            let delta = self.elongation(spring)?;
            let kt = self.stiffness * (1.0 + 3.0 * self.beta * delta * delta);
            let ke = Matrix::from(&[[kt, -kt], [-kt, kt]]);
            assembler.assemble(&self.spring_equations(spring), &ke)?;
        }
        for contact in &self.contacts {
            contact.stiffness(assembler, &self.lm)?;
        }
        Ok(true)
    }

    fn build_matrix_profile(&mut self, profile: &mut MatrixProfile) -> Result<(), NewtonError> {
        for spring in 0..self.n_springs {
            profile.add(&self.spring_equations(spring))?;
        }
        for contact in &self.contacts {
            contact.matrix_profile(profile, &self.lm)?;
        }
        Ok(())
    }

    fn update(&mut self, uu: &Vector) -> Result<(), NewtonError> {
        for node in 1..=self.n_springs {
            self.u[node] = self.u_start[node] + uu[node - 1];
        }
        // the prescribed value is imposed exactly regardless of the line search step
        if let Some(value) = self.prescribed {
            self.u[self.n_springs] = value * self.t;
        }
        for contact in self.contacts.iter_mut() {
            contact.update_gaps(&self.u);
        }
        Ok(())
    }

    fn constraints_mut(&mut self) -> Vec<&mut dyn Constraint> {
        self.contacts.iter_mut().map(|c| c as &mut dyn Constraint).collect()
    }

    fn set_time(&mut self, t: f64, _dt: f64) {
        self.t = t;
    }

    fn accept_step(&mut self) -> Result<(), NewtonError> {
        self.u_start.copy_from_slice(&self.u);
        Ok(())
    }

    fn reject_step(&mut self) {
        self.u.copy_from_slice(&self.u_start);
        for contact in self.contacts.iter_mut() {
            contact.update_gaps(&self.u);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
