use super::{GlobalMatrix, MatrixProfile};
use crate::StrError;
use russell_lab::Vector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Holds an affine relation between equations: `u[parent] = Σ coef·u[child] + offset`
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct LinearConstraint {
    /// Dependent equation
    pub parent: usize,

    /// Independent equations and their coefficients
    pub children: Vec<(usize, f64)>,

    /// Constant term (applies to the total value, not to increments)
    pub offset: f64,
}

impl LinearConstraint {
    /// Allocates a new instance
    pub fn new(parent: usize, children: &[(usize, f64)], offset: f64) -> Self {
        LinearConstraint {
            parent,
            children: children.to_vec(),
            offset,
        }
    }

    /// Returns the value of the parent given the values of the children
    pub fn evaluate(&self, u: &Vector) -> f64 {
        self.children.iter().fold(self.offset, |acc, (c, coef)| acc + coef * u[*c])
    }
}

/// Manages the linear constraints of a model
///
/// The contributions of a parent equation are redistributed to its children during
/// the assembly. The row of the parent becomes the identity and its increment is
/// recovered from the children after each linear solution.
#[derive(Clone, Debug, Default)]
pub struct LinearConstraintManager {
    constraints: Vec<LinearConstraint>,
    parents: HashMap<usize, usize>,
}

impl LinearConstraintManager {
    /// Allocates an empty manager
    pub fn new() -> Self {
        LinearConstraintManager::default()
    }

    /// Adds a new constraint
    ///
    /// Chains are not allowed: a parent cannot be the child of another constraint.
    pub fn add(&mut self, constraint: LinearConstraint) -> Result<(), StrError> {
        if constraint.children.is_empty() {
            return Err("linear constraint must have at least one child");
        }
        if self.parents.contains_key(&constraint.parent) {
            return Err("equation is already the parent of a linear constraint");
        }
        for other in &self.constraints {
            if other.children.iter().any(|(c, _)| *c == constraint.parent) {
                return Err("parent equation is the child of another linear constraint");
            }
        }
        for (c, _) in &constraint.children {
            if *c == constraint.parent || self.parents.contains_key(c) {
                return Err("child equation is the parent of a linear constraint");
            }
        }
        self.parents.insert(constraint.parent, self.constraints.len());
        self.constraints.push(constraint);
        Ok(())
    }

    /// Returns the number of constraints
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Returns true if there are no constraints
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Returns the constraint whose parent is the given equation
    pub fn get(&self, eq: usize) -> Option<&LinearConstraint> {
        self.parents.get(&eq).map(|k| &self.constraints[*k])
    }

    /// Returns true if the equation is the parent of a constraint
    #[inline]
    pub fn is_parent(&self, eq: usize) -> bool {
        self.parents.contains_key(&eq)
    }

    /// Returns the equations (and weights) receiving the contributions of `eq`
    pub fn targets(&self, eq: usize) -> Vec<(usize, f64)> {
        match self.get(eq) {
            Some(constraint) => constraint.children.clone(),
            None => vec![(eq, 1.0)],
        }
    }

    /// Adds the couplings introduced by the constraints to the profile
    pub fn expand_profile(&self, profile: &mut MatrixProfile) -> Result<(), StrError> {
        if self.is_empty() {
            return Ok(());
        }
        for (i, j) in profile.entries() {
            if self.is_parent(i) || self.is_parent(j) {
                for (a, _) in self.targets(i) {
                    for (b, _) in self.targets(j) {
                        profile.add_entry(a, b)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Sets the rows of the parent equations to the identity
    pub fn set_parent_diagonals(&self, kk: &mut GlobalMatrix, identity_rows: &mut [bool]) -> Result<(), StrError> {
        for constraint in &self.constraints {
            kk.set(constraint.parent, constraint.parent, 1.0)?;
            identity_rows[constraint.parent] = true;
        }
        Ok(())
    }

    /// Recovers the increments of the parents from the increments of the children
    pub fn update_increment(&self, ui: &mut Vector) {
        for constraint in &self.constraints {
            let value: f64 = constraint.children.iter().map(|(c, coef)| coef * ui[*c]).sum();
            ui[constraint.parent] = value;
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
