use crate::base::{EqId, Equation, MatrixFormat};
use crate::StrError;
use russell_lab::{Matrix, Vector};
use russell_sparse::CooMatrix;
use std::collections::BTreeSet;

/// Collects the sparsity pattern of the global stiffness matrix
///
/// Each element adds its equation list. Prescribed equation ids are decoded so that the
/// pattern contains their equation (the diagonal of which becomes one); excluded DOFs
/// are ignored.
#[derive(Clone, Debug)]
pub struct MatrixProfile {
    rows: Vec<BTreeSet<usize>>,
}

impl MatrixProfile {
    /// Allocates an empty profile with all diagonal entries
    pub fn new(neq: usize) -> Self {
        let mut rows = vec![BTreeSet::new(); neq];
        for (i, row) in rows.iter_mut().enumerate() {
            row.insert(i);
        }
        MatrixProfile { rows }
    }

    /// Returns the number of equations
    pub fn neq(&self) -> usize {
        self.rows.len()
    }

    /// Adds the coupling between all equations of an element
    pub fn add(&mut self, lm: &[EqId]) -> Result<(), StrError> {
        let eqs: Vec<usize> = lm.iter().filter_map(|l| Equation::decode(*l).index()).collect();
        for i in &eqs {
            for j in &eqs {
                self.add_entry(*i, *j)?;
            }
        }
        Ok(())
    }

    /// Adds a single entry
    pub fn add_entry(&mut self, i: usize, j: usize) -> Result<(), StrError> {
        let neq = self.rows.len();
        if i >= neq || j >= neq {
            return Err("equation number is out of bounds in the matrix profile");
        }
        self.rows[i].insert(j);
        Ok(())
    }

    /// Returns the column indices of a row (sorted)
    pub fn row(&self, i: usize) -> impl Iterator<Item = &usize> {
        self.rows[i].iter()
    }

    /// Returns all entries (i, j) of the profile (row-major order)
    pub fn entries(&self) -> Vec<(usize, usize)> {
        let mut res = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            for j in row {
                res.push((i, *j));
            }
        }
        res
    }

    /// Returns the number of non-zero entries
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|row| row.len()).sum()
    }
}

/// Holds the global stiffness matrix in compressed sparse row format
///
/// The pattern is fixed by [GlobalMatrix::create]; the values are modified in place
/// between reformations.
#[derive(Clone, Debug)]
pub struct GlobalMatrix {
    neq: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl GlobalMatrix {
    /// Allocates an empty matrix (no pattern yet)
    pub fn new(neq: usize) -> Self {
        GlobalMatrix {
            neq,
            row_ptr: vec![0; neq + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Builds the sparsity pattern from a profile and sets all values to zero
    pub fn create(&mut self, profile: &MatrixProfile) {
        let neq = profile.neq();
        let nnz = profile.nnz();
        self.neq = neq;
        self.row_ptr = Vec::with_capacity(neq + 1);
        self.col_idx = Vec::with_capacity(nnz);
        self.row_ptr.push(0);
        for i in 0..neq {
            self.col_idx.extend(profile.row(i));
            self.row_ptr.push(self.col_idx.len());
        }
        self.values = vec![0.0; nnz];
    }

    /// Releases the pattern
    pub fn clear(&mut self) {
        self.row_ptr = vec![0; self.neq + 1];
        self.col_idx.clear();
        self.values.clear();
    }

    /// Sets all values to zero (keeps the pattern)
    pub fn zero(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Returns the number of rows (equal to the number of columns)
    pub fn rows(&self) -> usize {
        self.neq
    }

    /// Returns the number of non-zero entries of the pattern
    pub fn nonzeros(&self) -> usize {
        self.col_idx.len()
    }

    /// Returns true if the pattern has been created
    pub fn has_pattern(&self) -> bool {
        !self.col_idx.is_empty()
    }

    /// Adds a value to an entry of the pattern
    pub fn add(&mut self, i: usize, j: usize, value: f64) -> Result<(), StrError> {
        let k = self.position(i, j).ok_or("entry is not in the sparsity pattern")?;
        self.values[k] += value;
        Ok(())
    }

    /// Sets the value of an entry of the pattern
    pub fn set(&mut self, i: usize, j: usize, value: f64) -> Result<(), StrError> {
        let k = self.position(i, j).ok_or("entry is not in the sparsity pattern")?;
        self.values[k] = value;
        Ok(())
    }

    /// Returns the value of an entry (zero if it is not in the pattern)
    pub fn get(&self, i: usize, j: usize) -> f64 {
        match self.position(i, j) {
            Some(k) => self.values[k],
            None => 0.0,
        }
    }

    /// Returns the diagonal value of a row
    pub fn diag(&self, i: usize) -> f64 {
        self.get(i, i)
    }

    /// Calls `f(i, j, value)` for all entries of the pattern
    pub fn for_each<F>(&self, mut f: F) -> Result<(), StrError>
    where
        F: FnMut(usize, usize, f64) -> Result<(), StrError>,
    {
        for i in 0..self.neq {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                f(i, self.col_idx[k], self.values[k])?;
            }
        }
        Ok(())
    }

    /// Performs the matrix-vector multiplication u := K v
    pub fn mat_vec_mul(&self, u: &mut Vector, v: &Vector) -> Result<(), StrError> {
        if u.dim() != self.neq || v.dim() != self.neq {
            return Err("vectors are incompatible with the matrix");
        }
        for i in 0..self.neq {
            let mut sum = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[k] * v[self.col_idx[k]];
            }
            u[i] = sum;
        }
        Ok(())
    }

    /// Returns the number of entries stored by a COO matrix with the given format
    ///
    /// **Note:** The symmetric format stores the lower triangle only.
    pub fn coo_nnz(&self, format: MatrixFormat, lower_only: bool) -> usize {
        if format == MatrixFormat::Symmetric && lower_only {
            let mut count = 0;
            for i in 0..self.neq {
                for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                    if self.col_idx[k] <= i {
                        count += 1;
                    }
                }
            }
            count
        } else {
            self.nonzeros()
        }
    }

    /// Puts all entries into a COO matrix, optionally skipping the upper triangle
    pub fn to_coo(&self, coo: &mut CooMatrix, lower_only: bool) -> Result<(), StrError> {
        coo.reset();
        self.for_each(|i, j, value| {
            if lower_only && j > i {
                return Ok(());
            }
            coo.put(i, j, value)
        })
    }

    /// Returns a dense copy of the matrix
    pub fn to_dense(&self) -> Matrix {
        let mut dense = Matrix::new(self.neq, self.neq);
        for i in 0..self.neq {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                dense.set(i, self.col_idx[k], self.values[k]);
            }
        }
        dense
    }

    fn position(&self, i: usize, j: usize) -> Option<usize> {
        if i >= self.neq {
            return None;
        }
        let start = self.row_ptr[i];
        let end = self.row_ptr[i + 1];
        self.col_idx[start..end].binary_search(&j).ok().map(|k| start + k)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{GlobalMatrix, MatrixProfile};
    use crate::base::{encode_prescribed, MatrixFormat, EXCLUDED};
    use russell_lab::Vector;

    #[test]
    fn profile_works() {
        //  element A: [0, 1]
        //  element B: [1, P(2), excluded]
        let mut profile = MatrixProfile::new(3);
        assert_eq!(profile.nnz(), 3);
        profile.add(&[0, 1]).unwrap();
        profile.add(&[1, encode_prescribed(2), EXCLUDED]).unwrap();
        assert_eq!(
            profile.entries(),
            &[(0, 0), (0, 1), (1, 0), (1, 1), (1, 2), (2, 1), (2, 2)]
        );
        assert_eq!(profile.nnz(), 7);
        assert_eq!(
            profile.add(&[0, 3]).err(),
            Some("equation number is out of bounds in the matrix profile")
        );
    }

    #[test]
    fn matrix_works() {
        let mut profile = MatrixProfile::new(3);
        profile.add(&[0, 1]).unwrap();
        profile.add(&[1, 2]).unwrap();
        let mut kk = GlobalMatrix::new(3);
        assert!(!kk.has_pattern());
        kk.create(&profile);
        assert_eq!(kk.rows(), 3);
        assert_eq!(kk.nonzeros(), 7);
        kk.add(0, 0, 2.0).unwrap();
        kk.add(0, 1, -1.0).unwrap();
        kk.add(1, 0, -1.0).unwrap();
        kk.add(1, 1, 2.0).unwrap();
        kk.add(1, 1, 1.0).unwrap();
        kk.set(1, 2, -2.0).unwrap();
        kk.set(2, 1, -2.0).unwrap();
        kk.add(2, 2, 2.0).unwrap();
        assert_eq!(kk.add(0, 2, 1.0).err(), Some("entry is not in the sparsity pattern"));
        assert_eq!(kk.get(0, 2), 0.0);
        assert_eq!(kk.diag(1), 3.0);
        assert_eq!(kk.coo_nnz(MatrixFormat::Symmetric, true), 5);
        assert_eq!(kk.coo_nnz(MatrixFormat::Unsymmetric, true), 7);

        let dense = kk.to_dense();
        assert_eq!(dense.get(1, 2), -2.0);
        assert_eq!(dense.get(2, 0), 0.0);

        let v = Vector::from(&[1.0, 1.0, 1.0]);
        let mut u = Vector::new(3);
        kk.mat_vec_mul(&mut u, &v).unwrap();
        assert_eq!(u.as_data(), &[1.0, 0.0, 0.0]);

        kk.zero();
        assert_eq!(kk.diag(1), 0.0);
        assert_eq!(kk.nonzeros(), 7);
        kk.clear();
        assert!(!kk.has_pattern());
    }
}
