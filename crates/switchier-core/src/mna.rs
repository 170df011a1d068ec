//! Modified Nodal Analysis matrix structures.

use nalgebra::{DMatrix, DVector};

/// An MNA system `G·x = b` under assembly.
///
/// The unknown vector is `[node voltages (num_nodes) | branch currents
/// (num_branches)]`. The matrix is accumulated as a triplet list so it can
/// feed either the dense or the sparse factorization path; duplicate entries
/// at the same position are summed on conversion.
///
/// Ground (node index `None`) rows and columns are discarded at stamp time,
/// which is what enforces KCL structurally: no element can add current to
/// the ground row because the ground row does not exist.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    /// Number of non-ground nodes.
    pub num_nodes: usize,
    /// Number of auxiliary branch-current unknowns.
    pub num_branches: usize,
    triplets: Vec<(usize, usize, f64)>,
    rhs: DVector<f64>,
}

impl MnaSystem {
    /// Create an empty system of the given shape.
    pub fn new(num_nodes: usize, num_branches: usize) -> Self {
        Self {
            num_nodes,
            num_branches,
            triplets: Vec::new(),
            rhs: DVector::zeros(num_nodes + num_branches),
        }
    }

    /// Total system size.
    pub fn size(&self) -> usize {
        self.num_nodes + self.num_branches
    }

    /// Matrix row/column index of a branch unknown.
    pub fn branch_row(&self, branch: usize) -> usize {
        self.num_nodes + branch
    }

    /// Zero the matrix and RHS, keeping the shape.
    pub fn reset(&mut self) {
        self.triplets.clear();
        self.rhs.fill(0.0);
    }

    /// Stamp a conductance `g` between nodes `i` and `j`.
    ///
    /// Adds `g` to `G[i,i]` and `G[j,j]`, subtracts it from `G[i,j]` and
    /// `G[j,i]`. `None` means ground; those rows/columns are dropped.
    pub fn stamp_conductance(&mut self, i: Option<usize>, j: Option<usize>, g: f64) {
        if let Some(i) = i {
            self.triplets.push((i, i, g));
        }
        if let Some(j) = j {
            self.triplets.push((j, j, g));
        }
        if let (Some(i), Some(j)) = (i, j) {
            self.triplets.push((i, j, -g));
            self.triplets.push((j, i, -g));
        }
    }

    /// Stamp an independent current source driving `i` amperes from node
    /// `from` into node `to`.
    pub fn stamp_current_source(&mut self, from: Option<usize>, to: Option<usize>, i: f64) {
        if let Some(to) = to {
            self.rhs[to] += i;
        }
        if let Some(from) = from {
            self.rhs[from] -= i;
        }
    }

    /// Stamp a voltage-source branch: ±1 incidence between the branch row
    /// and the terminal nodes, with `v` on the branch RHS.
    ///
    /// The branch current is defined flowing from `pos` through the source
    /// to `neg`.
    pub fn stamp_voltage_branch(
        &mut self,
        branch: usize,
        pos: Option<usize>,
        neg: Option<usize>,
        v: f64,
    ) {
        let br = self.branch_row(branch);
        if let Some(p) = pos {
            self.triplets.push((p, br, 1.0));
            self.triplets.push((br, p, 1.0));
        }
        if let Some(n) = neg {
            self.triplets.push((n, br, -1.0));
            self.triplets.push((br, n, -1.0));
        }
        self.rhs[br] += v;
    }

    /// Add a raw matrix entry. Used by elements with bespoke branch
    /// constitutive rows (inductors, switches).
    pub fn add_matrix(&mut self, row: usize, col: usize, value: f64) {
        self.triplets.push((row, col, value));
    }

    /// Add a raw RHS entry.
    pub fn add_rhs(&mut self, row: usize, value: f64) {
        self.rhs[row] += value;
    }

    /// The right-hand side vector.
    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    /// The accumulated matrix triplets `(row, col, value)`.
    pub fn triplets(&self) -> &[(usize, usize, f64)] {
        &self.triplets
    }

    /// Assemble the triplets into a dense matrix, summing duplicates.
    pub fn to_dense_matrix(&self) -> DMatrix<f64> {
        let n = self.size();
        let mut m = DMatrix::zeros(n, n);
        for &(r, c, v) in &self.triplets {
            m[(r, c)] += v;
        }
        m
    }
}
