//! Limited-memory quasi-Newton Hessian approximation (L-BFGS).
//!
//! Curvature pairs `(s, y)` are accepted only when they pass the damping/curvature test
//! `s^T y > eps * s^T s`, the usual BFGS safeguard against indefinite updates. The approximation
//! itself is maintained as a dense matrix, rebuilt from the surviving window of the last `memory`
//! pairs by replaying the rank-two BFGS update in order — equivalent to the compact
//! two-loop representation, just without its O(memory) factorization shortcut.

use std::collections::VecDeque;

use faer::sparse::{SparseColMat, Triplet};
use faer::{Col, Mat, unzip, zip};

use crate::E;
use crate::I;

const CURVATURE_EPS: E = 1e-8;

pub trait HessianUpdate {
    fn new(n_var: usize, memory: usize) -> Self;

    /// Registers a new curvature pair from the most recent accepted step, where
    /// `s = x_new - x_old` and `y = grad_phi_new - grad_phi_old`. Silently rejected if it fails
    /// the curvature test.
    fn update(&mut self, s: &Col<E>, y: &Col<E>);

    /// Materializes the current approximation as a sparse matrix for KKT assembly.
    fn to_sparse(&self) -> SparseColMat<I, E>;
}

struct Pair {
    s: Col<E>,
    y: Col<E>,
}

pub struct CompactLbfgs {
    n_var: usize,
    memory: usize,
    pairs: VecDeque<Pair>,
    gamma: E,
    b: Mat<E>,
}

impl HessianUpdate for CompactLbfgs {
    fn new(n_var: usize, memory: usize) -> Self {
        Self {
            n_var,
            memory: memory.max(1),
            pairs: VecDeque::new(),
            gamma: 1.0,
            b: Mat::<E>::from_fn(n_var, n_var, |i, j| if i == j { 1.0 } else { 0.0 }),
        }
    }

    fn update(&mut self, s: &Col<E>, y: &Col<E>) {
        let sty = dot(s, y);
        let sts = dot(s, s);
        if sty <= CURVATURE_EPS * sts {
            return;
        }

        let yty = dot(y, y);
        self.gamma = sty / yty.max(1e-16);

        if self.pairs.len() == self.memory {
            self.pairs.pop_front();
        }
        self.pairs.push_back(Pair {
            s: s.clone(),
            y: y.clone(),
        });

        self.rebuild();
    }

    fn to_sparse(&self) -> SparseColMat<I, E> {
        let n = self.n_var;
        let mut triplets = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let v = self.b[(i, j)];
                if v.abs() > 1e-14 {
                    triplets.push(Triplet::new(i, j, v));
                }
            }
        }
        SparseColMat::try_new_from_triplets(n, n, &triplets).unwrap()
    }
}

impl CompactLbfgs {
    /// Replays the surviving window of curvature pairs against a freshly scaled identity, giving
    /// a `B` that depends only on the last `memory` accepted pairs.
    fn rebuild(&mut self) {
        let n = self.n_var;
        let b0 = 1.0 / self.gamma.max(1e-16);
        let mut b = Mat::<E>::from_fn(n, n, |i, j| if i == j { b0 } else { 0.0 });
        for pair in self.pairs.iter() {
            let bs = &b * &pair.s;
            let s_bs = dot(&pair.s, &bs);
            let s_y = dot(&pair.s, &pair.y);
            if s_bs <= 1e-16 || s_y <= 1e-16 {
                continue;
            }
            for i in 0..n {
                for j in 0..n {
                    b[(i, j)] = b[(i, j)] - bs[i] * bs[j] / s_bs + pair.y[i] * pair.y[j] / s_y;
                }
            }
        }
        self.b = b;
    }
}

fn dot(a: &Col<E>, b: &Col<E>) -> E {
    let mut acc = 0.0;
    zip!(a, b).for_each(|unzip!(a, b)| acc += a * b);
    acc
}
