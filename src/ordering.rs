//! Bandwidth-reducing DOF ordering for the direct solver
//!
//! Meshes are often numbered row by row, which leaves the stiffness matrix
//! with a bandwidth of a whole row of nodes. The Cholesky factor fills that
//! band completely, so the DOFs are renumbered before factorization.

use std::collections::VecDeque;

use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Reverse Cuthill-McKee ordering of a structurally symmetric matrix
///
/// Stored zeros are not treated as connections.
///
/// # Returns
/// `order` with `order[new] = old`
pub fn reverse_cuthill_mckee(matrix: &CscMatrix<f64>) -> Vec<usize> {
    let n = matrix.ncols();

    let neighbours: Vec<Vec<usize>> = matrix
        .col_iter()
        .enumerate()
        .map(|(col, column)| {
            column
                .row_indices()
                .iter()
                .zip(column.values())
                .filter(|(row, value)| **row != col && **value != 0.0)
                .map(|(row, _)| *row)
                .collect()
        })
        .collect();
    let degree: Vec<usize> = neighbours.iter().map(Vec::len).collect();

    let mut starts: Vec<usize> = (0..n).collect();
    starts.sort_by_key(|&dof| degree[dof]);

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();
    let mut adjacent = Vec::new();

    for start in starts {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);

        while let Some(dof) = queue.pop_front() {
            order.push(dof);

            adjacent.clear();
            adjacent.extend(neighbours[dof].iter().copied().filter(|next| !visited[*next]));
            adjacent.sort_by_key(|&next| degree[next]);
            for &next in &adjacent {
                visited[next] = true;
                queue.push_back(next);
            }
        }
    }

    order.reverse();
    order
}

/// Renumbers rows and columns alike, with `order[new] = old`
pub fn permute_symmetric(matrix: &CscMatrix<f64>, order: &[usize]) -> CscMatrix<f64> {
    let mut position = vec![0; order.len()];
    for (new, &old) in order.iter().enumerate() {
        position[old] = new;
    }

    let mut coo = CooMatrix::new(matrix.nrows(), matrix.ncols());
    for (row, col, value) in matrix.triplet_iter() {
        coo.push(position[row], position[col], *value);
    }

    CscMatrix::from(&coo)
}

/// Largest `|row - col|` over the non-zero entries
pub fn bandwidth(matrix: &CscMatrix<f64>) -> usize {
    matrix
        .triplet_iter()
        .filter(|(_, _, value)| **value != 0.0)
        .map(|(row, col, _)| row.abs_diff(col))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tridiagonal chain visiting the DOFs in `path` order
    fn chain(path: &[usize]) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(path.len(), path.len());
        for &dof in path {
            coo.push(dof, dof, 2.0);
        }
        for pair in path.windows(2) {
            coo.push(pair[0], pair[1], -1.0);
            coo.push(pair[1], pair[0], -1.0);
        }
        CscMatrix::from(&coo)
    }

    #[test]
    fn order_is_a_permutation() {
        let matrix = chain(&[0, 5, 1, 6, 2, 7, 3, 8, 4, 9]);
        let mut order = reverse_cuthill_mckee(&matrix);
        order.sort_unstable();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn interleaved_chain_becomes_tridiagonal() {
        let matrix = chain(&[0, 5, 1, 6, 2, 7, 3, 8, 4, 9]);
        assert_eq!(bandwidth(&matrix), 5);

        let order = reverse_cuthill_mckee(&matrix);
        let permuted = permute_symmetric(&matrix, &order);
        assert_eq!(bandwidth(&permuted), 1);
        assert_eq!(permuted.nnz(), matrix.nnz());
    }

    #[test]
    fn isolated_dofs_are_kept() {
        // DOF 2 only has an explicitly stored zero coupling
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 0, 1.0);
        coo.push(1, 1, 1.0);
        coo.push(2, 2, 1.0);
        coo.push(0, 1, -0.5);
        coo.push(1, 0, -0.5);
        coo.push(0, 2, 0.0);
        coo.push(2, 0, 0.0);
        let matrix = CscMatrix::from(&coo);

        let mut order = reverse_cuthill_mckee(&matrix);
        assert_eq!(order.len(), 3);
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(bandwidth(&matrix), 1);
    }
}
