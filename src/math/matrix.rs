use anyhow::ensure;

/// Shape of a dense vec-of-vec matrix, validating that every row has the
/// same length. An empty matrix has shape (0, 0).
pub fn shape(a: &[Vec<f64>]) -> anyhow::Result<(usize, usize)> {
    let rows = a.len();
    if rows == 0 {
        return Ok((0, 0));
    }
    let cols = a[0].len();
    ensure!(
        a.iter().all(|r| r.len() == cols),
        "matrix rows must all have length {}",
        cols
    );
    Ok((rows, cols))
}

/// Transpose a rectangular matrix.
pub fn transpose(a: &[Vec<f64>]) -> anyhow::Result<Vec<Vec<f64>>> {
    let (rows, cols) = shape(a)?;
    let mut out = vec![vec![0.0; rows]; cols];
    for (i, row) in a.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            out[j][i] = *v;
        }
    }
    Ok(out)
}
