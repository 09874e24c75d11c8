//! The BLAS/LAPACK surface the native backend calls through. Signatures
//! follow the Fortran routines: column-major storage, explicit leading
//! dimensions, `info` out-parameters where negative values name the
//! offending argument and `lwork == -1` asks for the workspace size.

pub const NO_TRANSPOSE: u8 = b'N';
pub const TRANSPOSE: u8 = b'T';
pub const CONJ_TRANSPOSE: u8 = b'C';

pub const JOB_ALL: u8 = b'A';
pub const JOB_SMALL: u8 = b'S';
pub const JOB_NONE: u8 = b'N';

/// Workspace query marker for `lwork`.
pub const WORKSPACE_QUERY: i32 = -1;

/// A provider of the double precision routines used by
/// [`crate::native::NativeEngine`].
pub trait LapackProvider {
    fn name(&self) -> &'static str;

    /// `C = alpha * op(A) * op(B) + beta * C`. Argument errors are reported
    /// through `info` the way `xerbla` numbers them.
    #[allow(clippy::too_many_arguments)]
    fn dgemm(
        &self,
        trans_a: u8,
        trans_b: u8,
        m: i32,
        n: i32,
        k: i32,
        alpha: f64,
        a: &[f64],
        lda: i32,
        b: &[f64],
        ldb: i32,
        beta: f64,
        c: &mut [f64],
        ldc: i32,
        info: &mut i32,
    );

    /// LU with partial pivoting. `ipiv` is 1-based; `info > 0` is the first
    /// exactly zero pivot.
    fn dgetrf(&self, m: i32, n: i32, a: &mut [f64], lda: i32, ipiv: &mut [i32], info: &mut i32);

    #[allow(clippy::too_many_arguments)]
    fn dgetrs(
        &self,
        trans: u8,
        n: i32,
        nrhs: i32,
        a: &[f64],
        lda: i32,
        ipiv: &[i32],
        b: &mut [f64],
        ldb: i32,
        info: &mut i32,
    );

    #[allow(clippy::too_many_arguments)]
    fn dgetri(
        &self,
        n: i32,
        a: &mut [f64],
        lda: i32,
        ipiv: &[i32],
        work: &mut [f64],
        lwork: i32,
        info: &mut i32,
    );

    #[allow(clippy::too_many_arguments)]
    fn dgeqrf(
        &self,
        m: i32,
        n: i32,
        a: &mut [f64],
        lda: i32,
        tau: &mut [f64],
        work: &mut [f64],
        lwork: i32,
        info: &mut i32,
    );

    #[allow(clippy::too_many_arguments)]
    fn dorgqr(
        &self,
        m: i32,
        n: i32,
        k: i32,
        a: &mut [f64],
        lda: i32,
        tau: &[f64],
        work: &mut [f64],
        lwork: i32,
        info: &mut i32,
    );

    /// Divide and conquer SVD. `info > 0` means the iteration did not
    /// converge.
    #[allow(clippy::too_many_arguments)]
    fn dgesdd(
        &self,
        jobz: u8,
        m: i32,
        n: i32,
        a: &mut [f64],
        lda: i32,
        s: &mut [f64],
        u: &mut [f64],
        ldu: i32,
        vt: &mut [f64],
        ldvt: i32,
        work: &mut [f64],
        lwork: i32,
        iwork: &mut [i32],
        info: &mut i32,
    );
}

/// Elements a column-major `rows x cols` operand with leading dimension
/// `ld` spans.
pub(crate) fn footprint(rows: i32, cols: i32, ld: i32) -> usize {
    if rows <= 0 || cols <= 0 {
        return 0;
    }
    ld as usize * (cols as usize - 1) + rows as usize
}

fn is_trans_flag(flag: u8) -> bool {
    matches!(
        flag.to_ascii_uppercase(),
        NO_TRANSPOSE | TRANSPOSE | CONJ_TRANSPOSE
    )
}

pub(crate) fn is_transposed(flag: u8) -> bool {
    flag.to_ascii_uppercase() != NO_TRANSPOSE
}

/// Minimum `dgesdd` workspace for the given job.
pub fn dgesdd_min_lwork(jobz: u8, m: i32, n: i32) -> usize {
    let (m, n) = (m.max(0) as usize, n.max(0) as usize);
    let mn = m.min(n);
    let mx = m.max(n);
    if mn == 0 {
        return 1;
    }
    let size = match jobz.to_ascii_uppercase() {
        JOB_NONE => 3 * mn + mx.max(7 * mn),
        JOB_ALL => 4 * mn * mn + 6 * mn + mx,
        _ => 3 * mn * mn + mx.max(4 * mn * mn + 4 * mn),
    };
    size.max(1)
}

fn workspace_ok(lwork: i32, minimum: usize, work_len: usize) -> (bool, bool) {
    if lwork == WORKSPACE_QUERY {
        return (true, work_len >= 1);
    }
    let lwork_ok = lwork >= 0 && lwork as usize >= minimum;
    (lwork_ok, work_len >= lwork.max(1) as usize)
}

// Validators shared by every provider. Each returns 0 or `-position` of the
// first bad argument, in the order the reference routines check them.

#[allow(clippy::too_many_arguments)]
pub(crate) fn check_dgemm(
    trans_a: u8,
    trans_b: u8,
    m: i32,
    n: i32,
    k: i32,
    a_len: usize,
    lda: i32,
    b_len: usize,
    ldb: i32,
    c_len: usize,
    ldc: i32,
) -> i32 {
    let (rows_a, cols_a) = if is_transposed(trans_a) { (k, m) } else { (m, k) };
    let (rows_b, cols_b) = if is_transposed(trans_b) { (n, k) } else { (k, n) };
    if !is_trans_flag(trans_a) {
        -1
    } else if !is_trans_flag(trans_b) {
        -2
    } else if m < 0 {
        -3
    } else if n < 0 {
        -4
    } else if k < 0 {
        -5
    } else if lda < rows_a.max(1) {
        -8
    } else if ldb < rows_b.max(1) {
        -10
    } else if ldc < m.max(1) {
        -13
    } else if a_len < footprint(rows_a, cols_a, lda) {
        -7
    } else if b_len < footprint(rows_b, cols_b, ldb) {
        -9
    } else if c_len < footprint(m, n, ldc) {
        -12
    } else {
        0
    }
}

pub(crate) fn check_dgetrf(m: i32, n: i32, a_len: usize, lda: i32, ipiv_len: usize) -> i32 {
    if m < 0 {
        -1
    } else if n < 0 {
        -2
    } else if lda < m.max(1) {
        -4
    } else if a_len < footprint(m, n, lda) {
        -3
    } else if ipiv_len < m.min(n) as usize {
        -5
    } else {
        0
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn check_dgetrs(
    trans: u8,
    n: i32,
    nrhs: i32,
    a_len: usize,
    lda: i32,
    ipiv_len: usize,
    b_len: usize,
    ldb: i32,
) -> i32 {
    if !is_trans_flag(trans) {
        -1
    } else if n < 0 {
        -2
    } else if nrhs < 0 {
        -3
    } else if lda < n.max(1) {
        -5
    } else if ldb < n.max(1) {
        -8
    } else if a_len < footprint(n, n, lda) {
        -4
    } else if ipiv_len < n as usize {
        -6
    } else if b_len < footprint(n, nrhs, ldb) {
        -7
    } else {
        0
    }
}

pub(crate) fn check_dgetri(
    n: i32,
    a_len: usize,
    lda: i32,
    ipiv_len: usize,
    work_len: usize,
    lwork: i32,
) -> i32 {
    let minimum = n.max(1) as usize;
    let (lwork_ok, work_ok) = workspace_ok(lwork, minimum, work_len);
    if n < 0 {
        -1
    } else if lda < n.max(1) {
        -3
    } else if !lwork_ok {
        -6
    } else if a_len < footprint(n, n, lda) {
        -2
    } else if ipiv_len < n as usize {
        -4
    } else if !work_ok {
        -5
    } else {
        0
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn check_dgeqrf(
    m: i32,
    n: i32,
    a_len: usize,
    lda: i32,
    tau_len: usize,
    work_len: usize,
    lwork: i32,
) -> i32 {
    let minimum = n.max(1) as usize;
    let (lwork_ok, work_ok) = workspace_ok(lwork, minimum, work_len);
    if m < 0 {
        -1
    } else if n < 0 {
        -2
    } else if lda < m.max(1) {
        -4
    } else if !lwork_ok {
        -7
    } else if a_len < footprint(m, n, lda) {
        -3
    } else if tau_len < m.min(n).max(0) as usize {
        -5
    } else if !work_ok {
        -6
    } else {
        0
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn check_dorgqr(
    m: i32,
    n: i32,
    k: i32,
    a_len: usize,
    lda: i32,
    tau_len: usize,
    work_len: usize,
    lwork: i32,
) -> i32 {
    let minimum = n.max(1) as usize;
    let (lwork_ok, work_ok) = workspace_ok(lwork, minimum, work_len);
    if m < 0 {
        -1
    } else if n < 0 || n > m {
        -2
    } else if k < 0 || k > n {
        -3
    } else if lda < m.max(1) {
        -5
    } else if !lwork_ok {
        -8
    } else if a_len < footprint(m, n, lda) {
        -4
    } else if tau_len < k as usize {
        -6
    } else if !work_ok {
        -7
    } else {
        0
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn check_dgesdd(
    jobz: u8,
    m: i32,
    n: i32,
    a_len: usize,
    lda: i32,
    s_len: usize,
    u_len: usize,
    ldu: i32,
    vt_len: usize,
    ldvt: i32,
    work_len: usize,
    lwork: i32,
    iwork_len: usize,
) -> i32 {
    let job = jobz.to_ascii_uppercase();
    let mn = m.min(n).max(0);
    let (u_shape, vt_shape) = match job {
        JOB_ALL => ((m, m), (n, n)),
        JOB_SMALL => ((m, mn), (mn, n)),
        _ => ((0, 0), (0, 0)),
    };
    let (lwork_ok, work_ok) = workspace_ok(lwork, dgesdd_min_lwork(job, m, n), work_len);
    if !matches!(job, JOB_ALL | JOB_SMALL | JOB_NONE) {
        -1
    } else if m < 0 {
        -2
    } else if n < 0 {
        -3
    } else if lda < m.max(1) {
        -5
    } else if ldu < 1 || (job != JOB_NONE && ldu < m) {
        -8
    } else if ldvt < 1 || (job != JOB_NONE && ldvt < vt_shape.0) {
        -10
    } else if !lwork_ok {
        -12
    } else if a_len < footprint(m, n, lda) {
        -4
    } else if s_len < mn as usize {
        -6
    } else if u_len < footprint(u_shape.0, u_shape.1, ldu) {
        -7
    } else if vt_len < footprint(vt_shape.0, vt_shape.1, ldvt) {
        -9
    } else if !work_ok {
        -11
    } else if iwork_len < 8 * mn as usize {
        -13
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_honours_leading_dimension() {
        assert_eq!(footprint(3, 2, 5), 8);
        assert_eq!(footprint(0, 4, 1), 0);
        assert_eq!(footprint(2, 0, 2), 0);
    }

    #[test]
    fn gemm_arguments_are_numbered_like_xerbla() {
        assert_eq!(check_dgemm(b'X', b'N', 2, 2, 2, 4, 2, 4, 2, 4, 2), -1);
        assert_eq!(check_dgemm(b'N', b'N', 2, 2, 2, 4, 1, 4, 2, 4, 2), -8);
        assert_eq!(check_dgemm(b'N', b'N', 2, 2, 2, 3, 2, 4, 2, 4, 2), -7);
        assert_eq!(check_dgemm(b'T', b'n', 2, 3, 4, 8, 4, 12, 4, 6, 2), 0);
    }

    #[test]
    fn workspace_queries_skip_the_size_check() {
        assert_eq!(check_dgeqrf(4, 3, 12, 4, 3, 1, WORKSPACE_QUERY), 0);
        assert_eq!(check_dgeqrf(4, 3, 12, 4, 3, 1, 1), -7);
        assert_eq!(check_dgeqrf(4, 3, 12, 4, 3, 2, 3), -6);
    }

    #[test]
    fn gesdd_minimum_workspace() {
        assert_eq!(dgesdd_min_lwork(JOB_SMALL, 4, 3), 27 + 48);
        assert_eq!(dgesdd_min_lwork(JOB_NONE, 4, 3), 9 + 21);
        assert_eq!(dgesdd_min_lwork(JOB_ALL, 4, 3), 36 + 18 + 4);
        assert_eq!(dgesdd_min_lwork(JOB_SMALL, 0, 3), 1);
    }

    #[test]
    fn gesdd_rejects_short_iwork() {
        let lwork = dgesdd_min_lwork(JOB_SMALL, 4, 3) as i32;
        let ok = check_dgesdd(b'S', 4, 3, 12, 4, 3, 12, 4, 9, 3, lwork as usize, lwork, 24);
        assert_eq!(ok, 0);
        let short = check_dgesdd(b'S', 4, 3, 12, 4, 3, 12, 4, 9, 3, lwork as usize, lwork, 23);
        assert_eq!(short, -13);
    }
}
