#![cfg(any(feature = "cpu-openblas", feature = "cpu-mkl"))]

//! LAPACK and CBLAS from the linked system library. Arguments are checked
//! on the Rust side before each call so a bad length can never reach the
//! Fortran code.

use super::ffi::{self, LapackProvider, WORKSPACE_QUERY};
use std::env;
use std::sync::OnceLock;

#[cfg(all(feature = "cpu-openblas", feature = "cpu-mkl"))]
compile_error!("Enable only one of cpu-openblas or cpu-mkl at a time");

/// Thread count applied to the BLAS library when it has not been set
/// through its own variable.
pub const THREADS_ENV: &str = "DENSEMAT_NATIVE_THREADS";

/// Environment knobs of the linked library.
struct LibraryEnv {
    name: &'static str,
    threads: &'static str,
    kernel: &'static str,
    avx512: &'static str,
    avx2: &'static str,
}

#[cfg(feature = "cpu-openblas")]
const LIBRARY: LibraryEnv = LibraryEnv {
    name: "openblas",
    threads: "OPENBLAS_NUM_THREADS",
    kernel: "OPENBLAS_CORETYPE",
    avx512: "SKYLAKEX",
    avx2: "HASWELL",
};

#[cfg(feature = "cpu-mkl")]
const LIBRARY: LibraryEnv = LibraryEnv {
    name: "mkl",
    threads: "MKL_NUM_THREADS",
    kernel: "MKL_ENABLE_INSTRUCTIONS",
    avx512: "AVX512",
    avx2: "AVX2",
};

static CONFIGURED: OnceLock<()> = OnceLock::new();

fn ensure_configured() {
    CONFIGURED.get_or_init(configure_library);
}

/// Seeds the library's own variables before its first call. Values the
/// user already exported win.
fn configure_library() {
    let set_default = |key: &str, value: &str| {
        if env::var_os(key).is_none() {
            env::set_var(key, value);
        }
    };
    if let Some(threads) = thread_override() {
        set_default(LIBRARY.threads, &threads.to_string());
    }
    if let Some(kernel) = kernel_hint() {
        set_default(LIBRARY.kernel, kernel);
    }
    log::debug!("native provider configured: {}", LIBRARY.name);
}

fn thread_override() -> Option<usize> {
    env::var(THREADS_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|&threads| threads > 0)
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn kernel_hint() -> Option<&'static str> {
    if std::arch::is_x86_feature_detected!("avx512f") {
        Some(LIBRARY.avx512)
    } else if std::arch::is_x86_feature_detected!("avx2") {
        Some(LIBRARY.avx2)
    } else {
        None
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn kernel_hint() -> Option<&'static str> {
    None
}

fn cblas_transpose(flag: u8) -> cblas::Transpose {
    if ffi::is_transposed(flag) {
        cblas::Transpose::Ordinary
    } else {
        cblas::Transpose::None
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemLapack;

impl SystemLapack {
    pub fn new() -> Self {
        ensure_configured();
        SystemLapack
    }
}

impl LapackProvider for SystemLapack {
    fn name(&self) -> &'static str {
        LIBRARY.name
    }

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
    ) {
        *info = ffi::check_dgemm(
            trans_a,
            trans_b,
            m,
            n,
            k,
            a.len(),
            lda,
            b.len(),
            ldb,
            c.len(),
            ldc,
        );
        if *info != 0 || m == 0 || n == 0 {
            return;
        }
        ensure_configured();
        unsafe {
            cblas::dgemm(
                cblas::Layout::ColumnMajor,
                cblas_transpose(trans_a),
                cblas_transpose(trans_b),
                m,
                n,
                k,
                alpha,
                a,
                lda,
                b,
                ldb,
                beta,
                c,
                ldc,
            );
        }
    }

    fn dgetrf(&self, m: i32, n: i32, a: &mut [f64], lda: i32, ipiv: &mut [i32], info: &mut i32) {
        *info = ffi::check_dgetrf(m, n, a.len(), lda, ipiv.len());
        if *info != 0 {
            return;
        }
        ensure_configured();
        unsafe { lapack::dgetrf(m, n, a, lda, ipiv, info) }
    }

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
    ) {
        *info = ffi::check_dgetrs(trans, n, nrhs, a.len(), lda, ipiv.len(), b.len(), ldb);
        if *info != 0 {
            return;
        }
        ensure_configured();
        unsafe { lapack::dgetrs(trans, n, nrhs, a, lda, ipiv, b, ldb, info) }
    }

    fn dgetri(
        &self,
        n: i32,
        a: &mut [f64],
        lda: i32,
        ipiv: &[i32],
        work: &mut [f64],
        lwork: i32,
        info: &mut i32,
    ) {
        *info = ffi::check_dgetri(n, a.len(), lda, ipiv.len(), work.len(), lwork);
        if *info != 0 {
            return;
        }
        ensure_configured();
        unsafe { lapack::dgetri(n, a, lda, ipiv, work, lwork, info) }
    }

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
    ) {
        *info = ffi::check_dgeqrf(m, n, a.len(), lda, tau.len(), work.len(), lwork);
        if *info != 0 {
            return;
        }
        ensure_configured();
        unsafe { lapack::dgeqrf(m, n, a, lda, tau, work, lwork, info) }
    }

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
    ) {
        *info = ffi::check_dorgqr(m, n, k, a.len(), lda, tau.len(), work.len(), lwork);
        if *info != 0 {
            return;
        }
        ensure_configured();
        unsafe { lapack::dorgqr(m, n, k, a, lda, tau, work, lwork, info) }
    }

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
    ) {
        *info = ffi::check_dgesdd(
            jobz,
            m,
            n,
            a.len(),
            lda,
            s.len(),
            u.len(),
            ldu,
            vt.len(),
            ldvt,
            work.len(),
            lwork,
            iwork.len(),
        );
        if *info != 0 {
            return;
        }
        if lwork == WORKSPACE_QUERY {
            // Never hand back less than the documented minimum.
            let mut optimal = [0.0];
            ensure_configured();
            unsafe {
                lapack::dgesdd(
                    jobz, m, n, a, lda, s, u, ldu, vt, ldvt, &mut optimal, lwork, iwork, info,
                )
            }
            work[0] = optimal[0].max(ffi::dgesdd_min_lwork(jobz, m, n) as f64);
            return;
        }
        ensure_configured();
        unsafe {
            lapack::dgesdd(
                jobz, m, n, a, lda, s, u, ldu, vt, ldvt, work, lwork, iwork, info,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::EmulatedLapack;

    #[test]
    fn rejects_short_buffers_before_calling_out() {
        let mut info = 0;
        let mut a = [0.0; 3];
        let mut ipiv = [0; 2];
        SystemLapack::new().dgetrf(2, 2, &mut a, 2, &mut ipiv, &mut info);
        assert_eq!(info, -3);
    }

    #[test]
    fn lu_matches_emulation() {
        let source = [4.0, 6.0, 3.0, 3.0];
        let mut system = source;
        let mut emulated = source;
        let (mut ipiv_s, mut ipiv_e) = ([0; 2], [0; 2]);
        let (mut info_s, mut info_e) = (0, 0);
        SystemLapack::new().dgetrf(2, 2, &mut system, 2, &mut ipiv_s, &mut info_s);
        EmulatedLapack.dgetrf(2, 2, &mut emulated, 2, &mut ipiv_e, &mut info_e);
        assert_eq!((info_s, ipiv_s), (info_e, ipiv_e));
        for (x, y) in system.iter().zip(&emulated) {
            assert!((x - y).abs() < 1e-12);
        }
    }
}
