use crate::engine::SvdDecomposition;
use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// Implicit QR sweeps allowed per singular value before giving up.
pub const MAX_STEPS_PER_VALUE: usize = 75;

/// Economy SVD by Householder bidiagonalization followed by implicit shifted
/// QR on the bidiagonal. Wide input is handled through its transpose.
pub(crate) fn factor(a: Matrix) -> Result<SvdDecomposition> {
    let (m, n) = a.shape();
    if m == 0 || n == 0 {
        return Ok(SvdDecomposition {
            u: Matrix::zeros(m, 0),
            s: Vec::new(),
            vt: Matrix::zeros(0, n),
        });
    }
    if m < n {
        let tall = golub_kahan(a.transpose())?;
        return Ok(SvdDecomposition {
            u: tall.v,
            s: tall.s,
            vt: tall.u.transpose(),
        });
    }
    let tall = golub_kahan(a)?;
    Ok(SvdDecomposition {
        u: tall.u,
        s: tall.s,
        vt: tall.v.transpose(),
    })
}

struct TallSvd {
    u: Matrix,
    s: Vec<f64>,
    v: Matrix,
}

/// `x_a <- cs*x_a + sn*x_b`, `x_b <- -sn*x_a + cs*x_b` over two columns.
fn rotate_columns(x: &mut Matrix, a: usize, b: usize, cs: f64, sn: f64) {
    for i in 0..x.rows() {
        let (xa, xb) = (x.get(i, a), x.get(i, b));
        x.set(i, a, cs * xa + sn * xb);
        x.set(i, b, -sn * xa + cs * xb);
    }
}

fn swap_columns(x: &mut Matrix, a: usize, b: usize) {
    for i in 0..x.rows() {
        let t = x.get(i, a);
        x.set(i, a, x.get(i, b));
        x.set(i, b, t);
    }
}

/// Requires `m >= n >= 1`.
fn golub_kahan(mut a: Matrix) -> Result<TallSvd> {
    let (m, n) = a.shape();
    let mut s = vec![0.0f64; n];
    let mut e = vec![0.0f64; n];
    let mut work = vec![0.0f64; m];
    let mut u = Matrix::zeros(m, n);
    let mut v = Matrix::zeros(n, n);

    // Reduce to bidiagonal form, diagonal in s and superdiagonal in e.
    let nct = (m - 1).min(n);
    let nrt = n.saturating_sub(2).min(m);
    for k in 0..nct.max(nrt) {
        if k < nct {
            let mut norm = 0.0f64;
            for i in k..m {
                norm = norm.hypot(a.get(i, k));
            }
            if norm != 0.0 {
                if a.get(k, k) < 0.0 {
                    norm = -norm;
                }
                for i in k..m {
                    a.set(i, k, a.get(i, k) / norm);
                }
                a.add(k, k, 1.0);
            }
            s[k] = -norm;
        }
        for j in (k + 1)..n {
            if k < nct && s[k] != 0.0 {
                let mut t = 0.0;
                for i in k..m {
                    t += a.get(i, k) * a.get(i, j);
                }
                t = -t / a.get(k, k);
                for i in k..m {
                    a.add(i, j, t * a.get(i, k));
                }
            }
            e[j] = a.get(k, j);
        }
        if k < nct {
            for i in k..m {
                u.set(i, k, a.get(i, k));
            }
        }
        if k < nrt {
            let mut norm = 0.0f64;
            for value in &e[(k + 1)..n] {
                norm = norm.hypot(*value);
            }
            if norm != 0.0 {
                if e[k + 1] < 0.0 {
                    norm = -norm;
                }
                for value in &mut e[(k + 1)..n] {
                    *value /= norm;
                }
                e[k + 1] += 1.0;
            }
            e[k] = -norm;
            if k + 1 < m && e[k] != 0.0 {
                work[(k + 1)..m].fill(0.0);
                for j in (k + 1)..n {
                    for i in (k + 1)..m {
                        work[i] += e[j] * a.get(i, j);
                    }
                }
                for j in (k + 1)..n {
                    let t = -e[j] / e[k + 1];
                    for i in (k + 1)..m {
                        a.add(i, j, t * work[i]);
                    }
                }
            }
            for i in (k + 1)..n {
                v.set(i, k, e[i]);
            }
        }
    }

    let mut p = n;
    if nct < n {
        s[nct] = a.get(nct, nct);
    }
    if nrt + 1 < p {
        e[nrt] = a.get(nrt, p - 1);
    }
    e[p - 1] = 0.0;

    // Accumulate U.
    for j in nct..n {
        for i in 0..m {
            u.set(i, j, 0.0);
        }
        u.set(j, j, 1.0);
    }
    for k in (0..nct).rev() {
        if s[k] != 0.0 {
            for j in (k + 1)..n {
                let mut t = 0.0;
                for i in k..m {
                    t += u.get(i, k) * u.get(i, j);
                }
                t = -t / u.get(k, k);
                for i in k..m {
                    u.add(i, j, t * u.get(i, k));
                }
            }
            for i in k..m {
                u.set(i, k, -u.get(i, k));
            }
            u.add(k, k, 1.0);
            for i in 0..k {
                u.set(i, k, 0.0);
            }
        } else {
            for i in 0..m {
                u.set(i, k, 0.0);
            }
            u.set(k, k, 1.0);
        }
    }

    // Accumulate V.
    for k in (0..n).rev() {
        if k < nrt && e[k] != 0.0 {
            for j in (k + 1)..n {
                let mut t = 0.0;
                for i in (k + 1)..n {
                    t += v.get(i, k) * v.get(i, j);
                }
                t = -t / v.get(k + 1, k);
                for i in (k + 1)..n {
                    v.add(i, j, t * v.get(i, k));
                }
            }
        }
        for i in 0..n {
            v.set(i, k, 0.0);
        }
        v.set(k, k, 1.0);
    }

    let eps = f64::EPSILON;
    let tiny = 2.0f64.powi(-966);
    let mut steps = 0usize;

    while p > 0 {
        // Find the largest k < p-1 with a negligible e[k]; -1 when none.
        let last = p as isize - 2;
        let mut k = last;
        while k >= 0 {
            let ku = k as usize;
            if e[ku].abs() <= tiny + eps * (s[ku].abs() + s[ku + 1].abs()) {
                e[ku] = 0.0;
                break;
            }
            k -= 1;
        }

        let case = if k == last {
            Sweep::Converged
        } else {
            let mut ks = p as isize - 1;
            while ks > k {
                let ksu = ks as usize;
                let mut t = e[ksu].abs();
                if ks != k + 1 {
                    t += e[ksu - 1].abs();
                }
                if s[ksu].abs() <= tiny + eps * t {
                    s[ksu] = 0.0;
                    break;
                }
                ks -= 1;
            }
            if ks == k {
                Sweep::QrStep
            } else if ks == p as isize - 1 {
                Sweep::Deflate
            } else {
                k = ks;
                Sweep::Split
            }
        };
        let k = (k + 1) as usize;

        match case {
            Sweep::Deflate => {
                let mut f = e[p - 2];
                e[p - 2] = 0.0;
                for j in (k..=(p - 2)).rev() {
                    let t = s[j].hypot(f);
                    let (cs, sn) = (s[j] / t, f / t);
                    s[j] = t;
                    if j != k {
                        f = -sn * e[j - 1];
                        e[j - 1] *= cs;
                    }
                    rotate_columns(&mut v, j, p - 1, cs, sn);
                }
            }
            Sweep::Split => {
                let mut f = e[k - 1];
                e[k - 1] = 0.0;
                for j in k..p {
                    let t = s[j].hypot(f);
                    let (cs, sn) = (s[j] / t, f / t);
                    s[j] = t;
                    f = -sn * e[j];
                    e[j] *= cs;
                    rotate_columns(&mut u, j, k - 1, cs, sn);
                }
            }
            Sweep::QrStep => {
                let scale = s[p - 1]
                    .abs()
                    .max(s[p - 2].abs())
                    .max(e[p - 2].abs())
                    .max(s[k].abs())
                    .max(e[k].abs());
                let sp = s[p - 1] / scale;
                let spm1 = s[p - 2] / scale;
                let epm1 = e[p - 2] / scale;
                let sk = s[k] / scale;
                let ek = e[k] / scale;
                let b = ((spm1 + sp) * (spm1 - sp) + epm1 * epm1) / 2.0;
                let c = (sp * epm1) * (sp * epm1);
                let mut shift = 0.0;
                if b != 0.0 || c != 0.0 {
                    shift = (b * b + c).sqrt();
                    if b < 0.0 {
                        shift = -shift;
                    }
                    shift = c / (b + shift);
                }
                let mut f = (sk + sp) * (sk - sp) + shift;
                let mut g = sk * ek;

                for j in k..(p - 1) {
                    let t = f.hypot(g);
                    let (cs, sn) = (f / t, g / t);
                    if j != k {
                        e[j - 1] = t;
                    }
                    f = cs * s[j] + sn * e[j];
                    e[j] = cs * e[j] - sn * s[j];
                    g = sn * s[j + 1];
                    s[j + 1] *= cs;
                    rotate_columns(&mut v, j, j + 1, cs, sn);

                    let t = f.hypot(g);
                    let (cs, sn) = (f / t, g / t);
                    s[j] = t;
                    f = cs * e[j] + sn * s[j + 1];
                    s[j + 1] = -sn * e[j] + cs * s[j + 1];
                    g = sn * e[j + 1];
                    e[j + 1] *= cs;
                    if j < m - 1 {
                        rotate_columns(&mut u, j, j + 1, cs, sn);
                    }
                }
                e[p - 2] = f;

                steps += 1;
                if steps > MAX_STEPS_PER_VALUE {
                    return Err(Error::NotConverged {
                        op: "svd",
                        iterations: steps,
                    });
                }
            }
            Sweep::Converged => {
                if s[k] <= 0.0 {
                    s[k] = if s[k] < 0.0 { -s[k] } else { 0.0 };
                    for i in 0..n {
                        v.set(i, k, -v.get(i, k));
                    }
                }
                let mut k = k;
                while k + 1 < n && s[k] < s[k + 1] {
                    s.swap(k, k + 1);
                    swap_columns(&mut v, k, k + 1);
                    if k + 1 < m {
                        swap_columns(&mut u, k, k + 1);
                    }
                    k += 1;
                }
                steps = 0;
                p -= 1;
            }
        }
    }

    Ok(TallSvd { u, s, v })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sweep {
    /// `s[p-1]` is negligible, chase `e[p-2]` out of the bottom.
    Deflate,
    /// `s[k-1]` is negligible, split the problem there.
    Split,
    QrStep,
    Converged,
}
