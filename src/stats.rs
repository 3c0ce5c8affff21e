//! Descriptive statistics over small numeric samples
//!
//! Conventions follow numpy/scipy defaults: population variance (ddof 0),
//! linear interpolation for percentiles, natural-log entropy of a sample
//! normalized to sum 1, biased skewness and Fisher kurtosis.
//!
//! Where scipy would return NaN or infinity (zero variance, a degenerate
//! ANOVA) these functions return 0 so that feature vectors stay finite.

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population variance
pub fn variance(xs: &[f64]) -> f64 {
    central_moment(xs, 2)
}

pub fn std_dev(xs: &[f64]) -> f64 {
    variance(xs).sqrt()
}

pub fn median(xs: &[f64]) -> f64 {
    percentile(xs, 50.0)
}

/// Percentile `q` in [0, 100] with linear interpolation between order statistics
pub fn percentile(xs: &[f64], q: f64) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Interquartile range
pub fn iqr(xs: &[f64]) -> f64 {
    percentile(xs, 75.0) - percentile(xs, 25.0)
}

/// Shannon entropy (nats) of `xs` taken as unnormalized probabilities
pub fn entropy(xs: &[f64]) -> f64 {
    let total: f64 = xs.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    -xs.iter()
        .filter(|&&x| x > 0.0)
        .map(|&x| {
            let p = x / total;
            p * p.ln()
        })
        .sum::<f64>()
}

/// Biased sample skewness, m3 / m2^1.5
pub fn skewness(xs: &[f64]) -> f64 {
    let m2 = central_moment(xs, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    central_moment(xs, 3) / m2.powf(1.5)
}

/// Fisher (excess) kurtosis, m4 / m2^2 - 3
pub fn kurtosis(xs: &[f64]) -> f64 {
    let m2 = central_moment(xs, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    central_moment(xs, 4) / (m2 * m2) - 3.0
}

fn central_moment(xs: &[f64], order: i32) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mu = mean(xs);
    xs.iter().map(|&x| (x - mu).powi(order)).sum::<f64>() / xs.len() as f64
}

/// One-way ANOVA F statistic across `groups`.
///
/// Returns 0 when F is undefined: fewer than two groups, no residual degrees
/// of freedom, or zero within-group variance.
pub fn f_oneway(groups: &[&[f64]]) -> f64 {
    let k = groups.len();
    let n: usize = groups.iter().map(|g| g.len()).sum();
    if k < 2 || n <= k || groups.iter().any(|g| g.is_empty()) {
        return 0.0;
    }

    let grand = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / n as f64;
    let mut between = 0.0;
    let mut within = 0.0;
    for group in groups {
        let mu = mean(group);
        between += group.len() as f64 * (mu - grand).powi(2);
        within += group.iter().map(|&x| (x - mu).powi(2)).sum::<f64>();
    }
    if within == 0.0 {
        return 0.0;
    }

    let df_between = (k - 1) as f64;
    let df_within = (n - k) as f64;
    (between / df_between) / (within / df_within)
}
