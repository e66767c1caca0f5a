use crate::action::ResourceRequest;
use crate::error::{GaleError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Normal, Pareto, Uniform};
use std::fmt;

pub const DEFAULT_PARETO_SCALE: f64 = 1.0;
pub const DEFAULT_PARETO_SHAPE: f64 = 0.1;

/// Standard deviation used by the normal distribution. Narrow on purpose:
/// it concentrates the firing mass around the middle instances.
pub const NORMAL_SIGMA: f64 = 4.0;

// ---------------------------------------------------------------------------
// DistributionSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionName {
    Constant,
    Uniform,
    Normal,
    Pareto,
    /// Not a real distribution: points to an already evaluated slice stored
    /// on the owner's status.
    Default,
}

impl fmt::Display for DistributionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DistributionName::Constant => "constant",
            DistributionName::Uniform => "uniform",
            DistributionName::Normal => "normal",
            DistributionName::Pareto => "pareto",
            DistributionName::Default => "default",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParetoParams {
    pub scale: f64,
    pub shape: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSpec {
    pub name: DistributionName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pareto: Option<ParetoParams>,
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generates the normalized weight vector for `samples` instances.
///
/// The continuous densities are sampled at the integer points 1..=samples
/// (the zero point is discarded; it sits outside the support of the uniform
/// density and would skew the normalization). Deterministic, no RNG.
///
/// `constant` is intentionally unnormalized: every instance gets the full
/// amount. `default` is rejected here; use [`resolve_probability_slice`]
/// when a cached slice may exist.
pub fn generate_probability_slice(
    samples: u64,
    spec: &DistributionSpec,
) -> Result<ProbabilitySlice> {
    if samples == 0 {
        return Err(GaleError::Distribution(
            "cannot distribute over zero samples".to_string(),
        ));
    }

    match spec.name {
        DistributionName::Constant => Ok(ProbabilitySlice(vec![1.0; samples as usize])),

        DistributionName::Uniform => {
            if samples == 1 {
                return Ok(ProbabilitySlice(vec![1.0]));
            }
            let dist = Uniform::new(1.0, samples as f64)
                .map_err(|err| GaleError::Distribution(err.to_string()))?;
            normalize(sample_density(samples, |x| dist.pdf(x)))
        }

        DistributionName::Normal => {
            // Integer division on the midpoint, matching the instance index
            // the mass should peak at.
            let mu = (1 + samples / 2) as f64;
            let dist = Normal::new(mu, NORMAL_SIGMA)
                .map_err(|err| GaleError::Distribution(err.to_string()))?;
            normalize(sample_density(samples, |x| dist.pdf(x)))
        }

        DistributionName::Pareto => {
            let params = spec.pareto.unwrap_or(ParetoParams {
                scale: DEFAULT_PARETO_SCALE,
                shape: DEFAULT_PARETO_SHAPE,
            });
            let dist = Pareto::new(params.scale, params.shape)
                .map_err(|err| GaleError::Distribution(err.to_string()))?;
            normalize(sample_density(samples, |x| dist.pdf(x)))
        }

        DistributionName::Default => Err(GaleError::Distribution(
            "'default' points to an already evaluated distribution and must be resolved from the owner's status".to_string(),
        )),
    }
}

/// Like [`generate_probability_slice`], but honors the `default` forwarding
/// rule: read the previously computed slice off the owner's status.
pub fn resolve_probability_slice(
    samples: u64,
    spec: &DistributionSpec,
    cached: Option<&ProbabilitySlice>,
) -> Result<ProbabilitySlice> {
    match spec.name {
        DistributionName::Default => cached.cloned().ok_or_else(|| {
            GaleError::Distribution(
                "distribution 'default' referenced, but no evaluated slice is present on the status".to_string(),
            )
        }),
        _ => generate_probability_slice(samples, spec),
    }
}

fn sample_density(samples: u64, pdf: impl Fn(f64) -> f64) -> Vec<f64> {
    (1..=samples).map(|x| pdf(x as f64)).collect()
}

/// Divide by the sum and round to two decimals. The quantization is lossy by
/// design: the slice doubles as a human-auditable percentage table, so
/// `sum(out)` is only guaranteed within `samples * 0.005` of 1.
fn normalize(weights: Vec<f64>) -> Result<ProbabilitySlice> {
    let sum: f64 = weights.iter().sum();
    if sum == 0.0 {
        return Err(GaleError::Distribution(
            "degenerate distribution: all sampled densities are zero".to_string(),
        ));
    }

    Ok(ProbabilitySlice(
        weights
            .into_iter()
            .map(|w| (100.0 * w / sum).round() / 100.0)
            .collect(),
    ))
}

// ---------------------------------------------------------------------------
// ProbabilitySlice
// ---------------------------------------------------------------------------

/// Ordered weights, index i belonging to the i-th instance. Cached on the
/// owning status because reconciliation may restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbabilitySlice(pub Vec<f64>);

impl ProbabilitySlice {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn apply_to_float64(&self, total: f64) -> Vec<f64> {
        self.0.iter().map(|w| w * total).collect()
    }

    pub fn apply_to_int64(&self, total: i64) -> Vec<i64> {
        self.0
            .iter()
            .map(|w| (w * total as f64).round() as i64)
            .collect()
    }

    /// Projects the weights onto `[start, start + total]` as absolute
    /// timestamps. Intervals accumulate, so the output is monotone.
    pub fn apply_to_timeline(&self, start: DateTime<Utc>, total: Duration) -> Timeline {
        let total_seconds = total.num_seconds() as f64;
        let mut progress = start;

        Timeline(
            self.0
                .iter()
                .map(|w| {
                    progress += Duration::seconds((w * total_seconds).round() as i64);
                    progress
                })
                .collect(),
        )
    }

    pub fn apply_to_resources(&self, total: ResourceRequest) -> Vec<ResourceRequest> {
        self.0
            .iter()
            .map(|w| ResourceRequest {
                cpu_millis: (w * total.cpu_millis as f64).round() as i64,
                memory_mb: (w * total.memory_mb as f64).round() as i64,
                storage_mb: (w * total.storage_mb as f64).round() as i64,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Absolute activation times for the instances of a scheduled action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline(pub Vec<DateTime<Utc>>);

impl Timeline {
    /// The next activation time strictly later than `after`. Linear scan:
    /// the instance count is expected to be small.
    pub fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.0.iter().find(|t| **t > after).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Timeline ===")?;
        for t in &self.0 {
            writeln!(f, " * {}", t.to_rfc3339())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spec(name: DistributionName) -> DistributionSpec {
        DistributionSpec { name, pareto: None }
    }

    #[test]
    fn constant_is_unnormalized() {
        let slice = generate_probability_slice(5, &spec(DistributionName::Constant)).unwrap();
        assert_eq!(slice.0, vec![1.0; 5]);
    }

    #[test]
    fn uniform_splits_evenly() {
        let slice = generate_probability_slice(5, &spec(DistributionName::Uniform)).unwrap();
        assert_eq!(slice.0, vec![0.2, 0.2, 0.2, 0.2, 0.2]);
    }

    #[test]
    fn uniform_single_sample() {
        let slice = generate_probability_slice(1, &spec(DistributionName::Uniform)).unwrap();
        assert_eq!(slice.0, vec![1.0]);
    }

    #[test]
    fn uniform_sum_stays_within_rounding_budget() {
        for samples in [1u64, 2, 3, 7, 10, 50, 100, 500, 1000] {
            let slice =
                generate_probability_slice(samples, &spec(DistributionName::Uniform)).unwrap();
            let sum: f64 = slice.0.iter().sum();
            let budget = samples as f64 * 0.005;
            assert!(
                (sum - 1.0).abs() <= budget,
                "samples={samples} sum={sum} budget={budget}"
            );
        }
    }

    #[test]
    fn normal_peaks_at_the_middle() {
        let slice = generate_probability_slice(9, &spec(DistributionName::Normal)).unwrap();
        let mid = slice.0[4];
        assert!(slice.0.iter().all(|w| *w <= mid));
        assert!(slice.0[0] < mid);
    }

    #[test]
    fn pareto_is_front_loaded() {
        let slice = generate_probability_slice(10, &spec(DistributionName::Pareto)).unwrap();
        assert!(slice.0[0] > slice.0[9]);
        for pair in slice.0.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn default_requires_cached_slice() {
        let err = generate_probability_slice(5, &spec(DistributionName::Default));
        assert!(err.is_err());

        let cached = ProbabilitySlice(vec![0.5, 0.5]);
        let resolved =
            resolve_probability_slice(2, &spec(DistributionName::Default), Some(&cached)).unwrap();
        assert_eq!(resolved, cached);

        let absent = resolve_probability_slice(2, &spec(DistributionName::Default), None);
        assert!(absent.is_err());
    }

    #[test]
    fn zero_samples_rejected() {
        assert!(generate_probability_slice(0, &spec(DistributionName::Uniform)).is_err());
    }

    #[test]
    fn timeline_is_monotone_and_bounded() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let total = Duration::hours(1);
        let slice = generate_probability_slice(5, &spec(DistributionName::Uniform)).unwrap();
        let timeline = slice.apply_to_timeline(start, total);

        for pair in timeline.0.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!(timeline.0[4] <= start + total + Duration::seconds(1));
    }

    #[test]
    fn timeline_next_scans_forward() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let slice = ProbabilitySlice(vec![0.5, 0.5]);
        let timeline = slice.apply_to_timeline(start, Duration::minutes(10));

        let first = timeline.next(start).unwrap();
        assert_eq!(first, start + Duration::minutes(5));
        let second = timeline.next(first).unwrap();
        assert_eq!(second, start + Duration::minutes(10));
        assert!(timeline.next(second).is_none());
    }

    #[test]
    fn int64_projection_rounds() {
        let slice = ProbabilitySlice(vec![0.33, 0.33, 0.33]);
        assert_eq!(slice.apply_to_int64(100), vec![33, 33, 33]);
    }

    #[test]
    fn resource_projection_scales_each_axis() {
        let slice = ProbabilitySlice(vec![0.25, 0.75]);
        let total = ResourceRequest {
            cpu_millis: 4000,
            memory_mb: 8192,
            storage_mb: 0,
        };
        let shares = slice.apply_to_resources(total);
        assert_eq!(shares[0].cpu_millis, 1000);
        assert_eq!(shares[1].cpu_millis, 3000);
        assert_eq!(shares[0].memory_mb, 2048);
        assert_eq!(shares[1].storage_mb, 0);
    }
}
