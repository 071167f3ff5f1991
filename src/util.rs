use crate::priv_prelude::*;

/// Converts a sampled delay in seconds to a `Duration`. Negative and NaN delays become zero,
/// delays too large to represent saturate.
pub(crate) fn delay_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) => duration,
        Err(_) => Duration::MAX,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clamps_unrepresentable_delays() {
        assert_eq!(delay_from_secs(-1.5), Duration::ZERO);
        assert_eq!(delay_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(delay_from_secs(f64::INFINITY), Duration::MAX);
        assert_eq!(delay_from_secs(0.25), Duration::from_millis(250));
    }
}
