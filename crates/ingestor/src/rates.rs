//! C4: derives per-second rates from pairs of cumulative-counter samples.
//! Pure and synchronous — no suspension points, per spec.md §5.

use chrono::{DateTime, Utc};

/// One derived rate, or `None` when the window is unusable.
pub fn derive(
    prior: Option<i64>,
    new: Option<i64>,
    prior_at: DateTime<Utc>,
    new_at: DateTime<Utc>,
) -> Option<f64> {
    let (prior, new) = (prior?, new?);
    let delta = new.checked_sub(prior)?;
    if delta < 0 {
        return None;
    }

    let delta_t = (new_at - prior_at).num_seconds();
    if delta_t <= 5 {
        return None;
    }

    let rate = delta as f64 / delta_t as f64;
    if rate.is_finite() {
        Some(rate)
    } else {
        None
    }
}

/// Rates for the three monotonic counters a probe reports, against the most
/// recent prior sample. `None` for `prior` (first sighting) yields all-null
/// rates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivedRates {
    pub packets_in_per_sec: Option<f64>,
    pub packets_out_per_sec: Option<f64>,
}

pub fn derive_all(
    prior: Option<&ingestor_sql::stats::StatsSample>,
    new_at: DateTime<Utc>,
    new_packets_received: Option<i64>,
    new_packets_sent: Option<i64>,
) -> DerivedRates {
    let (prior_at, prior_received, prior_sent) = match prior {
        Some(p) => (
            p.timestamp,
            p.packets_received_cumulative,
            p.packets_sent_cumulative,
        ),
        None => return DerivedRates::default(),
    };

    DerivedRates {
        packets_in_per_sec: derive(prior_received, new_packets_received, prior_at, new_at),
        packets_out_per_sec: derive(prior_sent, new_packets_sent, prior_at, new_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(offset_secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::seconds(offset_secs)
    }

    #[test]
    fn sixty_second_window_derives_expected_rate() {
        let rate = derive(Some(100), Some(700), at(0), at(60));
        assert_eq!(rate, Some(10.0));
    }

    #[test]
    fn window_of_five_seconds_or_less_is_null() {
        assert_eq!(derive(Some(0), Some(50), at(0), at(5)), None);
        assert_eq!(derive(Some(0), Some(50), at(0), at(1)), None);
    }

    #[test]
    fn negative_delta_is_null_not_zero() {
        assert_eq!(derive(Some(500), Some(100), at(0), at(60)), None);
    }

    #[test]
    fn missing_prior_is_null() {
        assert_eq!(derive(None, Some(50), at(0), at(60)), None);
    }

    #[test]
    fn no_prior_sample_yields_all_null_rates() {
        let rates = derive_all(None, at(60), Some(700), Some(350));
        assert_eq!(rates.packets_in_per_sec, None);
        assert_eq!(rates.packets_out_per_sec, None);
    }
}
