use tessera_error::{TesseraResult, tessera_bail};

use crate::{ClosedSide, EndpointArray, EndpointScalar, EndpointType, IntervalOrderedIndex};

/// The spacing between interval endpoints: a numeric step, or a tick count
/// for temporal endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Freq {
    Int(i64),
    Float(f64),
    Ticks(i64),
}

pub const NANOS_PER_DAY: i64 = 86_400_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Domain {
    Numeric,
    Timestamp,
    Duration,
}

fn domain_of(scalar: &EndpointScalar) -> TesseraResult<Domain> {
    match scalar {
        EndpointScalar::Int(_) | EndpointScalar::Float(_) => Ok(Domain::Numeric),
        EndpointScalar::Timestamp(_) => Ok(Domain::Timestamp),
        EndpointScalar::Duration(_) => Ok(Domain::Duration),
        EndpointScalar::Na => {
            tessera_bail!(InvalidArgument: "start and end must be numeric or temporal, got NA")
        }
    }
}

fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => (0..count)
            .map(|step| start + step as f64 * (end - start) / (count - 1) as f64)
            .collect(),
    }
}

/// A fixed-frequency interval index.
///
/// Exactly three of `start`, `end`, `periods`, `freq` must be given; `freq`
/// defaults (1 for numeric, one day for temporal endpoints) when one of the
/// others is missing. `n` breaks make `n - 1` intervals, so the break count
/// is `periods + 1`.
pub fn interval_range(
    start: Option<EndpointScalar>,
    end: Option<EndpointScalar>,
    periods: Option<usize>,
    freq: Option<Freq>,
    closed: ClosedSide,
) -> TesseraResult<IntervalOrderedIndex> {
    let endpoint = start.or(end);
    let domain = match endpoint {
        Some(scalar) => domain_of(&scalar)?,
        None => Domain::Numeric,
    };
    if let (Some(s), Some(e)) = (&start, &end) {
        if domain_of(s)? != domain_of(e)? {
            tessera_bail!(MismatchedTypes: format!("{s:?}"), format!("{e:?}"));
        }
    }

    let freq = match freq {
        Some(freq) => Some(freq),
        None if periods.is_none() || start.is_none() || end.is_none() => Some(match domain {
            Domain::Numeric => Freq::Int(1),
            Domain::Timestamp | Domain::Duration => Freq::Ticks(NANOS_PER_DAY),
        }),
        None => None,
    };

    let given = [
        start.is_some(),
        end.is_some(),
        periods.is_some(),
        freq.is_some(),
    ]
    .iter()
    .filter(|&&present| present)
    .count();
    if given != 3 {
        tessera_bail!(InvalidArgument: "of the four parameters: start, end, periods, and freq, exactly three must be specified");
    }

    match domain {
        Domain::Numeric => numeric_range(start, end, periods, freq, closed),
        Domain::Timestamp | Domain::Duration => {
            temporal_range(domain, start, end, periods, freq, closed)
        }
    }
}

fn numeric_range(
    start: Option<EndpointScalar>,
    end: Option<EndpointScalar>,
    periods: Option<usize>,
    freq: Option<Freq>,
    closed: ClosedSide,
) -> TesseraResult<IntervalOrderedIndex> {
    let as_f64 = |scalar: &EndpointScalar| -> f64 {
        match scalar {
            EndpointScalar::Int(value) => *value as f64,
            EndpointScalar::Float(value) => *value,
            _ => unreachable!("domain checked"),
        }
    };
    let freq_f = match freq {
        None => None,
        Some(Freq::Int(step)) => Some(step as f64),
        Some(Freq::Float(step)) => Some(step),
        Some(Freq::Ticks(_)) => {
            tessera_bail!(MismatchedTypes: "a numeric freq", "a temporal tick freq")
        }
    };
    if freq_f.is_some_and(|step| step <= 0.0) {
        tessera_bail!(InvalidArgument: "freq must be positive");
    }

    let mut start_f = start.as_ref().map(&as_f64);
    let mut end_f = end.as_ref().map(&as_f64);

    // force consistency between start/end/freq, lowering end if freq skips it
    if let (Some(s), Some(e), Some(step)) = (start_f, end_f, freq_f) {
        end_f = Some(e - (e - s).rem_euclid(step));
    }

    let break_count = match periods {
        Some(periods) => periods + 1,
        None => {
            let (s, e, step) = (
                start_f.unwrap_or_default(),
                end_f.unwrap_or_default(),
                freq_f.unwrap_or(1.0),
            );
            (((e - s) / step).floor() as usize).saturating_add(1)
        }
    };
    match (start_f, end_f, freq_f) {
        (None, Some(e), Some(step)) => start_f = Some(e - (break_count as f64 - 1.0) * step),
        (Some(s), None, Some(step)) => end_f = Some(s + (break_count as f64 - 1.0) * step),
        _ => {}
    }

    let breaks = linspace(
        start_f.unwrap_or_default(),
        end_f.unwrap_or_default(),
        break_count,
    );
    let integral_inputs = !matches!(start, Some(EndpointScalar::Float(_)))
        && !matches!(end, Some(EndpointScalar::Float(_)))
        && !matches!(freq, Some(Freq::Float(_)));
    let breaks = if integral_inputs && breaks.iter().all(|value| value.fract() == 0.0) {
        EndpointArray::from_i64(breaks.into_iter().map(|value| value as i64).collect())
    } else {
        EndpointArray::from_f64(breaks)
    };
    IntervalOrderedIndex::from_breaks(breaks, closed)
}

fn temporal_range(
    domain: Domain,
    start: Option<EndpointScalar>,
    end: Option<EndpointScalar>,
    periods: Option<usize>,
    freq: Option<Freq>,
    closed: ClosedSide,
) -> TesseraResult<IntervalOrderedIndex> {
    let as_ticks = |scalar: &EndpointScalar| -> TesseraResult<i64> {
        match (domain, scalar) {
            (Domain::Timestamp, EndpointScalar::Timestamp(ticks))
            | (Domain::Duration, EndpointScalar::Duration(ticks)) => Ok(*ticks),
            (_, other) => {
                tessera_bail!(MismatchedTypes: format!("{domain:?}"), format!("{other:?}"))
            }
        }
    };
    let freq_t = match freq {
        None => None,
        Some(Freq::Ticks(step)) => Some(step),
        Some(Freq::Int(_) | Freq::Float(_)) => {
            tessera_bail!(MismatchedTypes: "a temporal tick freq", "a numeric freq")
        }
    };
    if freq_t.is_some_and(|step| step <= 0) {
        tessera_bail!(InvalidArgument: "freq must be positive");
    }

    let mut start_t = start.as_ref().map(&as_ticks).transpose()?;
    let mut end_t = end.as_ref().map(&as_ticks).transpose()?;

    if let (Some(s), Some(e), Some(step)) = (start_t, end_t, freq_t) {
        end_t = Some(e - (e - s).rem_euclid(step));
    }

    let break_count = match periods {
        Some(periods) => periods + 1,
        None => {
            let (s, e, step) = (
                start_t.unwrap_or_default(),
                end_t.unwrap_or_default(),
                freq_t.unwrap_or(1),
            );
            usize::try_from((e - s) / step).unwrap_or_default().saturating_add(1)
        }
    };
    match (start_t, end_t, freq_t) {
        (None, Some(e), Some(step)) => start_t = Some(e - (break_count as i64 - 1) * step),
        (Some(s), None, Some(step)) => end_t = Some(s + (break_count as i64 - 1) * step),
        _ => {}
    }

    let breaks: Vec<i64> = match freq_t {
        Some(step) => {
            let base = start_t.unwrap_or_default();
            (0..break_count).map(|index| base + index as i64 * step).collect()
        }
        None => linspace(
            start_t.unwrap_or_default() as f64,
            end_t.unwrap_or_default() as f64,
            break_count,
        )
        .into_iter()
        .map(|value| value.round() as i64)
        .collect(),
    };
    let kind = match domain {
        Domain::Timestamp => EndpointType::Timestamp { zoned: false },
        Domain::Duration => EndpointType::Duration,
        Domain::Numeric => unreachable!("dispatched on a temporal domain"),
    };
    IntervalOrderedIndex::from_breaks(EndpointArray::from_ticks(kind, breaks, None), closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Interval, IntervalOrPoint, LocResult};

    fn int(value: i64) -> Option<EndpointScalar> {
        Some(EndpointScalar::Int(value))
    }

    #[test]
    fn start_and_end_make_unit_intervals() {
        // (0,1], (1,2], (2,3], (3,4], (4,5]
        let index = interval_range(int(0), int(5), None, None, ClosedSide::Right).unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(index.subtype(), EndpointType::Int64);
        for position in 0..5 {
            let expected = Interval::try_new(
                EndpointScalar::Int(position as i64),
                EndpointScalar::Int(position as i64 + 1),
                ClosedSide::Right,
            )
            .unwrap();
            assert_eq!(index.interval_at(position).unwrap().unwrap(), expected);
        }
    }

    #[test]
    fn exactly_three_parameters_must_be_given() {
        let err = interval_range(
            int(0),
            int(5),
            Some(5),
            Some(Freq::Int(1)),
            ClosedSide::Right,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly three"));

        assert!(interval_range(int(0), None, None, None, ClosedSide::Right).is_err());
    }

    #[test]
    fn float_freq_spaces_float_breaks() {
        let index = interval_range(
            int(0),
            None,
            Some(4),
            Some(Freq::Float(1.5)),
            ClosedSide::Right,
        )
        .unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(index.subtype(), EndpointType::Float64);
        assert_eq!(
            index.interval_at(3).unwrap().unwrap().right,
            EndpointScalar::Float(6.0)
        );
    }

    #[test]
    fn integral_inputs_with_fractional_spacing_stay_float() {
        let index = interval_range(int(0), int(6), Some(4), None, ClosedSide::Right).unwrap();
        assert_eq!(index.subtype(), EndpointType::Float64);
        assert_eq!(
            index.interval_at(0).unwrap().unwrap().right,
            EndpointScalar::Float(1.5)
        );
    }

    #[test]
    fn end_clamps_to_the_freq_grid() {
        // freq 2 from 0 cannot land on 5; the last break lowers to 4
        let index = interval_range(int(0), int(5), None, Some(Freq::Int(2)), ClosedSide::Right)
            .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.interval_at(1).unwrap().unwrap().right,
            EndpointScalar::Int(4)
        );
    }

    #[test]
    fn end_and_periods_walk_backwards() {
        let index = interval_range(None, int(5), Some(4), None, ClosedSide::Both).unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(
            index.interval_at(0).unwrap().unwrap(),
            Interval::try_new(EndpointScalar::Int(1), EndpointScalar::Int(2), ClosedSide::Both)
                .unwrap()
        );
    }

    #[test]
    fn left_closed_ranges_do_not_overlap() {
        let index = interval_range(int(0), int(3), None, None, ClosedSide::Left).unwrap();
        assert!(!index.is_overlapping());
        assert_eq!(
            index
                .get_loc(&IntervalOrPoint::Point(EndpointScalar::Int(1)))
                .unwrap(),
            LocResult::At(1)
        );
    }

    #[test]
    fn temporal_ranges_step_in_ticks() {
        let start = Some(EndpointScalar::Timestamp(0));
        let index =
            interval_range(start, None, Some(3), Some(Freq::Ticks(10)), ClosedSide::Right)
                .unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.subtype(), EndpointType::Timestamp { zoned: false });
        assert_eq!(
            index.interval_at(2).unwrap().unwrap().right,
            EndpointScalar::Timestamp(30)
        );

        let default_freq =
            interval_range(start, None, Some(2), None, ClosedSide::Right).unwrap();
        assert_eq!(
            default_freq.interval_at(0).unwrap().unwrap().right,
            EndpointScalar::Timestamp(NANOS_PER_DAY)
        );
    }

    #[test]
    fn numeric_and_temporal_parameters_do_not_mix() {
        let err = interval_range(
            int(0),
            Some(EndpointScalar::Timestamp(10)),
            None,
            None,
            ClosedSide::Right,
        )
        .unwrap_err();
        assert!(err.to_string().contains("mismatched types"));

        let err = interval_range(
            int(0),
            int(10),
            None,
            Some(Freq::Ticks(1)),
            ClosedSide::Right,
        )
        .unwrap_err();
        assert!(err.to_string().contains("mismatched types"));
    }
}
