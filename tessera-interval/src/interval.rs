use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use tessera_error::{TesseraResult, tessera_bail};

use crate::{EndpointScalar, compare_scalars};

/// Which endpoints of an interval are inclusive. One flag governs a whole
/// index; there is no per-element override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClosedSide {
    Left,
    Right,
    Both,
    Neither,
}

impl ClosedSide {
    pub fn closed_left(&self) -> bool {
        matches!(self, Self::Left | Self::Both)
    }

    pub fn closed_right(&self) -> bool {
        matches!(self, Self::Right | Self::Both)
    }

    pub fn open_left(&self) -> bool {
        !self.closed_left()
    }

    pub fn open_right(&self) -> bool {
        !self.closed_right()
    }
}

impl Display for ClosedSide {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Both => "both",
            Self::Neither => "neither",
        };
        write!(f, "{name}")
    }
}

/// A single interval value: two comparable endpoints and a closedness flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub left: EndpointScalar,
    pub right: EndpointScalar,
    pub closed: ClosedSide,
}

impl Interval {
    /// Build an interval, requiring comparable endpoints with
    /// `left <= right`. NA endpoints are allowed only in pairs.
    pub fn try_new(
        left: EndpointScalar,
        right: EndpointScalar,
        closed: ClosedSide,
    ) -> TesseraResult<Self> {
        if left.is_na() != right.is_na() {
            tessera_bail!(Construction: "an interval endpoint cannot be NA on only one side");
        }
        if !left.is_na() {
            match compare_scalars(&left, &right) {
                Some(Ordering::Less | Ordering::Equal) => {}
                Some(Ordering::Greater) => {
                    tessera_bail!(Construction: "interval left side must be <= right side")
                }
                None => {
                    tessera_bail!(Construction: "interval endpoints must be mutually comparable")
                }
            }
        }
        Ok(Self {
            left,
            right,
            closed,
        })
    }

    pub fn is_na(&self) -> bool {
        self.left.is_na()
    }

    /// Point containment under this interval's closedness.
    pub fn contains_point(&self, point: &EndpointScalar) -> bool {
        let on_left = compare_scalars(&self.left, point);
        let on_right = compare_scalars(point, &self.right);
        let left_ok = match on_left {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => self.closed.closed_left(),
            _ => false,
        };
        let right_ok = match on_right {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => self.closed.closed_right(),
            _ => false,
        };
        left_ok && right_ok
    }
}

/// The smallest label strictly greater than `label`: +1 for integers, the
/// next representable float, one tick for temporal values.
pub fn next_label(label: &EndpointScalar) -> TesseraResult<EndpointScalar> {
    shift_label(label, 1)
}

/// The largest label strictly smaller than `label`.
pub fn prev_label(label: &EndpointScalar) -> TesseraResult<EndpointScalar> {
    shift_label(label, -1)
}

fn shift_label(label: &EndpointScalar, direction: i64) -> TesseraResult<EndpointScalar> {
    Ok(match label {
        EndpointScalar::Int(value) => EndpointScalar::Int(
            value.checked_add(direction).ok_or_else(
                || tessera_error::tessera_err!(InvalidArgument: "label {value} has no neighbor"),
            )?,
        ),
        EndpointScalar::Float(value) => EndpointScalar::Float(if direction > 0 {
            value.next_up()
        } else {
            value.next_down()
        }),
        EndpointScalar::Timestamp(value) => EndpointScalar::Timestamp(value + direction),
        EndpointScalar::Duration(value) => EndpointScalar::Duration(value + direction),
        EndpointScalar::Na => {
            tessera_bail!(InvalidArgument: "cannot determine a neighboring label for NA")
        }
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn rejects_inverted_endpoints() {
        assert!(
            Interval::try_new(EndpointScalar::Int(2), EndpointScalar::Int(1), ClosedSide::Right)
                .is_err()
        );
        assert!(
            Interval::try_new(EndpointScalar::Int(1), EndpointScalar::Na, ClosedSide::Right)
                .is_err()
        );
    }

    #[rstest]
    #[case(ClosedSide::Right, false, true)]
    #[case(ClosedSide::Left, true, false)]
    #[case(ClosedSide::Both, true, true)]
    #[case(ClosedSide::Neither, false, false)]
    fn containment_follows_closedness(
        #[case] closed: ClosedSide,
        #[case] left_in: bool,
        #[case] right_in: bool,
    ) {
        let interval =
            Interval::try_new(EndpointScalar::Int(0), EndpointScalar::Int(1), closed).unwrap();
        assert_eq!(interval.contains_point(&EndpointScalar::Int(0)), left_in);
        assert_eq!(interval.contains_point(&EndpointScalar::Int(1)), right_in);
        assert!(interval.contains_point(&EndpointScalar::Float(0.5)));
        assert!(!interval.contains_point(&EndpointScalar::Int(2)));
    }

    #[test]
    fn label_shifting_per_kind() {
        assert_eq!(
            next_label(&EndpointScalar::Int(5)).unwrap(),
            EndpointScalar::Int(6)
        );
        assert_eq!(
            prev_label(&EndpointScalar::Timestamp(100)).unwrap(),
            EndpointScalar::Timestamp(99)
        );
        let up = next_label(&EndpointScalar::Float(1.0)).unwrap();
        match up {
            EndpointScalar::Float(value) => assert!(value > 1.0 && value < 1.0 + 1e-9),
            other => panic!("expected a float label, got {other:?}"),
        }
        assert!(next_label(&EndpointScalar::Na).is_err());
    }
}
