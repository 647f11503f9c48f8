//! Hand-raise classification.
//!
//! A hand counts as raised when its middle fingertip sits above the wrist
//! in image space (smaller `y`). The rule is pure: same landmarks, same answer.

use crate::types::LandmarkSet;

/// True if this hand is raised.
pub fn is_raised(hand: &LandmarkSet) -> bool {
    hand.middle_tip().y < hand.wrist().y
}

/// True if any of the detected hands is raised. No hands means not raised.
pub fn any_raised(hands: &[LandmarkSet]) -> bool {
    hands.iter().any(is_raised)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Landmark, HAND_LANDMARK_COUNT, MIDDLE_TIP, WRIST};

    fn hand(wrist_y: f32, tip_y: f32) -> LandmarkSet {
        let mut points = [Landmark { x: 0.5, y: 0.5, z: 0.0 }; HAND_LANDMARK_COUNT];
        points[WRIST].y = wrist_y;
        points[MIDDLE_TIP].y = tip_y;
        LandmarkSet::new(points)
    }

    #[test]
    fn test_tip_above_wrist_is_raised() {
        let h = hand(0.8, 0.3);
        for _ in 0..3 {
            assert!(is_raised(&h));
        }
    }

    #[test]
    fn test_tip_below_or_level_is_not_raised() {
        assert!(!is_raised(&hand(0.3, 0.8)));
        assert!(!is_raised(&hand(0.5, 0.5)));
    }

    #[test]
    fn test_any_raised() {
        assert!(!any_raised(&[]));
        assert!(!any_raised(&[hand(0.2, 0.9)]));
        assert!(any_raised(&[hand(0.2, 0.9), hand(0.9, 0.2)]));
    }
}
