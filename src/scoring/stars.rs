// Star tiers and score comments

use serde::Serialize;

use crate::config::StarThresholds;

/// Stars earned by a composite score, 0 to 3
pub fn stars_for(score: u8, thresholds: &StarThresholds) -> u8 {
    let score = score as u32;
    if score >= thresholds.three {
        3
    } else if score >= thresholds.two {
        2
    } else if score >= thresholds.one {
        1
    } else {
        0
    }
}

/// Feedback tier shown with a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreComment {
    Excellent,
    Good,
    Fair,
    NeedsWork,
}

impl ScoreComment {
    pub fn from_stars(stars: u8) -> Self {
        match stars {
            3.. => ScoreComment::Excellent,
            2 => ScoreComment::Good,
            1 => ScoreComment::Fair,
            0 => ScoreComment::NeedsWork,
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            ScoreComment::Excellent => "Masterful! A legendary dub!",
            ScoreComment::Good => "Great work! Keep it up!",
            ScoreComment::Fair => "Not bad, there is room to grow.",
            ScoreComment::NeedsWork => "Keep practicing, you'll get there!",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_thresholds() {
        let thresholds = StarThresholds::default();
        assert_eq!(stars_for(100, &thresholds), 3);
        assert_eq!(stars_for(90, &thresholds), 3);
        assert_eq!(stars_for(89, &thresholds), 2);
        assert_eq!(stars_for(70, &thresholds), 2);
        assert_eq!(stars_for(50, &thresholds), 1);
        assert_eq!(stars_for(49, &thresholds), 0);
    }

    #[test]
    fn test_comment_tiers() {
        assert_eq!(ScoreComment::from_stars(3), ScoreComment::Excellent);
        assert_eq!(ScoreComment::from_stars(1), ScoreComment::Fair);
        assert_eq!(ScoreComment::from_stars(0), ScoreComment::NeedsWork);
    }
}
