use super::settings::BucketThresholds;
use serde::Serialize;
use std::fmt;

/// Qualitative label for a track in a given week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bucket {
    Anchor,
    Climber,
    Fader,
    Spike,
    Uncategorized,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Anchor => "Anchor",
            Bucket::Climber => "Climber",
            Bucket::Fader => "Fader",
            Bucket::Spike => "Spike",
            Bucket::Uncategorized => "Uncategorized",
        }
    }

    /// Applies the rules in order; the first match wins.
    pub fn classify(input: &BucketInput, t: &BucketThresholds) -> Self {
        let momentum = input.momentum;
        if input.weeks_on_chart > t.anchor_min_weeks && input.streak > t.anchor_min_streak {
            return Bucket::Anchor;
        }
        if momentum.is_some_and(|m| m > t.climber_min_momentum)
            && input.weeks_on_chart <= t.climber_max_weeks
        {
            return Bucket::Climber;
        }
        if momentum.is_some_and(|m| m < t.fader_max_momentum) && input.has_prior_presence {
            return Bucket::Fader;
        }
        if input.weeks_on_chart <= t.spike_max_weeks
            && momentum.map_or(true, |m| m <= t.climber_min_momentum)
        {
            return Bucket::Spike;
        }
        Bucket::Uncategorized
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subset of a track's metrics the bucket rules look at.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketInput {
    pub weeks_on_chart: u32,
    pub streak: u32,
    pub momentum: Option<f64>,
    /// The track was present in some ok week before this one.
    pub has_prior_presence: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(weeks: u32, streak: u32, momentum: Option<f64>, prior: bool) -> BucketInput {
        BucketInput {
            weeks_on_chart: weeks,
            streak,
            momentum,
            has_prior_presence: prior,
        }
    }

    #[test]
    fn test_anchor_wins_over_climber() {
        let t = BucketThresholds::default();
        let both = input(10, 6, Some(5.0), true);
        // Both rules hold on their own...
        assert!(both.weeks_on_chart > t.anchor_min_weeks && both.streak > t.anchor_min_streak);
        assert!(both.momentum.unwrap() > t.climber_min_momentum);
        assert!(both.weeks_on_chart <= t.climber_max_weeks);
        // ...and the earlier rule decides.
        assert_eq!(Bucket::classify(&both, &t), Bucket::Anchor);
    }

    #[test]
    fn test_each_rule() {
        let t = BucketThresholds::default();
        assert_eq!(Bucket::classify(&input(5, 5, Some(3.0), true), &t), Bucket::Climber);
        assert_eq!(Bucket::classify(&input(13, 2, Some(3.0), true), &t), Bucket::Uncategorized);
        assert_eq!(Bucket::classify(&input(6, 0, Some(-4.0), true), &t), Bucket::Fader);
        assert_eq!(Bucket::classify(&input(1, 1, None, false), &t), Bucket::Spike);
        assert_eq!(Bucket::classify(&input(2, 2, Some(1.0), true), &t), Bucket::Spike);
        assert_eq!(Bucket::classify(&input(5, 5, Some(0.0), true), &t), Bucket::Uncategorized);
    }

    #[test]
    fn test_climber_ceiling_sits_above_anchor_floor() {
        let t = BucketThresholds::default();
        assert!(t.climber_max_weeks > t.anchor_min_weeks);
        // Past the Anchor floor but too short a streak for Anchor.
        assert_eq!(Bucket::classify(&input(10, 2, Some(5.0), true), &t), Bucket::Climber);
        assert_eq!(Bucket::classify(&input(12, 2, Some(5.0), true), &t), Bucket::Climber);

        let strict = BucketThresholds {
            climber_max_weeks: t.anchor_min_weeks,
            ..t
        };
        assert_eq!(
            Bucket::classify(&input(10, 2, Some(5.0), true), &strict),
            Bucket::Uncategorized
        );
    }

    #[test]
    fn test_fader_needs_prior_presence() {
        let t = BucketThresholds::default();
        assert_eq!(Bucket::classify(&input(1, 1, Some(-5.0), false), &t), Bucket::Spike);
    }
}
