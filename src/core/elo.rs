/// Sensitivity of a single vote. A coin-flip result between equals moves
/// each rating by `K / 2`.
pub const DEFAULT_K_FACTOR: f64 = 32.0;

/// Rating difference at which the stronger item is expected to win 10:1
pub const ELO_SCALE: f64 = 400.0;

/// New ratings for both sides of a committed vote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingUpdate {
    pub winner: f64,
    pub loser: f64,
    /// Points moved from loser to winner
    pub delta: f64,
}

/// Elo rating model
///
/// Update formula:
/// ```text
/// E_w  = 1 / (1 + 10^((R_l - R_w) / 400))
/// R_w' = R_w + K * (1 - E_w)
/// R_l' = R_l + K * (E_w - 1)
/// ```
///
/// The winner gains exactly what the loser gives up; ratings are never
/// clamped or renormalised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloModel {
    k_factor: f64,
    scale: f64,
}

impl EloModel {
    pub fn new(k_factor: f64) -> Self {
        Self {
            k_factor,
            scale: ELO_SCALE,
        }
    }

    pub fn k_factor(&self) -> f64 {
        self.k_factor
    }

    /// Probability that an item rated `rating` beats one rated `opponent`
    #[inline]
    pub fn expected_score(&self, rating: f64, opponent: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((opponent - rating) / self.scale))
    }

    /// Ratings after `winner` beat `loser`
    #[inline]
    pub fn rate(&self, winner: f64, loser: f64) -> RatingUpdate {
        let expected = self.expected_score(winner, loser);
        let delta = self.k_factor * (1.0 - expected);

        RatingUpdate {
            winner: winner + delta,
            loser: loser - delta,
            delta,
        }
    }
}

impl Default for EloModel {
    fn default() -> Self {
        Self::new(DEFAULT_K_FACTOR)
    }
}
