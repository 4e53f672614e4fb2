//! crates/inkkeeper_core/src/rewards.rs
//!
//! Maps a finished session to the ink and XP it earns.

/// Which reward formula is in force. One model is active per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewardModel {
    /// 1 ink and 5 XP per whole minute; +20 ink for a reflection over 50 characters.
    #[default]
    TimeOnly,
    /// 2 XP per page or minute read; +20 to both for a reflection over 10 characters.
    /// Ink always equals XP.
    UnitBased,
}

impl RewardModel {
    /// Parses a configuration label (`time` / `units`).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "time" | "time_only" | "minutes" => Some(RewardModel::TimeOnly),
            "units" | "unit_based" | "pages" => Some(RewardModel::UnitBased),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reward {
    pub ink_gained: u32,
    pub xp_gained: u32,
}

const REFLECTION_BONUS: u32 = 20;
const TIME_BONUS_MIN_CHARS: usize = 50;
const UNIT_BONUS_MIN_CHARS: usize = 10;

/// Computes the reward for a session. Pure.
pub fn calculate_reward(
    model: RewardModel,
    duration_seconds: u32,
    reflection_length: usize,
    units_read: u32,
) -> Reward {
    match model {
        RewardModel::TimeOnly => {
            let minutes = duration_seconds / 60;
            let bonus = if reflection_length > TIME_BONUS_MIN_CHARS {
                REFLECTION_BONUS
            } else {
                0
            };
            Reward {
                ink_gained: minutes.saturating_add(bonus),
                xp_gained: minutes.saturating_mul(5),
            }
        }
        RewardModel::UnitBased => {
            let bonus = if reflection_length > UNIT_BONUS_MIN_CHARS {
                REFLECTION_BONUS
            } else {
                0
            };
            let xp = units_read.saturating_mul(2).saturating_add(bonus);
            Reward {
                ink_gained: xp,
                xp_gained: xp,
            }
        }
    }
}

/// Character count used for the reflection bonus.
pub fn reflection_length(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_only_pays_per_whole_minute() {
        let r = calculate_reward(RewardModel::TimeOnly, 600, 0, 0);
        assert_eq!(r, Reward { ink_gained: 10, xp_gained: 50 });
        // 10m59s still counts as ten minutes.
        assert_eq!(calculate_reward(RewardModel::TimeOnly, 659, 0, 0), r);
    }

    #[test]
    fn time_only_reflection_bonus_is_ink_only() {
        let r = calculate_reward(RewardModel::TimeOnly, 600, 60, 0);
        assert_eq!(r, Reward { ink_gained: 30, xp_gained: 50 });
        let edge = calculate_reward(RewardModel::TimeOnly, 600, 50, 0);
        assert_eq!(edge.ink_gained, 10);
    }

    #[test]
    fn unit_based_ties_ink_to_xp() {
        let r = calculate_reward(RewardModel::UnitBased, 900, 0, 30);
        assert_eq!(r, Reward { ink_gained: 60, xp_gained: 60 });
        let with_note = calculate_reward(RewardModel::UnitBased, 900, 11, 30);
        assert_eq!(with_note, Reward { ink_gained: 80, xp_gained: 80 });
    }

    #[test]
    fn identical_inputs_give_identical_rewards() {
        let a = calculate_reward(RewardModel::TimeOnly, 1234, 77, 9);
        let b = calculate_reward(RewardModel::TimeOnly, 1234, 77, 9);
        assert_eq!(a, b);
    }

    #[test]
    fn reflection_length_counts_characters() {
        assert_eq!(reflection_length("café"), 4);
        assert_eq!(reflection_length(""), 0);
    }

    #[test]
    fn model_labels() {
        assert_eq!(RewardModel::from_label("Time"), Some(RewardModel::TimeOnly));
        assert_eq!(RewardModel::from_label("pages"), Some(RewardModel::UnitBased));
        assert_eq!(RewardModel::from_label("xp"), None);
    }
}
