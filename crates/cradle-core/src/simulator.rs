//! Turn outcome simulator.
//!
//! Pure counter arithmetic over (finance, relationship, age, option). The
//! controller drives these functions; nothing here touches I/O or state.

use crate::session::model::Level;
use crate::session::question::QuestionOption;

/// Ages at or below this get the grace rule: no bankruptcy pressure during
/// infancy, so negative finance deltas are suppressed entirely.
pub const GRACE_AGE_MAX: u8 = 5;

/// Finance below this gets the passive +1 recovery on each age advance past
/// the grace years.
pub const PASSIVE_RECOVERY_CEILING: u8 = 7;

/// Floor a recovery-tagged option guarantees while bankrupt.
pub const RECOVERY_FLOOR: u8 = 3;

/// The counter state produced by applying one choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnEffect {
    pub finance: Level,
    pub relationship: Level,
    pub bankrupt: bool,
}

/// Applies a chosen option to the counters.
///
/// Negative finance deltas are ignored while `age <= GRACE_AGE_MAX`. A
/// recovery-tagged option applied while bankrupt resets finance to
/// `max(RECOVERY_FLOOR, computed + 2)` instead of the plain clamped sum, so
/// recovery choices always meaningfully help. The bankrupt flag tracks
/// whether finance is sitting at zero after the application.
pub fn apply_choice(
    finance: Level,
    relationship: Level,
    bankrupt: bool,
    age: u8,
    option: &QuestionOption,
) -> TurnEffect {
    let finance_delta = if option.finance_delta < 0 && age <= GRACE_AGE_MAX {
        0
    } else {
        option.finance_delta
    };

    let computed = finance.apply(finance_delta);
    let next_finance = if bankrupt && option.is_recovery {
        Level::new((computed.value() + 2).max(RECOVERY_FLOOR))
    } else {
        computed
    };

    TurnEffect {
        finance: next_finance,
        relationship: relationship.apply(option.relationship_delta),
        bankrupt: next_finance.is_zero(),
    }
}

/// Passive recovery applied each time the child's age advances.
///
/// Once past the grace years, a struggling household drifts back up: if the
/// new age is above `GRACE_AGE_MAX` and finance is below the ceiling,
/// finance gains one point.
pub fn passive_recovery(finance: Level, new_age: u8) -> Level {
    if new_age > GRACE_AGE_MAX && finance.value() < PASSIVE_RECOVERY_CEILING {
        finance.apply(1)
    } else {
        finance
    }
}
