//! Power-on and power-off templates.
//!
//! Rails come up analog first, then digital core, then interface. The 24 MHz
//! input clock starts once every rail is stable. XCLR is held for 1-2 ms and
//! the sensor needs 5-10 ms after release before the first register access.

use core::time::Duration;

use super::{
    PowerAction, PowerSequence, PowerSequenceKind, PowerStep, RailId, TimingConstraintSet,
};

/// Input clock frequency (INCK).
pub const INPUT_CLOCK_HZ: u32 = 24_000_000;

pub const RESET_HOLD: Duration = Duration::from_millis(1);
pub const RESET_HOLD_MIN: Duration = Duration::from_millis(1);
pub const RESET_HOLD_MAX: Duration = Duration::from_millis(2);

pub const RESET_RELEASE_SETTLE: Duration = Duration::from_millis(5);
pub const RESET_RELEASE_SETTLE_MIN: Duration = Duration::from_millis(5);
pub const RESET_RELEASE_SETTLE_MAX: Duration = Duration::from_millis(10);

pub const POWER_ON_STEPS: [PowerStep; 6] = [
    PowerStep::immediate(PowerAction::EnableRail(RailId::Vana)),
    PowerStep::immediate(PowerAction::EnableRail(RailId::Vdig)),
    PowerStep::immediate(PowerAction::EnableRail(RailId::Vddl)),
    PowerStep::immediate(PowerAction::EnableClock),
    PowerStep::new(
        PowerAction::AssertReset,
        RESET_HOLD,
        TimingConstraintSet::with_hold_range(Some(RESET_HOLD_MIN), Some(RESET_HOLD_MAX)),
    ),
    PowerStep::new(
        PowerAction::ReleaseReset,
        RESET_RELEASE_SETTLE,
        TimingConstraintSet::with_hold_range(
            Some(RESET_RELEASE_SETTLE_MIN),
            Some(RESET_RELEASE_SETTLE_MAX),
        ),
    ),
];

pub const POWER_OFF_STEPS: [PowerStep; 5] = [
    PowerStep::immediate(PowerAction::AssertReset),
    PowerStep::immediate(PowerAction::DisableClock),
    PowerStep::immediate(PowerAction::DisableRail(RailId::Vddl)),
    PowerStep::immediate(PowerAction::DisableRail(RailId::Vdig)),
    PowerStep::immediate(PowerAction::DisableRail(RailId::Vana)),
];

pub const POWER_ON_SEQUENCE: PowerSequence =
    PowerSequence::new(PowerSequenceKind::PowerOn, &POWER_ON_STEPS);

pub const POWER_OFF_SEQUENCE: PowerSequence =
    PowerSequence::new(PowerSequenceKind::PowerOff, &POWER_OFF_STEPS);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_times_sit_inside_their_windows() {
        for step in POWER_ON_SEQUENCE.steps {
            assert!(
                step.constraints.allows_hold(step.settle),
                "{:?} settle {:?} outside window",
                step.action,
                step.settle
            );
        }
        assert_eq!(POWER_ON_SEQUENCE.total_settle(), Duration::from_millis(6));
    }

    #[test]
    fn power_off_disables_rails_in_reverse_order() {
        let enabled: heapless::Vec<RailId, 3> = POWER_ON_SEQUENCE
            .steps
            .iter()
            .filter_map(|step| match step.action {
                PowerAction::EnableRail(rail) => Some(rail),
                _ => None,
            })
            .collect();
        let disabled: heapless::Vec<RailId, 3> = POWER_OFF_SEQUENCE
            .steps
            .iter()
            .filter_map(|step| match step.action {
                PowerAction::DisableRail(rail) => Some(rail),
                _ => None,
            })
            .collect();

        assert_eq!(enabled.len(), 3);
        assert!(enabled.iter().rev().eq(disabled.iter()));
    }

    #[test]
    fn clock_stops_before_any_rail_drops() {
        let clock = POWER_OFF_SEQUENCE
            .steps
            .iter()
            .position(|step| step.action == PowerAction::DisableClock)
            .expect("clock step present");
        let first_rail = POWER_OFF_SEQUENCE
            .steps
            .iter()
            .position(|step| matches!(step.action, PowerAction::DisableRail(_)))
            .expect("rail step present");
        assert!(clock < first_rail);
    }
}
