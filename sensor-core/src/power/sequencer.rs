//! Executes power templates against a [`SupplyDriver`].

use embedded_hal::delay::DelayNs;

use super::{PowerAction, PowerSequence, PowerStep, SupplyDriver, templates::INPUT_CLOCK_HZ};
use crate::error::PowerFault;

/// Runs a power-up template.
///
/// When a step fails every previously applied step is undone in reverse
/// order before the fault is returned, so the sensor is never left partially
/// powered. Rollback is best-effort: a failing undo is logged and skipped.
pub fn power_up<S, D>(
    supply: &mut S,
    delay: &mut D,
    sequence: &PowerSequence,
) -> Result<(), PowerFault>
where
    S: SupplyDriver,
    D: DelayNs,
{
    for (index, step) in sequence.steps.iter().enumerate() {
        if apply(supply, step.action).is_err() {
            log_step_failed(step.action);
            let rolled_back = roll_back(supply, &sequence.steps[..index]);
            return Err(PowerFault::new(step.action, rolled_back));
        }
        log_step(step.action);
        settle(delay, step);
    }
    Ok(())
}

/// Runs a power-down template to completion.
///
/// Later steps still run after a failure; the first failing action is
/// reported once the sequence is exhausted.
pub fn power_down<S, D>(
    supply: &mut S,
    delay: &mut D,
    sequence: &PowerSequence,
) -> Result<(), PowerFault>
where
    S: SupplyDriver,
    D: DelayNs,
{
    let mut first_fault = None;
    for step in sequence.steps {
        if apply(supply, step.action).is_err() {
            log_step_failed(step.action);
            first_fault.get_or_insert(PowerFault::new(step.action, 0));
            continue;
        }
        log_step(step.action);
        settle(delay, step);
    }

    match first_fault {
        Some(fault) => Err(fault),
        None => Ok(()),
    }
}

fn roll_back<S: SupplyDriver>(supply: &mut S, applied: &[PowerStep]) -> u8 {
    let mut undone: u8 = 0;
    for step in applied.iter().rev() {
        let Some(undo) = step.action.rollback() else {
            continue;
        };
        if apply(supply, undo).is_ok() {
            undone = undone.saturating_add(1);
        } else {
            log_step_failed(undo);
        }
    }
    log_rollback(undone);
    undone
}

fn apply<S: SupplyDriver>(supply: &mut S, action: PowerAction) -> Result<(), S::Error> {
    match action {
        PowerAction::EnableRail(rail) => supply.enable_rail(rail),
        PowerAction::DisableRail(rail) => supply.disable_rail(rail),
        PowerAction::EnableClock => supply.enable_clock(INPUT_CLOCK_HZ),
        PowerAction::DisableClock => supply.disable_clock(),
        PowerAction::AssertReset => supply.set_reset(true),
        PowerAction::ReleaseReset => supply.set_reset(false),
    }
}

fn settle<D: DelayNs>(delay: &mut D, step: &PowerStep) {
    if step.settle.is_zero() {
        return;
    }
    let micros = u32::try_from(step.settle.as_micros()).unwrap_or(u32::MAX);
    delay.delay_us(micros);
}

#[cfg(feature = "defmt")]
fn log_step(action: PowerAction) {
    defmt::debug!("power: {}", action);
}

#[cfg(not(feature = "defmt"))]
fn log_step(_: PowerAction) {}

#[cfg(feature = "defmt")]
fn log_step_failed(action: PowerAction) {
    defmt::warn!("power: {} failed", action);
}

#[cfg(not(feature = "defmt"))]
fn log_step_failed(_: PowerAction) {}

#[cfg(feature = "defmt")]
fn log_rollback(undone: u8) {
    defmt::warn!("power: rolled back {=u8} steps", undone);
}

#[cfg(not(feature = "defmt"))]
fn log_rollback(_: u8) {}
