//! Built-in input providers.
//!
//! Device polling (joystick, keyboard focus) belongs to whatever window
//! toolkit hosts the receiver. Headless runs use one of these instead.

use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use framecast_core::control::{InputProvider, InputSnapshot, JoystickState, KeyboardState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputMode {
    /// No keys held.
    Idle,
    /// Synthetic two-axis joystick sweeping left and right.
    Sweep,
}

impl InputMode {
    pub fn provider(self, sweep_period: Duration) -> Box<dyn InputProvider> {
        match self {
            InputMode::Idle => Box::new(IdleInput),
            InputMode::Sweep => Box::new(SweepInput::new(sweep_period)),
        }
    }
}

pub struct IdleInput;

impl InputProvider for IdleInput {
    fn poll(&mut self) -> InputSnapshot {
        InputSnapshot::Keyboard(KeyboardState::default())
    }
}

/// X axis follows `sin(2π t / period)`; button 0 is held on the positive half.
pub struct SweepInput {
    start: Instant,
    period: Duration,
}

impl SweepInput {
    pub fn new(period: Duration) -> Self {
        Self {
            start: Instant::now(),
            period: period.max(Duration::from_millis(1)),
        }
    }

    pub fn snapshot_at(&self, now: Instant) -> InputSnapshot {
        let t = now.saturating_duration_since(self.start).as_secs_f32();
        let x = (TAU * t / self.period.as_secs_f32()).sin();
        InputSnapshot::Joystick(JoystickState {
            axes: vec![x, 0.0],
            buttons: vec![x > 0.0],
        })
    }
}

impl InputProvider for SweepInput {
    fn poll(&mut self) -> InputSnapshot {
        self.snapshot_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x_of(snapshot: &InputSnapshot) -> f32 {
        match snapshot {
            InputSnapshot::Joystick(js) => js.axes[0],
            other => panic!("expected joystick, got {other:?}"),
        }
    }

    #[test]
    fn idle_is_neutral_keyboard() {
        assert_eq!(IdleInput.poll(), InputSnapshot::Keyboard(KeyboardState::default()));
    }

    #[test]
    fn sweep_follows_sine() {
        let sweep = SweepInput::new(Duration::from_secs(4));
        let t0 = sweep.start;
        assert!(x_of(&sweep.snapshot_at(t0)).abs() < 1e-6);
        assert!((x_of(&sweep.snapshot_at(t0 + Duration::from_secs(1))) - 1.0).abs() < 1e-4);
        assert!((x_of(&sweep.snapshot_at(t0 + Duration::from_secs(3))) + 1.0).abs() < 1e-4);
    }

    #[test]
    fn mode_names_in_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: InputMode,
        }
        let w: Wrapper = toml::from_str("mode = \"sweep\"").unwrap();
        assert_eq!(w.mode, InputMode::Sweep);
    }
}
