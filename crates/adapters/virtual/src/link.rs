//! In-memory pin model of an Uno-class board.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chotu_app::ports::{BoardLink, LinkError};
use chotu_domain::pin::{Pin, PinMode};

/// Highest addressable digital pin.
pub const MAX_DIGITAL_PIN: u8 = 13;
/// Highest addressable analog input.
pub const MAX_ANALOG_PIN: u8 = 5;

/// What the simulated board holds for one pin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinSnapshot {
    pub mode: Option<PinMode>,
    /// Digital level (0/1), PWM duty or servo angle.
    pub value: u16,
    pub reporting: bool,
}

/// A [`BoardLink`] living entirely in memory.
#[derive(Debug, Default)]
pub struct VirtualLink {
    pins: Mutex<HashMap<Pin, PinSnapshot>>,
    samples: HashMap<Pin, u16>,
    closed: AtomicBool,
}

impl VirtualLink {
    pub(crate) fn new(samples: HashMap<Pin, u16>) -> Self {
        Self {
            pins: Mutex::new(HashMap::new()),
            samples,
            closed: AtomicBool::new(false),
        }
    }

    /// Current simulated state of `pin`.
    #[must_use]
    pub fn pin(&self, pin: Pin) -> PinSnapshot {
        self.pins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pin)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn check(&self, pin: Pin) -> Result<(), LinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }
        let addressable = match pin {
            Pin::Digital(n) => n <= MAX_DIGITAL_PIN,
            Pin::Analog(n) => n <= MAX_ANALOG_PIN,
        };
        if addressable {
            Ok(())
        } else {
            Err(LinkError::UnsupportedPin { pin })
        }
    }

    fn update(&self, pin: Pin, f: impl FnOnce(&mut PinSnapshot)) {
        let mut pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        f(pins.entry(pin).or_default());
    }
}

impl BoardLink for VirtualLink {
    fn set_pin_mode(&self, pin: Pin, mode: PinMode) -> Result<(), LinkError> {
        self.check(pin)?;
        self.update(pin, |p| p.mode = Some(mode));
        tracing::trace!(%pin, ?mode, "virtual pin mode");
        Ok(())
    }

    fn digital_write(&self, pin: Pin, high: bool) -> Result<(), LinkError> {
        self.check(pin)?;
        self.update(pin, |p| p.value = u16::from(high));
        tracing::debug!(%pin, high, "virtual digital write");
        Ok(())
    }

    fn analog_write(&self, pin: Pin, value: u16) -> Result<(), LinkError> {
        self.check(pin)?;
        self.update(pin, |p| p.value = value);
        tracing::debug!(%pin, value, "virtual analog write");
        Ok(())
    }

    fn report_analog(&self, pin: Pin, enable: bool) -> Result<(), LinkError> {
        self.check(pin)?;
        self.update(pin, |p| p.reporting = enable);
        Ok(())
    }

    fn analog_value(&self, pin: Pin) -> Option<u16> {
        if !self.pin(pin).reporting {
            return None;
        }
        self.samples.get(&pin).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_track_pin_mode_and_level() {
        let link = VirtualLink::default();
        link.set_pin_mode(Pin::Digital(10), PinMode::Output).unwrap();
        link.digital_write(Pin::Digital(10), true).unwrap();

        assert_eq!(
            link.pin(Pin::Digital(10)),
            PinSnapshot {
                mode: Some(PinMode::Output),
                value: 1,
                reporting: false
            }
        );
    }

    #[test]
    fn should_reject_unaddressable_pin() {
        let link = VirtualLink::default();
        assert!(matches!(
            link.digital_write(Pin::Digital(20), true),
            Err(LinkError::UnsupportedPin { .. })
        ));
        assert!(matches!(
            link.report_analog(Pin::Analog(6), true),
            Err(LinkError::UnsupportedPin { .. })
        ));
    }

    #[test]
    fn should_only_report_samples_once_enabled() {
        let link = VirtualLink::new(HashMap::from([(Pin::Analog(0), 512)]));
        assert_eq!(link.analog_value(Pin::Analog(0)), None);

        link.report_analog(Pin::Analog(0), true).unwrap();
        assert_eq!(link.analog_value(Pin::Analog(0)), Some(512));
    }

    #[test]
    fn should_fail_writes_once_closed() {
        let link = VirtualLink::default();
        link.close();
        assert!(matches!(
            link.analog_write(Pin::Digital(6), 10),
            Err(LinkError::Closed)
        ));
    }
}
