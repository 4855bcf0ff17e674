use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use chotu_app::ports::{BoardLink, LinkError};
use chotu_domain::pin::{Pin, PinMode};

use crate::codec;

/// Pin number of analog input A0 on an Uno-class board.
pub const ANALOG_PIN_OFFSET: u8 = 14;
pub const MAX_DIGITAL_PIN: u8 = 13;
pub const MAX_ANALOG_PIN: u8 = 5;

/// Latest sample per analog channel, filled by the reader task.
pub(crate) type Samples = Arc<Mutex<HashMap<u8, u16>>>;

/// [`BoardLink`] that queues encoded Firmata frames to the writer task.
pub struct FirmataLink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    samples: Samples,
}

impl FirmataLink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Vec<u8>>, samples: Samples) -> Self {
        Self { tx, samples }
    }

    pub(crate) fn send(&self, frame: Vec<u8>) -> Result<(), LinkError> {
        self.tx.send(frame).map_err(|_| LinkError::Closed)
    }
}

/// Firmata pin number for `pin`.
fn pin_number(pin: Pin) -> Result<u8, LinkError> {
    match pin {
        Pin::Digital(n) if n <= MAX_DIGITAL_PIN => Ok(n),
        Pin::Analog(n) if n <= MAX_ANALOG_PIN => Ok(ANALOG_PIN_OFFSET + n),
        _ => Err(LinkError::UnsupportedPin { pin }),
    }
}

fn analog_channel(pin: Pin) -> Result<u8, LinkError> {
    match pin {
        Pin::Analog(n) if n <= MAX_ANALOG_PIN => Ok(n),
        _ => Err(LinkError::UnsupportedPin { pin }),
    }
}

impl BoardLink for FirmataLink {
    fn set_pin_mode(&self, pin: Pin, mode: PinMode) -> Result<(), LinkError> {
        let number = pin_number(pin)?;
        let mode = match mode {
            PinMode::Output => codec::MODE_OUTPUT,
            PinMode::Pwm => codec::MODE_PWM,
            PinMode::Analog => codec::MODE_ANALOG,
            PinMode::Servo => {
                self.send(codec::servo_config(
                    number,
                    codec::SERVO_MIN_PULSE_US,
                    codec::SERVO_MAX_PULSE_US,
                ))?;
                codec::MODE_SERVO
            }
        };
        self.send(codec::set_pin_mode(number, mode))
    }

    fn digital_write(&self, pin: Pin, high: bool) -> Result<(), LinkError> {
        self.send(codec::digital_write(pin_number(pin)?, high))
    }

    fn analog_write(&self, pin: Pin, value: u16) -> Result<(), LinkError> {
        self.send(codec::analog_write(pin_number(pin)?, value))
    }

    fn report_analog(&self, pin: Pin, enable: bool) -> Result<(), LinkError> {
        self.send(codec::report_analog(analog_channel(pin)?, enable))
    }

    fn analog_value(&self, pin: Pin) -> Option<u16> {
        let channel = analog_channel(pin).ok()?;
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&channel)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> (FirmataLink, mpsc::UnboundedReceiver<Vec<u8>>, Samples) {
        let (tx, rx) = mpsc::unbounded_channel();
        let samples = Samples::default();
        (FirmataLink::new(tx, Arc::clone(&samples)), rx, samples)
    }

    #[test]
    fn should_configure_servo_before_setting_mode() {
        let (link, mut rx, _) = link();
        link.set_pin_mode(Pin::Digital(5), PinMode::Servo).unwrap();

        assert_eq!(rx.try_recv().unwrap()[..2], [0xF0, 0x70]);
        assert_eq!(rx.try_recv().unwrap(), [0xF4, 5, 4]);
    }

    #[test]
    fn should_map_analog_pins_past_digital_range() {
        let (link, mut rx, _) = link();
        link.set_pin_mode(Pin::Analog(1), PinMode::Analog).unwrap();
        assert_eq!(rx.try_recv().unwrap(), [0xF4, 15, 2]);
    }

    #[test]
    fn should_reject_unaddressable_pins() {
        let (link, _rx, _) = link();
        assert!(matches!(
            link.digital_write(Pin::Digital(14), true),
            Err(LinkError::UnsupportedPin { .. })
        ));
        assert!(matches!(
            link.report_analog(Pin::Digital(3), true),
            Err(LinkError::UnsupportedPin { .. })
        ));
    }

    #[test]
    fn should_read_samples_by_channel() {
        let (link, _rx, samples) = link();
        assert_eq!(link.analog_value(Pin::Analog(0)), None);

        samples.lock().unwrap().insert(0, 700);
        assert_eq!(link.analog_value(Pin::Analog(0)), Some(700));
    }

    #[test]
    fn should_report_closed_once_writer_is_gone() {
        let (link, rx, _) = link();
        drop(rx);
        assert!(matches!(
            link.digital_write(Pin::Digital(3), false),
            Err(LinkError::Closed)
        ));
    }
}
