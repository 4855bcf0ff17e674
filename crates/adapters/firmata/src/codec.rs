//! Firmata wire format: the subset needed to drive outputs and read analog
//! inputs.
//!
//! Data bytes carry 7 bits; 14-bit values travel as an LSB/MSB pair. A byte
//! with the high bit set starts a new message.

pub const ANALOG_MESSAGE: u8 = 0xE0;
pub const DIGITAL_MESSAGE: u8 = 0x90;
pub const REPORT_ANALOG: u8 = 0xC0;
pub const SET_PIN_MODE: u8 = 0xF4;
pub const SET_DIGITAL_PIN_VALUE: u8 = 0xF5;
pub const REPORT_VERSION: u8 = 0xF9;
pub const START_SYSEX: u8 = 0xF0;
pub const END_SYSEX: u8 = 0xF7;
pub const SERVO_CONFIG: u8 = 0x70;
pub const REPORT_FIRMWARE: u8 = 0x79;

pub const MODE_OUTPUT: u8 = 0x01;
pub const MODE_ANALOG: u8 = 0x02;
pub const MODE_PWM: u8 = 0x03;
pub const MODE_SERVO: u8 = 0x04;

/// Default servo pulse range, in microseconds.
pub const SERVO_MIN_PULSE_US: u16 = 544;
pub const SERVO_MAX_PULSE_US: u16 = 2400;

const MAX_SYSEX_LEN: usize = 256;

#[allow(clippy::cast_possible_truncation)]
fn lsb(value: u16) -> u8 {
    (value & 0x7F) as u8
}

#[allow(clippy::cast_possible_truncation)]
fn msb(value: u16) -> u8 {
    ((value >> 7) & 0x7F) as u8
}

#[must_use]
pub fn set_pin_mode(pin: u8, mode: u8) -> Vec<u8> {
    vec![SET_PIN_MODE, pin & 0x7F, mode]
}

#[must_use]
pub fn digital_write(pin: u8, high: bool) -> Vec<u8> {
    vec![SET_DIGITAL_PIN_VALUE, pin & 0x7F, u8::from(high)]
}

/// PWM duty or servo angle on pins 0–15.
#[must_use]
pub fn analog_write(pin: u8, value: u16) -> Vec<u8> {
    vec![ANALOG_MESSAGE | (pin & 0x0F), lsb(value), msb(value)]
}

#[must_use]
pub fn report_analog(channel: u8, enable: bool) -> Vec<u8> {
    vec![REPORT_ANALOG | (channel & 0x0F), u8::from(enable)]
}

#[must_use]
pub fn servo_config(pin: u8, min_pulse_us: u16, max_pulse_us: u16) -> Vec<u8> {
    vec![
        START_SYSEX,
        SERVO_CONFIG,
        pin & 0x7F,
        lsb(min_pulse_us),
        msb(min_pulse_us),
        lsb(max_pulse_us),
        msb(max_pulse_us),
        END_SYSEX,
    ]
}

#[must_use]
pub fn query_version() -> Vec<u8> {
    vec![REPORT_VERSION]
}

#[must_use]
pub fn query_firmware() -> Vec<u8> {
    vec![START_SYSEX, REPORT_FIRMWARE, END_SYSEX]
}

/// A message received from the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    ProtocolVersion { major: u8, minor: u8 },
    Firmware { major: u8, minor: u8, name: String },
    AnalogValue { channel: u8, value: u16 },
    DigitalPort { port: u8, mask: u16 },
}

/// Incremental decoder; bytes may arrive in arbitrary chunks.
#[derive(Debug, Default)]
pub struct Decoder {
    buf: Vec<u8>,
}

impl Decoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed `bytes`, returning every message they complete.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<Message> {
        bytes.iter().filter_map(|b| self.push(*b)).collect()
    }

    /// Feed a single byte.
    pub fn push(&mut self, byte: u8) -> Option<Message> {
        let in_sysex = self.buf.first() == Some(&START_SYSEX);

        if byte == END_SYSEX {
            let msg = if in_sysex {
                parse_sysex(&self.buf[1..])
            } else {
                None
            };
            self.buf.clear();
            return msg;
        }
        if in_sysex && byte != START_SYSEX {
            if self.buf.len() >= MAX_SYSEX_LEN {
                self.buf.clear();
            } else {
                self.buf.push(byte);
            }
            return None;
        }

        if byte & 0x80 != 0 {
            self.buf.clear();
            self.buf.push(byte);
            return None;
        }
        if self.buf.is_empty() {
            return None;
        }
        self.buf.push(byte);
        if self.buf.len() < 3 {
            return None;
        }

        let (command, a, b) = (self.buf[0], self.buf[1], self.buf[2]);
        self.buf.clear();
        let value = u16::from(a) | (u16::from(b) << 7);
        match command {
            REPORT_VERSION => Some(Message::ProtocolVersion { major: a, minor: b }),
            c if c & 0xF0 == ANALOG_MESSAGE => Some(Message::AnalogValue {
                channel: c & 0x0F,
                value,
            }),
            c if c & 0xF0 == DIGITAL_MESSAGE => Some(Message::DigitalPort {
                port: c & 0x0F,
                mask: value,
            }),
            _ => None,
        }
    }
}

fn parse_sysex(body: &[u8]) -> Option<Message> {
    match body {
        [REPORT_FIRMWARE, major, minor, rest @ ..] => {
            let name = rest
                .chunks_exact(2)
                .map(|pair| char::from(pair[0] | (pair[1] << 7)))
                .collect();
            Some(Message::Firmware {
                major: *major,
                minor: *minor,
                name,
            })
        }
        _ => None,
    }
}
