//! Actuator controllers: one per physical actuator kind.
//!
//! Each controller is the sole mutator of its pins. Mutations run under the
//! controller's async mutex (FIFO), so commands on the same actuator apply in
//! arrival order while different actuators proceed independently.
//!
//! Controllers are only constructed by [`Actuators::bind`](crate::actuators::Actuators),
//! which the board lifecycle calls once, on Ready.

pub mod light;
pub mod motor;
pub mod relay;
pub mod sensor;
pub mod servo;

pub use light::LightController;
pub use motor::MotorController;
pub use relay::RelayController;
pub use sensor::SensorController;
pub use servo::ServoController;
