//! Element models and circuit container for Switchier.
//!
//! This crate provides the device set of a switched-mode power-electronics
//! simulator and their per-step companion-model stamps:
//!
//! - Passive elements: R, L, C (L and C carry two history slots for the
//!   BE/BDF2 integration schemes)
//! - Sources: V, I with DC and PWM/pulse waveforms
//! - Switching devices: ideal MOSFET with a complementarity branch, the
//!   smoothed square-law MOSFET variant, and the ideal diode
//!
//! Elements are held in a [`Circuit`] as a tagged [`Element`] variant;
//! dispatch is a plain `match`, not trait objects, so the MCP kernel can
//! reach switch state without downcasting.

pub mod circuit;
pub mod element;
pub mod error;
pub mod passive;
pub mod sources;
pub mod switch;
pub mod waveforms;

pub use circuit::Circuit;
pub use element::{Element, IntegrationMethod, StampContext, StampDiagnostic, StepLimits};
pub use error::{CircuitError, Result};
pub use passive::{Capacitor, Inductor, Resistor};
pub use sources::{CurrentSource, VoltageSource};
pub use switch::{IdealDiode, Mosfet, MosfetModel, SwitchMode};
pub use waveforms::{PwmParams, Waveform};
