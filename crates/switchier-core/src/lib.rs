//! Core circuit representation for Switchier.
//!
//! This crate provides the low-level pieces every other crate builds on:
//!
//! - [`NodeId`] and [`NodeMap`] - node naming and MNA index assignment
//! - [`MnaSystem`] - the Modified Nodal Analysis matrix/RHS pair with
//!   triplet backing and elementary stamp operations
//!
//! The MNA system is a pure arithmetic surface: it knows nothing about
//! element kinds. Devices stamp themselves through the operations here.

pub mod mna;
pub mod node;

pub use mna::MnaSystem;
pub use node::{NodeId, NodeMap};
