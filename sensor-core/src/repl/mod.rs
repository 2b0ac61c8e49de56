//! Line-oriented console for driving a sensor by hand.
//!
//! [`grammar`] turns a line into a [`grammar::Command`], [`commands`] runs it
//! against a [`crate::SensorOps`] implementation and [`completion`] offers
//! suggestions from the same [`catalog`].

pub mod catalog;
pub mod commands;
pub mod completion;
pub mod grammar;
