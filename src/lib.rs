//! parley: booking lifecycle & scheduling engine.
//!
//! Coordinates time-bound consultations between a requester and a service
//! agent over the agent's calendar: conflict-free slot allocation under
//! concurrent booking attempts, a strict lifecycle state machine, and a
//! periodic sweeper that expires unattended bookings and emits reminders
//! exactly once per threshold.

pub mod clock;
pub mod engine;
pub mod model;
pub mod notify;
pub mod observability;
pub mod store;
pub mod sweeper;
