//! Sound radar: classifies system audio per loudspeaker channel and tracks
//! where each detected sound sits around the listener.
//!
//! * [`audio`] captures loopback audio, resamples and gates it.
//! * [`classify`] talks to the sound classification service.
//! * [`radar`] maps channels to directions, aggregates and smooths.
//! * [`pipeline`] wires capture and processing together.
//! * [`config`] holds the persisted settings.

pub mod audio;
pub mod classify;
pub mod config;
pub mod pipeline;
pub mod radar;
