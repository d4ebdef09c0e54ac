//! Domain models
//!
//! A [`Spot`] is one decoded PSK Reporter report. It is immutable once built and
//! shared between the store and live viewers as `Arc<Spot>`.

pub mod spot;

pub use spot::{Spot, SpotPayload};
