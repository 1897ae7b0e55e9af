// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Core module - display event fan-out and the bracelet publishing loop

mod event_bus;
mod publisher;

pub use event_bus::{Event, EventBus, EventPayload, EventType};
pub use publisher::BraceletPublisher;
