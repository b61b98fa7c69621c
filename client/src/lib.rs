//! # Slot Sync Peer
//!
//! This library provides the peer side of slot replication. A peer owns one
//! entity's slot groups, edits them locally, and sends whatever changed to the
//! host. It also keeps read-only mirrors of every other entity the host
//! relays.
//!
//! ## Architecture Overview
//!
//! ### Local Ownership
//! Only the owning peer mutates its entity. Each input tick the peer diffs its
//! slots against the previous tick and sends one message per changed role.
//! The first message after joining is always a full snapshot.
//!
//! ### Mirrors
//! Updates about other entities come from the host. A mirror is created the
//! first time an entity is seen and becomes synced once a full snapshot has
//! arrived. Updates about the peer's own entity are ignored.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! Simulated inventory edits driven by a seeded RNG.
//!
//! ### Network Module (`network`)
//! UDP session with the host: join handshake, heartbeats, sync frames, and
//! the JSON save file for the local slots.
//!
//! ### Rendering Module (`rendering`)
//! Read-only text views of local and mirrored slots.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::InputSimulator;
//! use client::network::Client;
//! use shared::SessionConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new(
//!         "127.0.0.1:8080",
//!         SessionConfig::with_capacity(4),
//!         InputSimulator::new(0.05),
//!         None,
//!     ).await?;
//!
//!     client.run(Some(Duration::from_secs(30))).await?;
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod network;
pub mod rendering;
