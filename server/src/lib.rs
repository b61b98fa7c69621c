//! # Slot Sync Host
//!
//! This library provides the authoritative host for slot replication. It keeps
//! one replica of every connected entity's slot groups, applies the updates each
//! peer sends about its own entity, and relays them to everyone else.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Replicas
//! The host's copy of an entity always wins. Relays are re-encoded from the
//! host's replica after the incoming update has been applied, never forwarded
//! before it.
//!
//! ### Session Management
//! Handles the complete lifecycle of peer connections:
//! - Join handshake with protocol version and slot capacity checks
//! - Peer id assignment (one byte, matching the sync frame's entity field)
//! - Full snapshots of every known entity for late joiners
//! - Disconnect and timeout cleanup with `PeerLeft` notices
//!
//! ### Relay
//! A peer's update goes to every other connected peer, never back to the
//! peer that sent it.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! Every replica mutation happens on one loop. Helper tasks receive packets,
//! send queued packets and detect timeouts. They talk to the loop over
//! channels, so replicas never have concurrent writers.
//!
//! ### Capacity Is Fixed Per Session
//! The number of slot groups per entity comes from configuration at startup.
//! Peers announcing a different capacity are rejected at join, since their
//! frames could not be parsed.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Peer roster: ids, addresses, activity timestamps and timeouts.
//!
//! ### Network Module (`network`)
//! UDP socket tasks, the join handshake and relay dispatch of
//! `shared::SyncProtocol` output.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::SessionConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = SessionConfig::with_capacity(4);
//!     let mut server = Server::new("127.0.0.1:8080", 32, &config).await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod network;
