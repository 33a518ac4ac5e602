//! # voltage_iec104_client
//!
//! IEC 60870-5-104 controlling-station client for Rust.
//!
//! The client connects to a single outstation, starts data transfer,
//! polls it with general and counter interrogations and hands every
//! received information frame to the application.
//!
//! ## Features
//!
//! - **Persistent dialing**: fixed-interval connect retries, cancellable
//! - **Automatic polling**: total call on start, counter call after each
//!   total call, total call repeated on a fixed period
//! - **Backpressure**: bounded queues, a frame is acknowledged only after
//!   the application accepted it
//! - **Typed errors**: every session end is reported as an [`Iec104Error`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use voltage_iec104_client::{ClientConfig, Iec104Client};
//!
//! #[tokio::main]
//! async fn main() -> voltage_iec104_client::Result<()> {
//!     let config = ClientConfig::new("192.168.1.100:2404").common_address(1);
//!     let client = Iec104Client::new(config);
//!
//!     client
//!         .start(|mut frames| async move {
//!             while let Some(frame) = frames.recv().await {
//!                 println!("{}", frame);
//!             }
//!         })
//!         .await
//! }
//! ```
//!
//! ## Protocol Overview
//!
//! IEC 60870-5-104 uses TCP/IP for communication (default port 2404).
//! The protocol defines three frame types:
//!
//! - **I-frame**: Information transfer (contains ASDU)
//! - **S-frame**: Supervisory (acknowledgment)
//! - **U-frame**: Unnumbered (control: STARTDT, STOPDT, TESTFR)
//!
//! ### APDU Structure
//!
//! ```text
//! APCI (6 bytes):
//! +--------+--------+--------+--------+--------+--------+
//! | 0x68   | Length | Control Field (4 bytes)           |
//! +--------+--------+--------+--------+--------+--------+
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod client;
pub mod codec;
pub mod connector;
pub mod error;
pub mod protocol;
pub mod scheduler;
pub mod sequence;
pub mod session;
pub mod transport;
pub mod types;

// Re-export main types
pub use client::{ClientConfig, Iec104Client};
pub use codec::{Apdu, Iec104Codec};
pub use error::{Iec104Error, Result};
pub use session::{FrameReceiver, Session};
pub use types::*;
