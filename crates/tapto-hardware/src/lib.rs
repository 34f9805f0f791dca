//! Token reader drivers for the TapTo daemon.
//!
//! This crate defines the [`Reader`] capability every token reader
//! satisfies, the PN532 UART driver, and mocks for exercising both the
//! driver and its consumers without hardware.
//!
//! # Design
//!
//! - **Async-first**: reader operations use native `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT). Blocking serial I/O runs on
//!   Tokio's blocking pool.
//! - **Enum dispatch**: the trait is not object-safe, so
//!   [`AnyReader`] wraps the concrete variants.
//! - **Event driven**: an open reader pushes [`Scan`](tapto_core::Scan)
//!   values into a bounded queue owned by the consumer.
//!
//! # Readers
//!
//! | Variant | Device spec | Module |
//! |---------|-------------|--------|
//! | PN532 over UART | `pn532_uart:/dev/ttyUSB0` | [`pn532_uart`] |
//! | Mock | `mock:<anything>` | [`mock`] |
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] with
//! [`HardwareError`] describing disconnections, protocol failures and
//! configuration mistakes.

pub mod devices;
pub mod error;
pub mod mock;
pub mod pn532_uart;
pub mod protocol;
pub mod traits;

pub use devices::AnyReader;
pub use error::{HardwareError, Result};
pub use traits::Reader;
