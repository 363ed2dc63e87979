//! # itchcast - NASDAQ ITCH 5.0 Replay Engine
//!
//! This crate ingests a NASDAQ TotalView-ITCH 5.0 capture file, decodes each
//! length-prefixed message on a producer core, broadcasts the decoded records
//! through a lock-free seqlock queue, and maintains per-security limit order
//! books tuned for constant-time access to the top-of-book region. It is
//! intended for backtesting and simulated market-making research.
//!
//! ## Architecture
//!
//! The engine consists of several key components:
//! - **CaptureReader / ItchProducer**: zero-copy framed parsing over a
//!   memory-mapped capture, dispatching on the message-type byte
//! - **SpmcRing**: single-producer / multi-consumer seqlock broadcast ring;
//!   lagging consumers never block the producer
//! - **OrderBook**: hybrid book with a ring-buffered top 100 levels, a mid
//!   ring for the next 100, a sorted deep container, and an order-id index
//!   for O(1) mutation
//! - **BookBuilder**: per-consumer loop that filters envelopes by locate
//!   code and applies them to its books
//!
//! ## Example
//!
//! ```rust
//! use itchcast::book::{BookOp, OrderBook, Side};
//!
//! let mut book = OrderBook::new();
//! book.reserve_orders(1000);
//!
//! let out = book
//!     .apply(BookOp::Add { order_id: 1, side: Side::Ask, price: 10_000, qty: 500 })
//!     .unwrap();
//! assert!(out.applied);
//! assert_eq!(book.top_of_book(Side::Ask), Some((10_000, 500)));
//! ```
pub mod book;
pub mod builder;
pub mod itch;
pub mod parser;
pub mod queue;
pub mod snapshot;
