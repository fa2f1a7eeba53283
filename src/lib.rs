//! # SID — Server In Disguise
//!
//! A steganographic HTTP proxy: to an observer, a client chats with an
//! innocuous public "cover" site; in reality the client can hand a
//! sensitive document to the operator. Every request/response pair on the
//! wire is size- and shape-compatible with a genuine exchange against the
//! cover origin.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────┐   slabs    ┌─────────────────────────────┐    ┌──────────────┐
//! │  client  │ ─────────▶ │  request rewriter           │ ──▶│              │
//! │ (browser)│            │   header table · upload tap │    │ cover origin │
//! │          │ ◀───────── │  response rewriter          │ ◀──│              │
//! └──────────┘            │   scan · synthesize · pad   │    └──────────────┘
//!                         └───────────┬─────────────────┘
//!                                     │ completed upload
//!                                     ▼
//!                         ┌─────────────────────────────┐
//!                         │  sealer                     │
//!                         │  AES-256-CFB document       │
//!                         │  Shamir shares over GF(p)   │
//!                         │  OpenPGP wrap per reviewer  │
//!                         └─────────────────────────────┘
//! ```
//!
//! ## Design Goals
//!
//! 1. **Size conservation**: every rewritten slab matches its source slab
//!    byte for byte in length
//! 2. **Traffic shape**: the synthesized pages reference the same external
//!    resources the real cover page does, in source order
//! 3. **Threshold custody**: no single reviewer can open a document alone

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod cover;
pub mod error;
pub mod html;
pub mod proxy;
pub mod seal;
pub mod uri;
pub mod util;

pub use config::Config;
pub use error::{Error, Result};

/// Buffer size for socket reads; also the largest slab a rewriter sees.
pub const SLAB_SIZE: usize = 32768;
