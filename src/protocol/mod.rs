//! # Protocol Layer
//!
//! Everything above raw frames.
//!
//! ## Components
//! - **handshake**: CNXN/AUTH state machine producing a [`Connection`]
//! - **banner**: device banner and feature set
//! - **dispatcher**: per-stream demultiplexing of inbound frames
//! - **connection**: the authenticated session; opens streams
//! - **stream**: logical stream with `Read`/`Write`
//! - **shell**: shell v2 packets on top of a stream
//!
//! [`Connection`]: connection::Connection

pub mod banner;
pub mod connection;
pub mod dispatcher;
pub mod handshake;
pub mod shell;
pub mod stream;

#[cfg(test)]
mod tests;
