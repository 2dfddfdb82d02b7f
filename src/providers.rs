//! Ready-made provider adapters.
//!
//! Each adapter is a descriptor plus a profile mapping function; the generic
//! [`Broker`](crate::flows::Broker) does the rest.

pub mod antcloud;
