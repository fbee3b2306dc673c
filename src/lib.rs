#![cfg_attr(docsrs, feature(doc_cfg))]

use std::net::{Ipv4Addr, Ipv6Addr};

#[macro_use]
extern crate thiserror;

mod socket;
mod util;

pub mod errors;
pub mod message;
pub mod net;
pub mod router;
pub mod transport;

#[cfg(feature = "locator")]
#[cfg_attr(docsrs, doc(cfg(feature = "locator")))]
pub mod locator;

pub const SSDP_PORT: u16 = 1900;
pub const SSDP_V4_IP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
/// Link-local scope SSDP group.
pub const SSDP_V6_IP: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xc);

pub use url;
