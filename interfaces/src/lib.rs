//! UE Service Access Point Library
//! 
//! This crate provides the contracts between the UE RRC and the surrounding
//! MAC, PHY, NAS and RRC protocol entities, together with the decoded RRC
//! messages carried across them.

pub mod message_types;
pub mod sap;

pub use message_types::*;
pub use sap::*;
