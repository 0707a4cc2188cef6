//! # xcert-cert: Imprints and Exposure Proofs
//!
//! The public certification façade:
//!
//! - [`imprint`] commits to a whole record under a schema.
//! - [`expose`] discloses chosen fields with the hash material needed to
//!   check them against that imprint, and nothing else.
//! - [`verify`] answers whether a proof is consistent with an imprint.
//!
//! Everything here is a pure function of its arguments. [`Cert`] binds a
//! schema once for callers that certify many records of the same shape.

pub mod cert;
pub mod conventions;
pub mod proof;

pub use cert::{expose, imprint, verify, verify_detailed, verify_with_schema, Cert};
pub use conventions::{base_asset_record, base_asset_schema};
pub use proof::{DisclosedField, ExposureProof};
