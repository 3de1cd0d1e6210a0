//! Key material for threshold ceremonies.
//!
//! - [`generators`]: the G, X, U generators and Monero hash-to-point
//! - [`shares`]: Shamir dealing and Lagrange coefficients over filters
//! - [`account`]: the [`KeyShareProvider`] seam and [`MultisigAccount`]
//! - [`image`]: cooperative key images from partial contributions
//! - [`encoding`]: wire bytes <-> curve types

pub mod account;
pub mod encoding;
pub mod generators;
pub mod image;
pub mod shares;

pub use account::{deal_accounts, KeyShareProvider, MultisigAccount};
pub use encoding::{bytes_to_point, bytes_to_prime_order_point, bytes_to_scalar, point_to_bytes};
pub use generators::{generator_g, generator_u, generator_x, hash_to_point};
pub use image::{aggregate_partial_key_images, compute_partial_key_image};
pub use shares::{deal_key_shares, lagrange_coefficient};
