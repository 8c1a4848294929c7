//! URL handling module
//!
//! Normalization of discovered URLs and extraction of the registrable
//! (public-suffix-aware) domain that serves as the politeness unit.

mod domain;
mod normalize;

pub use domain::registrable_domain;
pub use normalize::{normalize_url, MAX_URL_LEN_BYTES};
