//! Provider gateway abstraction and the Twelve Data implementation.
//!
//! The gateway owns the HTTP exchange only: building the request from a
//! validated query, checking the transport outcome and handing back the raw
//! JSON body. Decoding lives in [`crate::normalizer`].

mod traits;

pub mod twelve_data;

pub use traits::{ProviderGateway, RawPayload};
pub use twelve_data::TwelveDataGateway;
