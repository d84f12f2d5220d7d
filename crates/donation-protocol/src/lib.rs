//! donation-protocol
//!
//! Wire-level encoding/decoding for the donation server.
//!
//! This crate turns logical frames ([`Request`] / [`Response`]) into
//! bytes and back again. It never touches sockets; the server crate
//! assembles complete frames from the stream and hands them here.
//!
//! - [`wire_types`]   : tags, frame layouts, frame sizes
//! - [`frames`]       : the request / response sum types
//! - [`binary_codec`] : encode / decode

pub mod wire_types;
pub mod frames;
pub mod binary_codec;

pub use binary_codec::{
    ProtocolError,
    decode_request,
    encode_request,
    decode_response,
    encode_response,
};
pub use frames::{Request, Response};
pub use wire_types::{FrameLayout, WireType};
