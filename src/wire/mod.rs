//! Wire format: newline framing and the three envelope shapes.
//!
//! - `codec`: [`LineCodec`](codec::LineCodec) framing and the push-style
//!   [`LineBuffer`](codec::LineBuffer).
//! - `envelope`: request/response/error envelopes, [`Ser`](envelope::Ser)
//!   values and [`MarshallRef`](envelope::MarshallRef) tokens.

pub mod codec;
pub mod envelope;

pub use codec::{LineBuffer, LineCodec};
pub use envelope::{
    decode, encode, DecodeFailure, Envelope, ErrorReply, MarshallRef, Request, Response, Ser,
    CALL_METHOD,
};
