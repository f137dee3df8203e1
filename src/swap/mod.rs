//! Swap transaction pipeline
//!
//! From a human-expressed strategy to a submitted transaction:
//! amount resolution against the current snapshot, prepared-payload request,
//! two-format decode, blockhash refresh + fee-payer normalization, and a
//! bounded sign-and-submit. Failures are typed, user-displayable, and never
//! retried automatically.

pub mod decode;
pub mod pipeline;

pub use decode::{decode_swap_payload, normalize};
pub use pipeline::{SwapPhase, SwapPipeline};
