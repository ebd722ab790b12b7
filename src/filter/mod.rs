//! # Digital Filters
//!
//! Transfer-function design ([`transfer`]) and the stateful IIR filter that
//! stages use to band-limit, emphasize and ring the signal ([`iir`]).

pub mod iir;
pub mod transfer;

pub use iir::{ChannelMask, FilterMemory, FilterSlot, IirFilter, InitialCondition};
pub use transfer::{
    butterworth, lowpass, lowpass_triple, notch, TransferFunction, NTSC_RATE, NTSC_SUBCARRIER_HZ,
};
