pub mod bcn;
pub mod lstm;
pub mod maxout;
pub mod scalar_mix;

pub use bcn::{Bcn, BcnInput};
pub use lstm::{BiLstm, Lstm};
pub use maxout::{Maxout, MaxoutBlock, MAXOUT_PIECES};
pub use scalar_mix::ScalarMix;
