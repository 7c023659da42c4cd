#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use pcalign_optim as optim;

#[doc(inline)]
pub use pcalign_3d as p3d;

#[doc(inline)]
pub use pcalign_icp as icp;
