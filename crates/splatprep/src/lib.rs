#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use splatprep_lie as lie;

#[doc(inline)]
pub use splatprep_3d as k3d;
