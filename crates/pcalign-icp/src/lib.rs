#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod correspondence;
pub use correspondence::{find_correspondences, Correspondence};

mod index;
pub use index::{KdTreeIndex, SpatialIndex};

mod model;
pub use model::{IcpModel, PointToPlane, PointToPlaneRotation};

mod registration;
pub use registration::{
    Registration, Registration3Dof, Registration6Dof, RegistrationError, RegistrationParams,
    RegistrationStatus, RegistrationSummary,
};
