//! Consumers of the Laplacian.
//!
//! - **Heat**: automatic skinning weights by heat diffusion from bones
//! - **Rigid**: as-rigid-as-possible interactive deformation
//!
//! Both build their own [`LaplacianSystem`](crate::laplacian::LaplacianSystem)
//! from the same triangle input and share nothing at runtime.

pub mod heat;
pub mod progress;
pub mod rigid;
