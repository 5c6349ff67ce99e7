mod core;
mod quadrature;

pub use core::{Mat3, Point3, Tolerance, Transform, Vec3};
pub use quadrature::GaussLegendre;
