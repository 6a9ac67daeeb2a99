pub mod collision;
pub mod entity;
pub mod geometry;
pub mod kinematics;
pub mod solids;
