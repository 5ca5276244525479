pub mod capture;
pub mod normalize;
