pub mod optimizer;
pub mod packer;
