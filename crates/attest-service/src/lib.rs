pub mod importer;
pub mod legacy;
pub mod rpc;
pub mod smartpass;
pub mod trust;
