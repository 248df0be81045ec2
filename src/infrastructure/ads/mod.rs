pub mod http;
pub mod simulated;
