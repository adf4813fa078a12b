pub mod capture_delegate;
pub mod transport;
