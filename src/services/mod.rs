pub mod acceptance;
pub mod client_identity;
pub mod intake;
pub mod validator;
