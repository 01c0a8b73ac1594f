pub mod access;
pub mod identity;
pub mod password;
