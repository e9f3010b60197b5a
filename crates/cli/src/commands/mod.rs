pub mod await_payment;
pub mod check_node;
pub mod common;
pub mod decode_address;
pub mod derive;
