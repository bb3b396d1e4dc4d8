//! Register carts, checkout guards, return selection and receipt rendering.

pub mod cart;
pub mod checkout;
pub mod receipt;
pub mod register;
pub mod returns;
