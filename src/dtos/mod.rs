pub mod product;
pub mod customer;
pub mod warehouse;
pub mod cart;
pub mod sale;
pub mod user;
