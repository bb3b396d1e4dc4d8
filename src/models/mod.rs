pub mod product;
pub mod user;
pub mod customer;
pub mod warehouse;
pub mod sale;
