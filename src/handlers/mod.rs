pub mod product;
pub mod customer;
pub mod warehouse;
pub mod user;
pub mod pos;
pub mod sale;
