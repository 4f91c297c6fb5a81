pub mod bill;
pub mod cash_register;
pub mod client;
pub mod finance;
pub mod order;
pub mod owner;
pub mod product;
pub mod supplier;
pub mod user;
