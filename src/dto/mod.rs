pub mod cart;
pub mod cart_items;
pub mod products;
pub mod users;
