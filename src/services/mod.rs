pub mod address_service;
pub mod cart_item_service;
pub mod cart_service;
pub mod cascade;
pub mod product_service;
pub mod user_service;
