use utoipa::{OpenApi, openapi::OpenApi as OpenApiSpec};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{CartPatch, CreateCartRequest},
        cart_items::{AddItemRequest, CartItemList},
        products::{
            CreateProductRequest, CreateProducts, CreatedProducts, ProductList,
            UpdateProductRequest,
        },
        users::{
            AddressList, CreateUserRequest, EmailsByDomain, UpdateUserRequest, UserList,
            UserResponse,
        },
    },
    error::ErrorData,
    models::{Address, Cart, CartItem, CartOwner, CartRef, Product},
    response::{ApiResponse, Meta, Success},
    routes::{addresses, cart, cart_items, health, products, users},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        users::create_user,
        users::list_users,
        users::get_user,
        users::get_users_by_name,
        users::get_emails_by_domain,
        users::update_user,
        users::delete_user,
        addresses::add_address,
        addresses::list_addresses,
        addresses::delete_address,
        products::list_products,
        products::get_product,
        products::create_products,
        products::update_product,
        products::delete_product,
        cart::create_cart,
        cart::get_cart,
        cart::update_cart,
        cart::delete_cart,
        cart_items::add_item,
        cart_items::list_items,
        cart_items::get_item,
        cart_items::remove_item
    ),
    components(
        schemas(
            Address,
            Product,
            Cart,
            CartOwner,
            CartRef,
            CartItem,
            CartPatch,
            CreateCartRequest,
            AddItemRequest,
            CartItemList,
            CreateProductRequest,
            CreateProducts,
            CreatedProducts,
            UpdateProductRequest,
            ProductList,
            CreateUserRequest,
            UpdateUserRequest,
            UserResponse,
            UserList,
            EmailsByDomain,
            AddressList,
            ErrorData,
            Success,
            Meta,
            ApiResponse<Cart>,
            ApiResponse<CartItem>,
            ApiResponse<Product>,
            ApiResponse<UserResponse>,
            ApiResponse<ErrorData>
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Users", description = "User endpoints"),
        (name = "Addresses", description = "User address endpoints"),
        (name = "Products", description = "Product endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Cart Items", description = "Cart line item endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
