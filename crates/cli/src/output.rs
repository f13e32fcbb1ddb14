//! Terminal rendering. Results go to stdout, notices and errors to stderr.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::fmt::Display;

use tienda_core::{Category, Order, Product, StockLevel, UserProfile};
use tienda_storefront::{CartApi, CartManager, Notice};

pub fn line(text: &str) {
    println!("{text}");
}

pub fn warning(text: &str) {
    eprintln!("warning: {text}");
}

pub fn error(err: &impl Display) {
    eprintln!("error: {err}");
}

pub fn notices(notices: &[Notice]) {
    for notice in notices {
        eprintln!("{notice}");
    }
}

fn stock_label(product: &Product) -> String {
    match product.stock_level() {
        StockLevel::InStock => "in stock".to_string(),
        StockLevel::Low(n) => format!("only {n} left"),
        StockLevel::OutOfStock => "out of stock".to_string(),
    }
}

pub fn products(products: &[Product]) {
    if products.is_empty() {
        println!("No products found");
        return;
    }
    for product in products {
        println!(
            "{:>5}  {:<40} {:>10}  {}",
            product.id,
            product.name,
            product.price.to_string(),
            stock_label(product)
        );
    }
}

pub fn product(product: &Product) {
    println!("#{} {}", product.id, product.name);
    println!("  Price: {}", product.price);
    println!("  Stock: {}", stock_label(product));
    if let Some(category) = product.category_id {
        println!("  Category: {category}");
    }
    if let Some(description) = &product.description {
        println!();
        println!("{description}");
    }
}

pub fn categories(categories: &[Category]) {
    for category in categories {
        match &category.description {
            Some(description) => println!("{:>5}  {}  {description}", category.id, category.name),
            None => println!("{:>5}  {}", category.id, category.name),
        }
    }
}

pub fn cart<A: CartApi>(manager: &CartManager<A>) {
    let cart = manager.cart();
    if cart.is_empty() {
        println!("Your cart is empty ({:?})", manager.phase());
        return;
    }

    for item in cart {
        println!(
            "{:>5}  {:<40} {:>4} x {:>10} = {:>10}",
            item.product_id,
            item.product.name,
            item.quantity,
            item.product.price.to_string(),
            item.line_total().to_string()
        );
    }
    println!(
        "Subtotal: {} ({} units, {:?})",
        manager.subtotal(),
        manager.total_units(),
        manager.phase()
    );
}

pub fn order(order: &Order) {
    let placed = order
        .created_at
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();

    println!(
        "Order #{}  {}  {}  {}",
        order.id,
        order.status.label(),
        order.total,
        placed
    );
    println!("  Ship to: {}", order.shipping_address);
    println!("  Payment: {}", order.payment_method);
    for line in &order.items {
        let name = line
            .product
            .as_ref()
            .map_or("(product removed)", |p| p.name.as_str());
        println!(
            "  {:>4} x {:<36} {:>10}",
            line.quantity,
            name,
            line.line_total().to_string()
        );
    }
}

pub fn profile(user: &UserProfile) {
    println!("{} <{}>", user.name, user.email);
    if let Some(phone) = &user.phone {
        println!("  Phone: {phone}");
    }
    if let Some(address) = &user.address {
        println!("  Address: {address}");
    }
    if user.is_admin() {
        println!("  Role: {}", user.role);
    }
}
