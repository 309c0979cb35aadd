//! Cart commands.
//!
//! Each mutating command prints the resulting cart on success. Failures have
//! already been shown to the user by the store's notifier; the returned error
//! only decides the exit status.

use std::fmt::Write as _;

use rocketshoes_core::{Cart, ProductId};
use rocketshoes_storefront::UpdateProductAmount;
use rocketshoes_storefront::error::Result;
use rocketshoes_storefront::state::AppState;

/// Print the cart.
pub fn show(state: &AppState) {
    print_cart(&state.cart().cart());
}

/// Add one unit of a product.
pub async fn add(state: &AppState, product_id: ProductId) -> Result<()> {
    state.cart().add_product(product_id).await?;
    print_cart(&state.cart().cart());
    Ok(())
}

/// Remove a product.
pub async fn remove(state: &AppState, product_id: ProductId) -> Result<()> {
    state.cart().remove_product(product_id).await?;
    print_cart(&state.cart().cart());
    Ok(())
}

/// Set a product's quantity.
pub async fn update(state: &AppState, product_id: ProductId, amount: i64) -> Result<()> {
    state
        .cart()
        .update_product_amount(UpdateProductAmount::new(product_id, amount))
        .await?;
    print_cart(&state.cart().cart());
    Ok(())
}

fn print_cart(cart: &Cart) {
    #[allow(clippy::print_stdout)]
    {
        print!("{}", render_cart(cart));
    }
}

/// Render the cart as a plain-text table.
fn render_cart(cart: &Cart) -> String {
    if cart.is_empty() {
        return "Cart is empty\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:>5}  {:<32} {:>10} {:>5} {:>11}", "ID", "PRODUCT", "PRICE", "QTY", "SUBTOTAL");
    for item in cart {
        let _ = writeln!(
            out,
            "{:>5}  {:<32} {:>10} {:>5} {:>11}",
            item.id,
            truncate(item.title(), 32),
            item.unit_price().to_string(),
            item.amount,
            item.line_total().to_string(),
        );
    }
    let _ = writeln!(
        out,
        "{} item(s), total {}",
        cart.item_count(),
        cart.subtotal()
    );
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rocketshoes_core::{Price, Product};

    use super::*;

    #[test]
    fn test_render_empty_cart() {
        assert_eq!(render_cart(&Cart::new()), "Cart is empty\n");
    }

    #[test]
    fn test_render_cart_totals() {
        let mut cart = Cart::new();
        cart.push(Product::new(ProductId::new(1), "Tênis de Caminhada", Price::from_cents(17990)))
            .unwrap();
        cart.set_amount(ProductId::new(1), 2).unwrap();

        let out = render_cart(&cart);
        assert!(out.contains("Tênis de Caminhada"));
        assert!(out.contains("$179.90"));
        assert!(out.contains("$359.80"));
        assert!(out.ends_with("2 item(s), total $359.80\n"));
    }

    #[test]
    fn test_render_entry_without_display_fields() {
        let cart: Cart = serde_json::from_str(r#"[{"id":3,"amount":1}]"#).unwrap();

        let out = render_cart(&cart);
        assert!(out.contains("$0.00"));
        assert!(out.ends_with("1 item(s), total $0.00\n"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
