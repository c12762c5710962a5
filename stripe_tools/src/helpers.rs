use raiz_common::Cents;

/// Stripe amounts are integers in the smallest currency unit.
pub fn stripe_unit_amount(price: Cents) -> String {
    price.value().to_string()
}

/// Checks the shape of a secret API key without contacting Stripe.
pub fn is_plausible_secret_key(key: &str) -> bool {
    let key = key.trim();
    key.starts_with("sk_") && key.len() > 3
}
