//! Order message composition for WhatsApp checkout

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::value_objects::{format_money, WhatsappNumber};
use crate::StorefrontError;

/// Payment method that may carry a change amount.
pub const CASH_PAYMENT: &str = "dinheiro";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(default, deserialize_with = "int_or_zero")]
    pub qty: i64,
    #[serde(default, deserialize_with = "int_or_zero")]
    pub price_cents: i64,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub name: String,
}

impl CartLine {
    pub fn subtotal(&self) -> i64 { self.qty.saturating_mul(self.price_cents) }
}

/// Checkout payload sent by the storefront. Null fields read as empty, so a
/// missing customer field surfaces as `IncompleteOrder`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub customer_name: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub address: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub phone: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub payment_method: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub change_for: Option<String>,
    #[serde(default, deserialize_with = "lines_or_empty")]
    pub items: Vec<CartLine>,
}

// =============================================================================
// Lenient field decoding
// =============================================================================

fn scalar_text<E: de::Error>(value: Value) -> Result<String, E> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(E::custom(format!("expected text, got {other}"))),
    }
}

/// Text field that treats null as empty and accepts numbers.
fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_text(Value::deserialize(deserializer)?)
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = scalar_text::<D::Error>(Value::deserialize(deserializer)?)?;
    Ok(Some(text).filter(|t| !t.trim().is_empty()))
}

/// Integer field that treats null and blank text as 0 and accepts numeric
/// strings. Fractions are truncated.
fn int_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| de::Error::custom(format!("invalid integer: {n}"))),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s.trim().parse().map_err(|_| de::Error::custom(format!("invalid integer: {s:?}"))),
        other => Err(de::Error::custom(format!("expected integer, got {other}"))),
    }
}

fn lines_or_empty<'de, D>(deserializer: D) -> Result<Vec<CartLine>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<CartLine>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub message: String,
    pub total_cents: i64,
}

impl OrderSummary {
    /// `https://wa.me/<digits>?text=<percent-encoded message>`
    pub fn whatsapp_link(&self, store_number: &WhatsappNumber) -> String {
        format!("https://wa.me/{}?text={}", store_number.as_str(), urlencoding::encode(&self.message))
    }
}

/// Builds the order message and total. Lines with a non-positive quantity are
/// dropped silently.
pub fn compose_order(store_name: &str, order: &OrderRequest) -> Result<OrderSummary, StorefrontError> {
    let customer_name = order.customer_name.trim();
    let address = order.address.trim();
    let phone = order.phone.trim();
    let payment_method = order.payment_method.trim();
    if customer_name.is_empty() || address.is_empty() || phone.is_empty() || payment_method.is_empty() || order.items.is_empty() {
        return Err(StorefrontError::IncompleteOrder);
    }

    let mut total_cents: i64 = 0;
    let mut lines = Vec::with_capacity(order.items.len());
    for item in order.items.iter().filter(|i| i.qty > 0) {
        let subtotal = item.subtotal();
        total_cents = total_cents.saturating_add(subtotal);
        let name = match item.name.trim() { "" => "Item", n => n };
        lines.push(format!("• {}x {} — {}", item.qty, name, format_money(subtotal)));
    }
    if lines.is_empty() { return Err(StorefrontError::EmptyCart); }

    let mut payment = payment_method.to_string();
    let change_for = order.change_for.as_deref().map(str::trim).unwrap_or_default();
    if payment_method.eq_ignore_ascii_case(CASH_PAYMENT) && !change_for.is_empty() {
        payment.push_str(&format!(" (troco para {change_for})"));
    }

    let message = format!(
        "🛒 *Pedido — {store_name}*\n\n\
         👤 *Nome:* {customer_name}\n\
         📍 *Endereço:* {address}\n\
         📞 *WhatsApp/Telefone:* {phone}\n\
         💳 *Pagamento:* {payment}\n\n\
         📦 *Itens:*\n{}\n\n\
         💰 *Total:* {}\n\n\
         ✅ Pedido confirmado.",
        lines.join("\n"),
        format_money(total_cents),
    );
    Ok(OrderSummary { message, total_cents })
}
