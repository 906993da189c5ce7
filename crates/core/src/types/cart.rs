//! Cart lines and carts.
//!
//! A cart never holds two lines with the same [`LineKey`]. Adding a product
//! that is already present sums into the existing line instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{CartLineId, ProductId, UserId};
use super::price::{CurrencyCode, Price};

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantity must be at least one.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Unit price must not be negative.
    #[error("unit price cannot be negative")]
    NegativePrice,

    /// No line with this ID in the cart.
    #[error("cart line not found: {0}")]
    LineNotFound(CartLineId),

    /// Lines are priced in more than one currency.
    #[error("cart contains lines in more than one currency")]
    MixedCurrency,

    /// A line or cart total is too large to represent.
    #[error("cart amount is too large")]
    AmountOverflow,

    /// A line would exceed the configured per-line quantity.
    #[error("quantity exceeds the limit of {max} per line")]
    QuantityLimit {
        /// Largest quantity allowed on one line.
        max: u32,
    },
}

/// Merge identity of a cart line: the product and its variant label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub product_id: Option<ProductId>,
    pub variant_label: Option<String>,
}

/// One purchasable line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Opaque line identifier.
    pub id: CartLineId,
    /// Catalog product, if the line refers to one.
    pub product_id: Option<ProductId>,
    /// Variant label such as "Box of 6".
    pub variant_label: Option<String>,
    /// Price of a single unit.
    pub unit_price: Price,
    /// Number of units, always at least one.
    pub quantity: u32,
    /// When the line was last changed.
    pub last_modified: DateTime<Utc>,
}

impl CartLine {
    /// Create a new line with a fresh ID.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a zero quantity,
    /// `CartError::NegativePrice` for a negative unit price, and
    /// `CartError::AmountOverflow` if the line total cannot be represented.
    pub fn new(
        product_id: Option<ProductId>,
        variant_label: Option<String>,
        unit_price: Price,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if unit_price.is_negative() {
            return Err(CartError::NegativePrice);
        }
        unit_price
            .times(quantity)
            .ok_or(CartError::AmountOverflow)?;

        Ok(Self {
            id: CartLineId::generate(),
            product_id,
            variant_label,
            unit_price,
            quantity,
            last_modified: now,
        })
    }

    /// The key this line merges on.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id,
            variant_label: self.variant_label.clone(),
        }
    }

    /// Whether two lines share a merge key.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.product_id == other.product_id && self.variant_label == other.variant_label
    }

    /// Unit price times quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::AmountOverflow` if the total cannot be represented.
    pub fn line_total(&self) -> Result<Price, CartError> {
        self.unit_price
            .times(self.quantity)
            .ok_or(CartError::AmountOverflow)
    }
}

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum CartOwner {
    /// A browsing session that has not signed in.
    Anonymous(String),
    /// A signed-in account.
    Identity(UserId),
}

/// An ordered collection of cart lines belonging to one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    owner: CartOwner,
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new(owner: CartOwner) -> Self {
        Self {
            owner,
            lines: Vec::new(),
        }
    }

    /// Build a cart from stored lines.
    ///
    /// Lines sharing a key are folded into the first occurrence by summing
    /// quantities, so storage that broke the one-line-per-key rule is repaired
    /// on load.
    #[must_use]
    pub fn from_lines(owner: CartOwner, lines: Vec<CartLine>) -> Self {
        let mut cart = Self::new(owner);
        for line in lines {
            cart.add(line);
        }
        cart
    }

    /// The cart's owner.
    #[must_use]
    pub const fn owner(&self) -> &CartOwner {
        &self.owner
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Consume the cart, returning its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Look up a line by ID.
    #[must_use]
    pub fn line(&self, id: CartLineId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.id == id)
    }

    /// Add a line, summing into an existing line with the same key.
    ///
    /// The existing line keeps its ID and unit price. Returns the ID of the
    /// line that now holds the quantity.
    pub fn add(&mut self, line: CartLine) -> CartLineId {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.same_key(&line)) {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
            existing.last_modified = existing.last_modified.max(line.last_modified);
            return existing.id;
        }

        let id = line.id;
        self.lines.push(line);
        id
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if no line has this ID.
    pub fn set_quantity(
        &mut self,
        id: CartLineId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(id).map(|_| ());
        }

        let line = self
            .lines
            .iter_mut()
            .find(|line| line.id == id)
            .ok_or(CartError::LineNotFound(id))?;
        line.quantity = quantity;
        line.last_modified = now;
        Ok(())
    }

    /// Remove a line, returning it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if no line has this ID.
    pub fn remove(&mut self, id: CartLineId) -> Result<CartLine, CartError> {
        let index = self
            .lines
            .iter()
            .position(|line| line.id == id)
            .ok_or(CartError::LineNotFound(id))?;
        Ok(self.lines.remove(index))
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of all line totals.
    ///
    /// An empty cart totals zero in `fallback_currency`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::MixedCurrency` if lines use different currencies
    /// and `CartError::AmountOverflow` if the total cannot be represented.
    pub fn subtotal(&self, fallback_currency: CurrencyCode) -> Result<Price, CartError> {
        let currency = self
            .lines
            .first()
            .map_or(fallback_currency, |line| line.unit_price.currency_code);
        if self
            .lines
            .iter()
            .any(|line| line.unit_price.currency_code != currency)
        {
            return Err(CartError::MixedCurrency);
        }

        self.lines.iter().try_fold(Price::zero(currency), |acc, line| {
            acc.checked_add(&line.line_total()?)
                .ok_or(CartError::AmountOverflow)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn usd(cents: i64) -> Price {
        Price::new(Decimal::new(cents, 2), CurrencyCode::USD)
    }

    fn line(product: i32, variant: Option<&str>, quantity: u32) -> CartLine {
        CartLine::new(
            Some(ProductId::new(product)),
            variant.map(String::from),
            usd(500),
            quantity,
            at(0),
        )
        .unwrap()
    }

    fn guest_cart() -> Cart {
        Cart::new(CartOwner::Anonymous("session-abc".to_string()))
    }

    #[test]
    fn test_new_line_validates() {
        assert_eq!(
            CartLine::new(None, None, usd(100), 0, at(0)),
            Err(CartError::InvalidQuantity)
        );
        assert_eq!(
            CartLine::new(None, None, usd(-100), 1, at(0)),
            Err(CartError::NegativePrice)
        );
    }

    #[test]
    fn test_add_sums_same_key() {
        let mut cart = guest_cart();
        let first = cart.add(line(1, Some("Box of 6"), 2));
        let second = cart.add(line(1, Some("Box of 6"), 3));

        assert_eq!(first, second);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_add_keeps_distinct_variants_apart() {
        let mut cart = guest_cart();
        cart.add(line(1, Some("Box of 6"), 1));
        cart.add(line(1, Some("Box of 12"), 1));
        cart.add(line(1, None, 1));

        assert_eq!(cart.lines().len(), 3);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = guest_cart();
        let id = cart.add(line(1, None, 2));

        cart.set_quantity(id, 0, at(10)).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_stamps_time() {
        let mut cart = guest_cart();
        let id = cart.add(line(1, None, 2));

        cart.set_quantity(id, 7, at(10)).unwrap();
        let updated = cart.line(id).unwrap();
        assert_eq!(updated.quantity, 7);
        assert_eq!(updated.last_modified, at(10));
    }

    #[test]
    fn test_unknown_line_errors() {
        let mut cart = guest_cart();
        let missing = CartLineId::generate();

        assert_eq!(
            cart.set_quantity(missing, 1, at(0)),
            Err(CartError::LineNotFound(missing))
        );
        assert_eq!(cart.remove(missing), Err(CartError::LineNotFound(missing)));
    }

    #[test]
    fn test_subtotal() {
        let mut cart = guest_cart();
        assert_eq!(cart.subtotal(CurrencyCode::EUR).unwrap(), Price::zero(CurrencyCode::EUR));

        cart.add(line(1, None, 2));
        cart.add(line(2, None, 1));
        assert_eq!(cart.subtotal(CurrencyCode::USD).unwrap(), usd(1500));
    }

    #[test]
    fn test_subtotal_mixed_currency() {
        let mut cart = guest_cart();
        cart.add(line(1, None, 1));
        cart.add(
            CartLine::new(
                Some(ProductId::new(2)),
                None,
                Price::new(Decimal::ONE, CurrencyCode::GBP),
                1,
                at(0),
            )
            .unwrap(),
        );

        assert_eq!(
            cart.subtotal(CurrencyCode::USD),
            Err(CartError::MixedCurrency)
        );
    }

    #[test]
    fn test_new_line_rejects_unrepresentable_total() {
        let max = Price::new(Decimal::MAX, CurrencyCode::USD);
        assert_eq!(
            CartLine::new(None, None, max, 2, at(0)),
            Err(CartError::AmountOverflow)
        );
        assert!(CartLine::new(None, None, max, 1, at(0)).is_ok());
    }

    #[test]
    fn test_subtotal_overflow_is_an_error() {
        let max = Price::new(Decimal::MAX, CurrencyCode::USD);
        let mut cart = guest_cart();
        let mut big = CartLine::new(Some(ProductId::new(1)), None, max, 1, at(0)).unwrap();
        // Stored lines bypass `CartLine::new`.
        big.quantity = 2;
        cart.add(big);

        assert_eq!(
            cart.lines()[0].line_total(),
            Err(CartError::AmountOverflow)
        );
        assert_eq!(
            cart.subtotal(CurrencyCode::USD),
            Err(CartError::AmountOverflow)
        );

        let mut cart = guest_cart();
        cart.add(CartLine::new(Some(ProductId::new(1)), None, max, 1, at(0)).unwrap());
        cart.add(CartLine::new(Some(ProductId::new(2)), None, max, 1, at(0)).unwrap());
        assert_eq!(
            cart.subtotal(CurrencyCode::USD),
            Err(CartError::AmountOverflow)
        );
    }

    #[test]
    fn test_from_lines_folds_duplicates() {
        let cart = Cart::from_lines(
            CartOwner::Identity(UserId::new(1)),
            vec![line(1, None, 1), line(2, None, 1), line(1, None, 4)],
        );

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.lines()[0].quantity, 5);
    }

    #[test]
    fn test_owner_serialization() {
        let json = serde_json::to_value(CartOwner::Identity(UserId::new(3))).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "identity", "key": 3}));
    }
}
