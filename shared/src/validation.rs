//! Validation utilities for the PharmStock platform
//!
//! Pure input checks shared between the backend services and tests.

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Validate SKU format (3-32 chars, uppercase alphanumeric plus `-`).
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.len() < 3 {
        return Err("SKU must be at least 3 characters");
    }
    if sku.len() > 32 {
        return Err("SKU must be at most 32 characters");
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("SKU must be uppercase alphanumeric with dashes only");
    }
    Ok(())
}

/// Validate a batch number (non-empty, at most 64 chars, no whitespace).
pub fn validate_batch_number(batch_number: &str) -> Result<(), &'static str> {
    if batch_number.trim().is_empty() {
        return Err("Batch number cannot be empty");
    }
    if batch_number.len() > 64 {
        return Err("Batch number must be at most 64 characters");
    }
    if batch_number.chars().any(|c| c.is_whitespace()) {
        return Err("Batch number cannot contain whitespace");
    }
    Ok(())
}

/// A batch must expire strictly after it was manufactured.
pub fn validate_batch_dates(
    manufacturing_date: NaiveDate,
    expiry_date: NaiveDate,
) -> Result<(), &'static str> {
    if expiry_date <= manufacturing_date {
        return Err("Expiry date must be after manufacturing date");
    }
    Ok(())
}

/// Stock quantities entering the system must be strictly positive.
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    Ok(())
}

pub fn validate_non_negative_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    Ok(())
}

/// Discount and tax percentages live in [0, 100].
pub fn validate_percent(percent: Decimal) -> Result<(), &'static str> {
    if percent < Decimal::ZERO || percent > Decimal::from(100) {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate vendor code format (3-10 uppercase alphanumeric).
pub fn validate_vendor_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 3 {
        return Err("Vendor code must be at least 3 characters");
    }
    if code.len() > 10 {
        return Err("Vendor code must be at most 10 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Vendor code must be uppercase alphanumeric only");
    }
    Ok(())
}
