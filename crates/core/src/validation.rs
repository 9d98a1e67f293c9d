//! Product field validation shared by single-product CRUD and bulk ingest.
//!
//! Bulk ingest is all-or-nothing: [`validate_rows`] checks every row and
//! reports every offending row index, so a caller never has to apply a dataset
//! to learn that row 40 was bad.

use std::collections::HashMap;

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{InventoryRow, ProductInput, ProductPatch, UnitPrice};

/// Maximum length of a product name, in characters.
pub const MAX_NAME_LENGTH: usize = 120;

/// Maximum length of a product description, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// A single field-level validation failure.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FieldError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("name must be at most {max} characters")]
    NameTooLong { max: usize },
    #[error("description must be at most {max} characters")]
    DescriptionTooLong { max: usize },
    #[error("price must not be negative (got {price})")]
    NegativePrice { price: Decimal },
    #[error("quantity must not be negative (got {quantity})")]
    NegativeQuantity { quantity: i64 },
    #[error("quantity must be at most {max} (got {quantity})")]
    QuantityTooLarge { quantity: i64, max: u32 },
    #[error("name duplicates row {first_index}")]
    DuplicateName { first_index: usize },
}

/// All validation failures of one row, by zero-based row index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub index: usize,
    pub errors: Vec<FieldError>,
}

/// Every failing row of a dataset. Never empty when returned as an error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[error("{}", format_row_errors(.0))]
pub struct RowErrors(pub Vec<RowError>);

impl RowErrors {
    /// Zero-based indexes of the offending rows, in ascending order.
    #[must_use]
    pub fn indexes(&self) -> Vec<usize> {
        self.0.iter().map(|row| row.index).collect()
    }
}

fn format_row_errors(rows: &[RowError]) -> String {
    rows.iter()
        .map(|row| {
            let details = row
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("row {}: {details}", row.index)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Product fields that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRow {
    pub name: String,
    pub unit_price: UnitPrice,
    pub description: Option<String>,
    pub quantity: u32,
    pub image_url: Option<Url>,
}

impl fmt::Display for ValidatedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{} @ {}", self.name, self.quantity, self.unit_price)
    }
}

/// A product patch whose present fields passed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedPatch {
    pub name: Option<String>,
    pub unit_price: Option<UnitPrice>,
    pub description: Option<String>,
    pub quantity: Option<u32>,
    pub image_url: Option<Url>,
}

fn check_name(name: &str, errors: &mut Vec<FieldError>) {
    if name.trim().is_empty() {
        errors.push(FieldError::EmptyName);
    } else if name.chars().count() > MAX_NAME_LENGTH {
        errors.push(FieldError::NameTooLong {
            max: MAX_NAME_LENGTH,
        });
    }
}

fn check_description(description: Option<&str>, errors: &mut Vec<FieldError>) {
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LENGTH) {
        errors.push(FieldError::DescriptionTooLong {
            max: MAX_DESCRIPTION_LENGTH,
        });
    }
}

fn check_price(price: Decimal, errors: &mut Vec<FieldError>) -> Option<UnitPrice> {
    UnitPrice::new(price).map_or_else(
        |_| {
            errors.push(FieldError::NegativePrice { price });
            None
        },
        Some,
    )
}

fn check_quantity(quantity: i64, errors: &mut Vec<FieldError>) -> Option<u32> {
    if quantity < 0 {
        errors.push(FieldError::NegativeQuantity { quantity });
        return None;
    }
    u32::try_from(quantity).map_or_else(
        |_| {
            errors.push(FieldError::QuantityTooLarge {
                quantity,
                max: u32::MAX,
            });
            None
        },
        Some,
    )
}

fn validate_fields(
    name: &str,
    unit_price: Decimal,
    description: Option<&str>,
    quantity: i64,
    image_url: Option<&Url>,
) -> Result<ValidatedRow, Vec<FieldError>> {
    let mut errors = Vec::new();
    check_name(name, &mut errors);
    check_description(description, &mut errors);
    let unit_price = check_price(unit_price, &mut errors);
    let quantity = check_quantity(quantity, &mut errors);

    match (unit_price, quantity) {
        (Some(unit_price), Some(quantity)) if errors.is_empty() => Ok(ValidatedRow {
            name: name.to_owned(),
            unit_price,
            description: description.map(str::to_owned),
            quantity,
            image_url: image_url.cloned(),
        }),
        _ => Err(errors),
    }
}

impl ProductInput {
    /// Validate a single product for creation.
    ///
    /// # Errors
    ///
    /// Returns every field that failed validation.
    pub fn validate(&self) -> Result<ValidatedRow, Vec<FieldError>> {
        validate_fields(
            &self.name,
            self.unit_price,
            self.description.as_deref(),
            self.quantity,
            self.image_url.as_ref(),
        )
    }
}

impl ProductPatch {
    /// Validate the fields present in the patch.
    ///
    /// # Errors
    ///
    /// Returns every present field that failed validation.
    pub fn validate(&self) -> Result<ValidatedPatch, Vec<FieldError>> {
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            check_name(name, &mut errors);
        }
        check_description(self.description.as_deref(), &mut errors);
        let unit_price = self
            .unit_price
            .and_then(|price| check_price(price, &mut errors));
        let quantity = self
            .quantity
            .and_then(|quantity| check_quantity(quantity, &mut errors));

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidatedPatch {
            name: self.name.clone(),
            unit_price,
            description: self.description.clone(),
            quantity,
            image_url: self.image_url.clone(),
        })
    }
}

/// Validate a full ingest dataset.
///
/// Names must be unique within the dataset (exact, case-sensitive match, the
/// same rule merge uses to find existing products).
///
/// # Errors
///
/// Returns [`RowErrors`] naming every offending row if any row fails.
pub fn validate_rows(rows: &[InventoryRow]) -> Result<Vec<ValidatedRow>, RowErrors> {
    let mut validated = Vec::with_capacity(rows.len());
    let mut failures = Vec::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let mut result = validate_fields(
            &row.name,
            row.unit_price,
            row.description.as_deref(),
            row.quantity,
            None,
        );

        if !row.name.trim().is_empty() {
            if let Some(&first_index) = first_seen.get(row.name.as_str()) {
                let duplicate = FieldError::DuplicateName { first_index };
                result = match result {
                    Ok(_) => Err(vec![duplicate]),
                    Err(mut errors) => {
                        errors.push(duplicate);
                        Err(errors)
                    }
                };
            } else {
                first_seen.insert(row.name.as_str(), index);
            }
        }

        match result {
            Ok(row) => validated.push(row),
            Err(errors) => failures.push(RowError { index, errors }),
        }
    }

    if failures.is_empty() {
        Ok(validated)
    } else {
        Err(RowErrors(failures))
    }
}
