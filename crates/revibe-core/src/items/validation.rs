//! Item validation.

use chrono::{NaiveDate, NaiveTime};

use super::model::{BinCategory, DATE_FORMAT, ItemUpdate, NewItem, TIME_FORMAT};

/// Validation error for item data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Bin category is empty.
    EmptyCategory,
    /// Bin category is not one of the known bins.
    UnknownCategory(String),
    /// Title is empty.
    EmptyTitle,
    /// Description is empty.
    EmptyDescription,
    /// Creation date is not `YYYY-MM-DD`.
    InvalidDate,
    /// Creation time is not `HH:MM:SS`.
    InvalidTime,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyCategory => "Bin category is required",
            Self::UnknownCategory(_) => "Unknown bin category",
            Self::EmptyTitle => "Title is required",
            Self::EmptyDescription => "Description is required",
            Self::InvalidDate => "Date must be YYYY-MM-DD",
            Self::InvalidTime => "Time must be HH:MM:SS",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyCategory | Self::UnknownCategory(_) => "bin_category",
            Self::EmptyTitle => "description_title",
            Self::EmptyDescription => "description",
            Self::InvalidDate => "created_date",
            Self::InvalidTime => "created_time",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCategory(name) => write!(f, "{}: {name}", self.message()),
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating an item.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate a new item before insertion.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_new_item(item: &NewItem) -> ValidationResult {
    let mut errors = Vec::new();

    check_content(
        &item.bin_category,
        &item.description_title,
        &item.description,
        &mut errors,
    );

    if NaiveDate::parse_from_str(&item.created_date, DATE_FORMAT).is_err() {
        errors.push(ValidationError::InvalidDate);
    }
    if NaiveTime::parse_from_str(&item.created_time, TIME_FORMAT).is_err() {
        errors.push(ValidationError::InvalidTime);
    }

    finish(errors)
}

/// Check that `category` names one of the known bins.
///
/// The store accepts any non-empty category; callers that want the closed
/// set enforce it with this.
///
/// # Errors
///
/// Returns `EmptyCategory` or `UnknownCategory`.
pub fn validate_category(category: &str) -> Result<BinCategory, ValidationError> {
    if category.trim().is_empty() {
        return Err(ValidationError::EmptyCategory);
    }
    BinCategory::parse(category).ok_or_else(|| ValidationError::UnknownCategory(category.to_string()))
}

/// Validate replacement values before an update.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_update(update: &ItemUpdate) -> ValidationResult {
    let mut errors = Vec::new();
    check_content(
        &update.bin_category,
        &update.description_title,
        &update.description,
        &mut errors,
    );
    finish(errors)
}

fn check_content(
    category: &str,
    title: &str,
    description: &str,
    errors: &mut Vec<ValidationError>,
) {
    if category.trim().is_empty() {
        errors.push(ValidationError::EmptyCategory);
    }

    if title.trim().is_empty() {
        errors.push(ValidationError::EmptyTitle);
    }

    if description.trim().is_empty() {
        errors.push(ValidationError::EmptyDescription);
    }
}

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_item() -> NewItem {
        NewItem::new("Plastic", "Water bottle", "PET bottle").with_created("2024-05-01", "12:00:00")
    }

    #[test]
    fn test_valid_item() {
        assert!(validate_new_item(&valid_item()).is_ok());
    }

    #[test]
    fn test_empty_fields() {
        let mut item = valid_item();
        item.bin_category = String::new();
        item.description_title = "  ".to_string();
        item.description = String::new();

        let errors = validate_new_item(&item).unwrap_err();
        assert!(errors.contains(&ValidationError::EmptyCategory));
        assert!(errors.contains(&ValidationError::EmptyTitle));
        assert!(errors.contains(&ValidationError::EmptyDescription));
    }

    #[test]
    fn test_unknown_category_left_to_caller() {
        let mut item = valid_item();
        item.bin_category = "Wood".to_string();
        assert!(validate_new_item(&item).is_ok());

        let err = validate_category("Wood").unwrap_err();
        assert_eq!(err, ValidationError::UnknownCategory("Wood".to_string()));
        assert_eq!(err.field(), "bin_category");
        assert_eq!(err.to_string(), "Unknown bin category: Wood");
    }

    #[test]
    fn test_validate_category() {
        assert_eq!(validate_category("Metal").unwrap(), BinCategory::Metal);
        assert_eq!(
            validate_category(" ").unwrap_err(),
            ValidationError::EmptyCategory
        );
        assert!(validate_category("metal").is_err());
    }

    #[test]
    fn test_bad_stamp() {
        let item = valid_item().with_created("01/05/2024", "25:00:00");
        let errors = validate_new_item(&item).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidDate, ValidationError::InvalidTime]
        );
    }

    #[test]
    fn test_update_validation() {
        let update = ItemUpdate {
            bin_category: "Glass".to_string(),
            description_title: String::new(),
            description: "Jar".to_string(),
            ideas: Vec::new(),
            image_uri: None,
        };
        assert_eq!(
            validate_update(&update).unwrap_err(),
            vec![ValidationError::EmptyTitle]
        );
    }
}
