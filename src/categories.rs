use crate::error::{BlogError, BlogResult, ValidationError};
use crate::gateway::Gateway;
use crate::models::Category;

/// Categories the sidebar shows.
pub const SIDEBAR_CATEGORIES: usize = 6;

/// An empty category is removed by the server once its last post goes.
pub fn is_at_risk(category: &Category) -> bool {
    category.post_count == 0
}

/// Check a new category name against the known ones. Returns the trimmed
/// name to submit.
pub fn validate_new_name(existing: &[Category], name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }
    if contains_name(existing, name) {
        return Err(ValidationError::DuplicateCategory);
    }
    Ok(name.to_string())
}

fn contains_name(categories: &[Category], name: &str) -> bool {
    let wanted = name.trim().to_lowercase();
    categories
        .iter()
        .any(|category| category.name.trim().to_lowercase() == wanted)
}

/// Create a category after validating against a fresh listing, and return
/// the listing as it stands afterwards.
///
/// A server rejection counts as a duplicate when it is a 409, or when the
/// name shows up on a second listing. Other failures pass through.
pub async fn create_category(gateway: &Gateway, name: &str) -> BlogResult<Vec<Category>> {
    let existing = gateway.list_categories().await?;
    let name = validate_new_name(&existing, name)?;

    match gateway.post_category(&name).await {
        Ok(()) => {}
        Err(BlogError::Status { status: 409, .. }) => {
            tracing::debug!("Server reported category {} as a duplicate", name);
            return Err(ValidationError::DuplicateCategory.into());
        }
        Err(e) => {
            let refreshed = gateway.list_categories().await.unwrap_or_default();
            if contains_name(&refreshed, &name) {
                tracing::debug!("Category {} appeared after a failed create: {}", name, e);
                return Err(ValidationError::DuplicateCategory.into());
            }
            tracing::warn!("Failed to create category {}: {}", name, e);
            return Err(e);
        }
    }

    tracing::info!("Created category {}", name);
    gateway.list_categories().await
}

/// The `n` categories with the most posts. Equal counts keep server order.
pub fn top_categories(categories: &[Category], n: usize) -> Vec<Category> {
    let mut sorted = categories.to_vec();
    sorted.sort_by(|a, b| b.post_count.cmp(&a.post_count));
    sorted.truncate(n);
    sorted
}
