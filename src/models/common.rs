use serde::{Deserialize, Deserializer, Serialize};

/// Backend-assigned, opaque record identifier
pub type UserId = String;

/// Error body of the JSON operational endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorResponse {
    pub fn new(error: String) -> Self {
        Self {
            error,
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_details(error: String, details: String) -> Self {
        Self {
            error,
            details: Some(details),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Field a listing can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Name,
    Email,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

/// One page of a listing: 1-based page number, explicit size, optional
/// case-insensitive search term and optional ordering
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
    pub search: Option<String>,
    pub sort: Option<Sort>,
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page,
            size,
            search: None,
            sort: None,
        }
    }

    /// An empty term means "no search"; any other term is kept verbatim
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.is_empty() { None } else { Some(search) };
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// Page of items plus the metadata the listing view needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub search: Option<String>,
}

impl<T> PageResult<T> {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Form values arrive as strings; blank ones mean "not provided"
pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_search_is_no_search() {
        let request = PageRequest::new(1, 5).with_search("");
        assert_eq!(request.search, None);

        let request = PageRequest::new(1, 5).with_search(" ana");
        assert_eq!(request.search.as_deref(), Some(" ana"));

        let request = PageRequest::new(1, 5).with_search("ana");
        assert_eq!(request.search.as_deref(), Some("ana"));
    }

    #[test]
    fn test_page_navigation_flags() {
        let page: PageResult<()> = PageResult {
            items: vec![],
            page: 2,
            size: 5,
            total_items: 12,
            total_pages: 3,
            search: None,
        };

        assert!(page.has_previous());
        assert!(page.has_next());
    }
}
