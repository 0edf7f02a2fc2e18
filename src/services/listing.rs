//! In-memory search, ordering and pagination over a fully fetched record set.
//!
//! Search is a client-side filter: the whole collection is fetched and
//! narrowed here, so it only suits collections that fit in memory per request.

use std::cmp::Ordering;

use crate::models::{PageRequest, PageResult, Sort, SortField, SortOrder, User};

/// Case-insensitive substring match on name or email. The term is used
/// as given, surrounding whitespace included.
pub fn matches(user: &User, term: &str) -> bool {
    let term = term.to_lowercase();
    user.name.to_lowercase().contains(&term) || user.email.to_lowercase().contains(&term)
}

/// Records matching the search term, in their original relative order.
/// An absent or empty term keeps every record.
pub fn filter(users: Vec<User>, search: Option<&str>) -> Vec<User> {
    match search {
        Some(term) if !term.is_empty() => users.into_iter().filter(|user| matches(user, term)).collect(),
        _ => users,
    }
}

/// Stable sort; records with equal keys keep their backend order
pub fn sort(users: &mut [User], sort: Sort) {
    let key = |user: &User| match sort.field {
        SortField::Name => user.name.to_lowercase(),
        SortField::Email => user.email.to_lowercase(),
    };

    users.sort_by(|a, b| {
        let ordering: Ordering = key(a).cmp(&key(b));
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// Slice `[(page-1)*size, page*size)` of `items`. Pages beyond the last are
/// empty and report the same page count.
pub fn paginate<T>(items: Vec<T>, page: usize, size: usize, search: Option<String>) -> PageResult<T> {
    let page = page.max(1);
    let size = size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(size);

    let start = (page - 1).saturating_mul(size);
    let items = items.into_iter().skip(start).take(size).collect();

    PageResult {
        items,
        page,
        size,
        total_items,
        total_pages,
        search,
    }
}

/// Filter, order and paginate in one pass
pub fn page(users: Vec<User>, request: &PageRequest) -> PageResult<User> {
    let mut filtered = filter(users, request.search.as_deref());
    if let Some(order) = request.sort {
        sort(&mut filtered, order);
    }
    paginate(filtered, request.page, request.size, request.search.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn user(id: &str, name: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role: Role::Regular,
            profile_image_url: None,
            uid: None,
        }
    }

    fn sample() -> Vec<User> {
        vec![
            user("1", "Ana", "ana@x.com"),
            user("2", "Bob", "bob@x.com"),
            user("3", "Ana Maria", "am@x.com"),
        ]
    }

    fn ids(page: &PageResult<User>) -> Vec<&str> {
        page.items.iter().map(|u| u.id.as_str()).collect()
    }

    #[test]
    fn test_search_example_fits_one_page() {
        let request = PageRequest::new(1, 2).with_search("ana");
        let result = page(sample(), &request);

        assert_eq!(ids(&result), vec!["1", "3"]);
        assert_eq!(result.total_pages, 1);
        assert_eq!(result.total_items, 2);
    }

    #[test]
    fn test_search_is_case_insensitive_on_name_or_email() {
        let result = filter(sample(), Some("AM@"));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "3");

        let result = filter(sample(), Some("BOB"));
        assert_eq!(result[0].id, "2");
    }

    #[test]
    fn test_search_term_is_not_trimmed() {
        let users = vec![user("1", "Ana", "a@x.com"), user("2", "María Ana", "m@x.com")];

        let result = filter(users.clone(), Some(" ana"));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "2");

        assert!(filter(users.clone(), Some("   ")).is_empty());
        assert_eq!(filter(users, Some("")).len(), 2);
    }

    #[test]
    fn test_pages_concatenate_to_original_order() {
        let users: Vec<User> = (0..23)
            .map(|i| user(&i.to_string(), &format!("User {}", i), &format!("u{}@x.com", i)))
            .collect();

        for size in 1..=25 {
            let first = paginate(users.clone(), 1, size, None);
            let mut collected = Vec::new();
            for number in 1..=first.total_pages {
                let page = paginate(users.clone(), number, size, None);
                assert!(page.items.len() <= size);
                collected.extend(page.items);
            }
            assert_eq!(collected, users, "size {}", size);
        }
    }

    #[test]
    fn test_whole_filtered_set_in_one_page() {
        let filtered = filter(sample(), Some("x.com"));
        let count = filtered.len();
        let result = paginate(filtered.clone(), 1, count, None);

        assert_eq!(result.items, filtered);
        assert_eq!(result.total_pages, 1);
    }

    #[test]
    fn test_page_beyond_last_is_empty() {
        let first = paginate(sample(), 1, 2, None);
        let beyond = paginate(sample(), 9, 2, None);

        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_pages, first.total_pages);
        assert_eq!(beyond.page, 9);
    }

    #[test]
    fn test_page_zero_is_first_page() {
        let result = paginate(sample(), 0, 2, None);
        assert_eq!(result.page, 1);
        assert_eq!(ids(&result), vec!["1", "2"]);
    }

    #[test]
    fn test_empty_set_has_no_pages() {
        let result = paginate(Vec::<User>::new(), 1, 5, None);
        assert_eq!(result.total_pages, 0);
        assert!(result.items.is_empty());
    }

    #[test]
    fn test_sort_is_stable_and_reversible() {
        let mut users = vec![
            user("1", "bea", "z@x.com"),
            user("2", "Ana", "y@x.com"),
            user("3", "ana", "x@x.com"),
        ];

        sort(
            &mut users,
            Sort {
                field: SortField::Name,
                order: SortOrder::Asc,
            },
        );
        assert_eq!(users.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(), vec!["2", "3", "1"]);

        sort(
            &mut users,
            Sort {
                field: SortField::Email,
                order: SortOrder::Desc,
            },
        );
        assert_eq!(users.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_no_sort_keeps_backend_order() {
        let result = page(sample(), &PageRequest::new(1, 10));
        assert_eq!(ids(&result), vec!["1", "2", "3"]);
    }
}
