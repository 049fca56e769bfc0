use std::num::IntErrorKind;

use serde::Serialize;

/// One page of a listing.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub per_page: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<usize>,
    pub next_page_number: Option<usize>,
}

/// Page requested by the `page` query parameter.
///
/// Anything that is not an integer selects the first page; an integer outside
/// `1..=num_pages` selects the last page. Never an error.
pub fn page_number(requested: Option<&str>, num_pages: usize) -> usize {
    match requested.map(str::trim).map(str::parse::<i64>) {
        Some(Ok(n)) if n >= 1 && (n as u64) <= num_pages as u64 => n as usize,
        Some(Ok(_)) => num_pages,
        Some(Err(err))
            if matches!(
                err.kind(),
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
            ) =>
        {
            num_pages
        }
        Some(Err(_)) | None => 1,
    }
}

pub fn paginate<T>(items: Vec<T>, per_page: usize, requested: Option<&str>) -> Paginated<T> {
    let per_page = per_page.max(1);
    let count = items.len();
    let num_pages = count.div_ceil(per_page).max(1);
    let number = page_number(requested, num_pages);

    let items: Vec<T> = items
        .into_iter()
        .skip((number - 1) * per_page)
        .take(per_page)
        .collect();

    Paginated {
        items,
        number,
        num_pages,
        count,
        per_page,
        has_previous: number > 1,
        has_next: number < num_pages,
        previous_page_number: (number > 1).then(|| number - 1),
        next_page_number: (number < num_pages).then(|| number + 1),
    }
}

impl<T> Paginated<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            per_page: self.per_page,
            has_previous: self.has_previous,
            has_next: self.has_next,
            previous_page_number: self.previous_page_number,
            next_page_number: self.next_page_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Vec<u32> {
        (1..=25).collect()
    }

    #[test]
    fn pages_split_at_page_size() {
        let sizes: Vec<_> = ["1", "2", "3"]
            .into_iter()
            .map(|n| paginate(listing(), 10, Some(n)).items.len())
            .collect();
        assert_eq!(sizes, [10, 10, 5]);
    }

    #[test]
    fn non_numeric_page_is_first_page() {
        let page = paginate(listing(), 10, Some("abc"));
        assert_eq!(page.number, 1);
        assert_eq!(page.items, (1..=10).collect::<Vec<_>>());

        assert_eq!(paginate(listing(), 10, None).number, 1);
    }

    #[test]
    fn out_of_range_page_is_last_page() {
        let page = paginate(listing(), 10, Some("99"));
        assert_eq!(page.number, 3);
        assert_eq!(page.items, (21..=25).collect::<Vec<_>>());
        assert!(!page.has_next);
        assert_eq!(page.previous_page_number, Some(2));

        assert_eq!(paginate(listing(), 10, Some("0")).number, 3);
    }

    #[test]
    fn overflowing_page_is_last_page() {
        assert_eq!(paginate(listing(), 10, Some("99999999999999999999")).number, 3);
        assert_eq!(paginate(listing(), 10, Some("-99999999999999999999")).number, 3);
        assert_eq!(paginate(listing(), 10, Some("9e99")).number, 1);
    }

    #[test]
    fn empty_listing_has_one_page() {
        let page = paginate(Vec::<u32>::new(), 10, Some("4"));
        assert_eq!(page.num_pages, 1);
        assert_eq!(page.number, 1);
        assert!(page.items.is_empty());
    }
}
