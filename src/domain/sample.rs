//! Pagination cursor requests, pages and assembled samples.

use chrono::NaiveDate;
use serde::Serialize;

use super::work_item::WorkItem;

/// Fixed part of every page request: resource, field selection and date range.
///
/// `page(offset)` produces the request for one cursor position. The rendered
/// query string is kept verbatim on the page and ends up in the canonical rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub resource_path: String,
    pub top_param: String,
    pub skip_param: String,
    pub fields: String,
    pub page_size: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ListingQuery {
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page(&self, offset: usize) -> PageRequest {
        let params = format!(
            "{path}?{top}={size}&{skip}={offset}&fields={fields}&startDate={start}&endDate={end}",
            path = self.resource_path,
            top = self.top_param,
            size = self.page_size,
            skip = self.skip_param,
            fields = self.fields,
            start = self.start_date.format("%Y-%m-%d"),
            end = self.end_date.format("%Y-%m-%d"),
        );
        PageRequest {
            offset,
            page_size: self.page_size,
            params,
        }
    }
}

/// One cursor position together with its rendered query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub offset: usize,
    pub page_size: usize,
    params: String,
}

impl PageRequest {
    /// Path and query string exactly as sent
    pub fn params(&self) -> &str {
        &self.params
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Zero-based position of this page within its sample
    pub index: usize,
    pub request: PageRequest,
    pub items: Vec<WorkItem>,
}

impl Page {
    pub const fn new(index: usize, request: PageRequest, items: Vec<WorkItem>) -> Self {
        Self {
            index,
            request,
            items,
        }
    }
}

/// A complete, independently fetched snapshot of the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pages: Vec<Page>,
}

impl Sample {
    pub const fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn item_count(&self) -> usize {
        self.pages.iter().map(|page| page.items.len()).sum()
    }

    pub fn items(&self) -> impl Iterator<Item = (&Page, &WorkItem)> {
        self.pages
            .iter()
            .flat_map(|page| page.items.iter().map(move |item| (page, item)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> ListingQuery {
        ListingQuery {
            resource_path: "/workItems".into(),
            top_param: "$top".into(),
            skip_param: "$skip".into(),
            fields: "id,date,created".into(),
            page_size: 400,
            start_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2021, 3, 31).unwrap(),
        }
    }

    #[test]
    fn page_request_renders_cursor_query() {
        let request = query().page(800);
        assert_eq!(request.offset, 800);
        assert_eq!(request.page_size, 400);
        assert_eq!(
            request.params(),
            "/workItems?$top=400&$skip=800&fields=id,date,created&startDate=2021-01-01&endDate=2021-03-31"
        );
    }

    #[test]
    fn sample_iterates_items_in_fetch_order() {
        let q = query();
        let sample = Sample::new(vec![
            Page::new(0, q.page(0), vec![WorkItem::new("a", 0, 0, 1), WorkItem::new("b", 0, 0, 1)]),
            Page::new(1, q.page(2), vec![]),
            Page::new(2, q.page(2), vec![WorkItem::new("c", 0, 0, 1)]),
        ]);
        assert_eq!(sample.item_count(), 3);
        let order: Vec<(usize, &str)> = sample
            .items()
            .map(|(page, item)| (page.index, item.id.as_str()))
            .collect();
        assert_eq!(order, vec![(0, "a"), (0, "b"), (2, "c")]);
    }
}
