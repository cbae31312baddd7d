//! Pagination: walk a listing by clicking a next-control.
//!
//! The next-control disappearing is the *expected terminal state* of a
//! pagination loop, not an error. Only a click or network failure mid-walk
//! degrades the step, and even then whatever was harvested so far is kept.

use crate::errors::{tolerable, InterpreterError};
use crate::interpreter::DEFAULT_TIMEOUT_MS;
use page_primitives::Page;
use std::time::Duration;
use tracing::debug;
use webharvest_core_types::{ActionResult, FieldSpec, Record};

pub(crate) const DEFAULT_MAX_PAGES: u32 = 10;

pub(crate) struct PaginateParams<'a> {
    pub next_selector: &'a str,
    pub max_pages: u32,
    pub item_selector: Option<&'a str>,
    pub fields: Option<&'a [FieldSpec]>,
}

pub(crate) async fn run(
    page: &dyn Page,
    params: PaginateParams<'_>,
) -> Result<ActionResult, InterpreterError> {
    let idle_timeout = Duration::from_millis(DEFAULT_TIMEOUT_MS);
    let mut harvested: Vec<Record> = Vec::new();
    let mut pages_visited: u32 = 0;

    loop {
        pages_visited += 1;

        // Extraction only runs when both an item selector and fields are
        // configured; field sub-selectors resolve relative to the item root.
        if let (Some(items), Some(fields)) = (params.item_selector, params.fields) {
            match page.extract(items, fields).await {
                Ok(records) => harvested.extend(records),
                Err(err) => {
                    let err = tolerable(err)?;
                    return Ok(partial_failure(
                        harvested,
                        pages_visited,
                        format!("extraction on page {pages_visited} failed: {err}"),
                    ));
                }
            }
        }

        if pages_visited >= params.max_pages {
            debug!(
                max_pages = params.max_pages,
                records = harvested.len(),
                "pagination reached max_pages"
            );
            let message = format!(
                "pagination stopped at max_pages={} with {} record(s)",
                params.max_pages,
                harvested.len()
            );
            return Ok(ActionResult::ok(message)
                .with_data(harvested)
                .with_pages(pages_visited));
        }

        match page.exists(params.next_selector).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    selector = params.next_selector,
                    pages = pages_visited,
                    "next control absent, pagination complete"
                );
                let message = format!(
                    "next control {} absent after {pages_visited} page(s), pagination complete",
                    params.next_selector
                );
                return Ok(ActionResult::ok(message)
                    .with_data(harvested)
                    .with_pages(pages_visited));
            }
            Err(err) => {
                let err = tolerable(err)?;
                return Ok(partial_failure(
                    harvested,
                    pages_visited,
                    format!("could not query next control: {err}"),
                ));
            }
        }

        if let Err(err) = page.click(params.next_selector).await {
            let err = tolerable(err)?;
            return Ok(partial_failure(
                harvested,
                pages_visited,
                format!(
                    "click on next control {} failed on page {pages_visited}: {err}",
                    params.next_selector
                ),
            ));
        }
        if let Err(err) = page.wait_for_idle_network(idle_timeout).await {
            let err = tolerable(err)?;
            return Ok(partial_failure(
                harvested,
                pages_visited,
                format!("network did not settle after page {pages_visited}: {err}"),
            ));
        }
    }
}

fn partial_failure(harvested: Vec<Record>, pages: u32, message: String) -> ActionResult {
    ActionResult::fail(message)
        .with_data(harvested)
        .with_pages(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_primitives::testing::{record, FakeDom, FakePage};
    use page_primitives::DriverError;
    use serde_json::json;

    fn listing_page(pages: usize, with_next_on_last: bool) -> FakePage {
        let doms = (0..pages)
            .map(|index| {
                let mut dom = FakeDom::new().with_extraction(
                    ".item",
                    vec![
                        record(&[("n", json!(index * 2))]),
                        record(&[("n", json!(index * 2 + 1))]),
                    ],
                );
                if index + 1 < pages || with_next_on_last {
                    dom = dom.with_elements(".next", 1);
                }
                dom
            })
            .collect();
        FakePage::with_doms(doms).with_next_control(".next")
    }

    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec {
            name: "n".into(),
            selector: ".n".into(),
            attribute: None,
        }]
    }

    async fn paginate(
        page: &FakePage,
        max_pages: u32,
        extract: bool,
    ) -> ActionResult {
        let fields = fields();
        run(
            page,
            PaginateParams {
                next_selector: ".next",
                max_pages,
                item_selector: extract.then_some(".item"),
                fields: extract.then(|| fields.as_slice()),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn stops_at_max_pages_even_with_next_present() {
        let page = listing_page(5, true);
        let outcome = paginate(&page, 3, true).await;
        assert!(outcome.success);
        assert_eq!(outcome.pages, Some(3));
        assert_eq!(outcome.data.as_ref().unwrap().len(), 6);
        assert!(outcome.message.contains("max_pages"));
        // two clicks: page 1 -> 2 -> 3, never a third
        assert_eq!(page.dom_index(), 2);
    }

    #[tokio::test]
    async fn next_control_absence_is_a_clean_terminal_state() {
        let page = listing_page(2, false);
        let outcome = paginate(&page, 10, true).await;
        assert!(outcome.success);
        assert_eq!(outcome.pages, Some(2));
        assert_eq!(outcome.data.as_ref().unwrap().len(), 4);
        assert!(outcome.message.contains("absent"));
    }

    #[tokio::test]
    async fn click_failure_keeps_partial_harvest() {
        let page = listing_page(3, false)
            .failing_click(".next", DriverError::Navigation("tab crashed".into()));
        let outcome = paginate(&page, 10, true).await;
        assert!(!outcome.success);
        // page 1 was extracted before the click failed
        assert_eq!(outcome.data.as_ref().unwrap().len(), 2);
        assert!(outcome.message.contains("next control"));
    }

    #[tokio::test]
    async fn walks_without_extracting_when_fields_are_absent() {
        let page = listing_page(4, false);
        let outcome = paginate(&page, 10, false).await;
        assert!(outcome.success);
        assert_eq!(outcome.pages, Some(4));
        assert_eq!(outcome.data.as_ref().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn default_max_pages_bounds_a_listing_that_never_ends() {
        // one DOM whose next control never goes away
        let page = FakePage::with_doms(vec![FakeDom::new().with_elements(".next", 1)])
            .with_next_control(".next");
        let outcome = run(
            &page,
            PaginateParams {
                next_selector: ".next",
                max_pages: DEFAULT_MAX_PAGES,
                item_selector: None,
                fields: None,
            },
        )
        .await
        .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.pages, Some(DEFAULT_MAX_PAGES));
    }
}
