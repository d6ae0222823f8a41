/// Posts per listing page.
pub const PER_PAGE: i64 = 5;

/// One page of an ordered listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Requested page number, as given (may be out of range).
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

/// An entry in the pager. `number` is `None` for an elided gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub number: Option<i64>,
    pub current: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        Self {
            items,
            page,
            per_page,
            total,
        }
    }

    /// Row offset for `page`, or `None` when the page cannot hold any rows.
    pub fn offset(page: i64, per_page: i64, total: i64) -> Option<i64> {
        if page < 1 || per_page < 1 {
            return None;
        }
        let offset = (page - 1).checked_mul(per_page)?;
        (offset < total).then_some(offset)
    }

    pub fn pages(&self) -> i64 {
        if self.per_page < 1 {
            return 0;
        }
        (self.total + self.per_page - 1) / self.per_page
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Page numbers to show: the first and last page, one before and two after the
    /// current page, with gaps in between collapsed.
    pub fn links(&self) -> Vec<PageLink> {
        const LEFT_EDGE: i64 = 1;
        const LEFT_CURRENT: i64 = 1;
        const RIGHT_CURRENT: i64 = 2;
        const RIGHT_EDGE: i64 = 1;

        let pages = self.pages();
        let low = self.page.saturating_sub(LEFT_CURRENT);
        let high = self.page.saturating_add(RIGHT_CURRENT);
        let mut links = Vec::new();
        let mut last = 0;
        for num in 1..=pages {
            let shown = num <= LEFT_EDGE
                || (low..=high).contains(&num)
                || num > pages - RIGHT_EDGE;
            if !shown {
                continue;
            }
            if last + 1 != num {
                links.push(PageLink {
                    number: None,
                    current: false,
                });
            }
            links.push(PageLink {
                number: Some(num),
                current: num == self.page,
            });
            last = num;
        }
        links
    }
}
