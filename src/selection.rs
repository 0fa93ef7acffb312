use std::collections::BTreeSet;

/// Multi-select state for one page of rows.
///
/// The selected set is always a subset of the ids on the current page;
/// replacing the page clears it.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    page: Vec<i64>,
    selected: BTreeSet<i64>,
    anchor: Option<i64>,
}

impl SelectionTracker {
    pub fn new(page: Vec<i64>) -> Self {
        Self {
            page,
            selected: BTreeSet::new(),
            anchor: None,
        }
    }

    pub fn set_page(&mut self, page: Vec<i64>) {
        self.page = page;
        self.clear();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.anchor = None;
    }

    pub fn page(&self) -> &[i64] {
        &self.page
    }

    pub fn anchor(&self) -> Option<i64> {
        self.anchor
    }

    pub fn is_selected(&self, id: i64) -> bool {
        self.selected.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn selected(&self) -> impl Iterator<Item = i64> + '_ {
        self.selected.iter().copied()
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.page.iter().position(|&row| row == id)
    }

    pub fn toggle(&mut self, id: i64) {
        if self.position(id).is_none() {
            return;
        }
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
        self.anchor = Some(id);
    }

    /// Give every row from `anchor` to `target` (inclusive, page order) the
    /// anchor's current membership.
    pub fn range_toggle(&mut self, anchor: i64, target: i64) {
        let (Some(a), Some(t)) = (self.position(anchor), self.position(target)) else {
            return;
        };
        let select = self.selected.contains(&anchor);
        let (lo, hi) = if a <= t { (a, t) } else { (t, a) };
        for &id in &self.page[lo..=hi] {
            if select {
                self.selected.insert(id);
            } else {
                self.selected.remove(&id);
            }
        }
        self.anchor = Some(target);
    }

    /// A click on `id`; with `shift` the range from the last clicked row is painted.
    pub fn click(&mut self, id: i64, shift: bool) {
        match self.anchor {
            Some(anchor) if shift => self.range_toggle(anchor, id),
            _ => self.toggle(id),
        }
    }

    /// Select every row, or clear when every row is already selected.
    pub fn select_all(&mut self) {
        if self.selected.len() == self.page.len() {
            self.selected.clear();
        } else {
            self.selected = self.page.iter().copied().collect();
        }
    }

    /// Forget ids that are no longer on the page, e.g. after rows are removed.
    pub fn retain_page(&mut self, page: Vec<i64>) {
        self.page = page;
        let page = &self.page;
        self.selected.retain(|id| page.contains(id));
        if self.anchor.is_some_and(|a| !page.contains(&a)) {
            self.anchor = None;
        }
    }
}
