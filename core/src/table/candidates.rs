//! Candidate menu: ranked phrases shown a page at a time.
//!
//! The highlight is one absolute index into the list; the visible page is
//! whichever page contains it.

/// A phrase offered for the current input, with the user frequency it was
/// ranked by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub weight: u64,
}

impl Candidate {
    pub fn new<T: Into<String>>(text: T, weight: u64) -> Self {
        Self {
            text: text.into(),
            weight,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CandidateList {
    items: Vec<Candidate>,
    page_size: usize,
    highlighted: usize,
}

impl CandidateList {
    /// A page size of 0 is treated as 1.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            page_size: page_size.max(1),
            highlighted: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Replace the list; the highlight goes back to the first candidate.
    pub fn set_candidates(&mut self, items: Vec<Candidate>) {
        self.items = items;
        self.highlighted = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn num_pages(&self) -> usize {
        self.items.len().div_ceil(self.page_size)
    }

    /// 0-based.
    pub fn current_page(&self) -> usize {
        self.highlighted / self.page_size
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page() + 1 >= self.num_pages()
    }

    /// Highlight position within the current page.
    pub fn cursor(&self) -> usize {
        self.highlighted % self.page_size
    }

    fn page_start(&self) -> usize {
        self.current_page() * self.page_size
    }

    pub fn current_page_candidates(&self) -> &[Candidate] {
        let start = self.page_start().min(self.items.len());
        let end = (start + self.page_size).min(self.items.len());
        &self.items[start..end]
    }

    pub fn selected_candidate(&self) -> Option<&Candidate> {
        self.items.get(self.highlighted)
    }

    /// Candidate at `page_index` on the current page; the highlight stays.
    pub fn on_page(&self, page_index: usize) -> Option<&Candidate> {
        self.current_page_candidates().get(page_index)
    }

    /// Move the highlight back by one, crossing into the previous page.
    pub fn cursor_up(&mut self) -> bool {
        match self.highlighted.checked_sub(1) {
            Some(prev) => {
                self.highlighted = prev;
                true
            }
            None => false,
        }
    }

    /// Move the highlight forward by one, crossing into the next page.
    pub fn cursor_down(&mut self) -> bool {
        if self.highlighted + 1 < self.items.len() {
            self.highlighted += 1;
            true
        } else {
            false
        }
    }

    /// Same position on the previous page.
    pub fn page_up(&mut self) -> bool {
        if self.current_page() == 0 {
            return false;
        }
        self.highlighted -= self.page_size;
        true
    }

    /// Same position on the next page, or its last entry when the next page
    /// is shorter.
    pub fn page_down(&mut self) -> bool {
        if self.is_last_page() {
            return false;
        }
        let next = self.highlighted + self.page_size;
        self.highlighted = next.min(self.items.len() - 1);
        true
    }

    /// Highlight `page_index` on the current page and return it.
    pub fn select_by_index(&mut self, page_index: usize) -> Option<&Candidate> {
        if page_index >= self.current_page_candidates().len() {
            return None;
        }
        self.highlighted = self.page_start() + page_index;
        self.selected_candidate()
    }

    pub fn clear(&mut self) {
        self.set_candidates(Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu(n: usize, page: usize) -> CandidateList {
        let mut l = CandidateList::with_page_size(page);
        l.set_candidates((0..n).map(|i| Candidate::new(format!("c{}", i), 0)).collect());
        l
    }

    #[test]
    fn test_paging() {
        let mut l = menu(7, 3);
        assert_eq!(l.num_pages(), 3);
        assert_eq!(l.current_page_candidates().len(), 3);
        assert!(!l.is_last_page());
        assert!(l.page_down());
        assert!(l.page_down());
        assert!(!l.page_down());
        assert!(l.is_last_page());
        assert_eq!(l.current_page_candidates().len(), 1);
        assert_eq!(l.on_page(0).unwrap().text, "c6");
        assert!(l.on_page(1).is_none());
        assert!(l.page_up());
        assert_eq!(l.current_page(), 1);
    }

    #[test]
    fn test_short_last_page() {
        let mut l = menu(5, 3);
        l.cursor_down();
        l.cursor_down();
        assert_eq!(l.cursor(), 2);
        l.page_down();
        assert_eq!(l.cursor(), 1);
        assert_eq!(l.selected_candidate().unwrap().text, "c4");
    }

    #[test]
    fn test_cursor_crosses_pages() {
        let mut l = menu(4, 2);
        assert!(l.cursor_down());
        assert!(l.cursor_down());
        assert_eq!((l.current_page(), l.cursor()), (1, 0));
        assert!(l.cursor_up());
        assert_eq!((l.current_page(), l.cursor()), (0, 1));
        l.cursor_up();
        assert!(!l.cursor_up());
    }

    #[test]
    fn test_select_by_index() {
        let mut l = menu(4, 2);
        l.page_down();
        assert_eq!(l.select_by_index(1).unwrap().text, "c3");
        assert!(l.select_by_index(2).is_none());
    }

    #[test]
    fn test_empty() {
        let mut l = CandidateList::with_page_size(0);
        assert_eq!(l.page_size(), 1);
        assert_eq!(l.num_pages(), 0);
        assert!(l.is_last_page());
        assert!(!l.page_down());
        assert!(!l.cursor_down());
        assert!(l.current_page_candidates().is_empty());
        assert!(l.selected_candidate().is_none());
    }
}
