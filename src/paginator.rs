/// Keeps track of the vertical position on the page being filled, and decides when content no
/// longer fits so that a new page has to be started.
///
/// Positions are expressed in millimeters from the bottom edge of the page, which is the way the
/// PDF coordinate system works: the cursor starts right below the top margin and moves downwards
/// as content is placed.
#[derive(Debug, Clone)]
pub struct Paginator {
    page_height: f32,
    top_margin: f32,
    bottom_margin: f32,
    cursor: f32,
    page_count: usize,
}

impl Paginator {
    /// Create a paginator positioned at the top of the first page.
    pub fn new(page_height: f32, top_margin: f32, bottom_margin: f32) -> Self {
        Paginator {
            page_height,
            top_margin,
            bottom_margin,
            cursor: page_height - top_margin,
            page_count: 1,
        }
    }

    /// Makes sure that an element of the given height fits above the bottom margin, starting a new
    /// page if it does not. Returns whether a new page was started.
    ///
    /// An element taller than a whole empty page can never fit: when the current page already
    /// holds content a new page is started anyway, otherwise the element is left to overflow the
    /// bottom margin of the current, still empty, page. In that last case no page is started and
    /// `false` is returned even though the element does not fit, since a fresh page would not
    /// hold it either and would only leave a blank page behind.
    pub fn ensure_space(&mut self, height: f32) -> bool {
        if self.cursor - height >= self.bottom_margin {
            return false;
        }
        if self.is_page_empty() {
            log::warn!(
                "An element of height {}mm does not fit into an empty page, it will overflow the bottom margin",
                height
            );
            return false;
        }

        self.page_count += 1;
        self.cursor = self.page_top();
        log::debug!("Started page {}", self.page_count);

        true
    }

    /// Moves the cursor down by the given height. Callers are expected to have reserved the
    /// space through `ensure_space` beforehand.
    pub fn advance(&mut self, height: f32) {
        self.cursor -= height;
    }

    /// The current vertical position, in millimeters from the bottom of the page.
    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    /// The number of pages allocated so far.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// The index of the page currently being filled.
    pub fn current_page(&self) -> usize {
        self.page_count - 1
    }

    /// The height which is available for content on every page.
    pub fn available_height(&self) -> f32 {
        self.page_top() - self.bottom_margin
    }

    fn page_top(&self) -> f32 {
        self.page_height - self.top_margin
    }

    fn is_page_empty(&self) -> bool {
        self.cursor >= self.page_top()
    }
}
