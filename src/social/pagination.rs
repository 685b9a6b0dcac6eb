// Skip/limit pagination for the post lists (feed, explore, user posts).

/// Posts per page.
pub const PAGE_SIZE: u32 = 20;

/// A 1-based page of `PAGE_SIZE` posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: u32,
}

impl Page {
    /// Page `number`, with anything below 1 treated as the first page.
    pub fn new(number: u32) -> Self {
        Self {
            number: number.max(1),
        }
    }

    pub fn first() -> Self {
        Self::new(1)
    }

    /// Parse a `?page=` value leniently.
    ///
    /// Leading digits are used ("3abc" is page 3); a missing, empty,
    /// non-numeric or zero value is page 1.
    pub fn from_param(raw: Option<&str>) -> Self {
        let digits: String = raw
            .unwrap_or("")
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            return Self::first();
        }
        // Only overflow can fail here; clamp to the last representable page.
        Self::new(digits.parse().unwrap_or(u32::MAX))
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn limit(&self) -> u32 {
        PAGE_SIZE
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(PAGE_SIZE)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_page_is_first() {
        assert_eq!(Page::from_param(None), Page::first());
        assert_eq!(Page::from_param(Some("")), Page::first());
    }

    #[test]
    fn test_garbage_and_zero_are_first() {
        assert_eq!(Page::from_param(Some("abc")).number(), 1);
        assert_eq!(Page::from_param(Some("0")).number(), 1);
        assert_eq!(Page::from_param(Some("-4")).number(), 1);
    }

    #[test]
    fn test_leading_digits_are_used() {
        assert_eq!(Page::from_param(Some("3")).number(), 3);
        assert_eq!(Page::from_param(Some(" 2xyz")).number(), 2);
    }

    #[test]
    fn test_offset() {
        assert_eq!(Page::first().offset(), 0);
        assert_eq!(Page::new(2).offset(), 20);
        assert_eq!(Page::new(5).offset(), 80);
        assert_eq!(Page::new(5).limit(), PAGE_SIZE);
    }

    #[test]
    fn test_overflowing_page_does_not_panic() {
        let page = Page::from_param(Some("99999999999999999999"));
        assert_eq!(page.number(), u32::MAX);
        assert_eq!(page.offset(), u64::from(u32::MAX - 1) * 20);
    }
}
