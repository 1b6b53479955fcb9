/// A bidding zone resolved from its EIC code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// EIC code as it appears in the market document, e.g. `10YDE-VE-------2`.
    pub code: String,
    /// Short area name, e.g. `DE_50HZ`.
    pub short_name: String,
    /// Human readable name used in the newsletter.
    pub display_name: String,
}

impl Region {
    /// A region for a code with no known mapping. Names fall back to the code.
    pub fn unmapped(code: &str) -> Self {
        Self {
            code: code.to_string(),
            short_name: code.to_string(),
            display_name: code.to_string(),
        }
    }
}
