//! Token accounting.
//!
//! Real counts come from the provider's usage metadata. In estimate mode
//! no request is made and counts are approximated locally: CJK characters
//! count as one token each, everything else as one token per four bytes.
//! Output is assumed to be twice the size of the text being translated.

use std::ops::{Add, AddAssign};

use rpgtl::Pricing;

use crate::model::ChatRequest;

/// Input and output token counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    pub fn is_zero(&self) -> bool {
        self.input == 0 && self.output == 0
    }

    /// Dollar cost at the given per-1K prices
    pub fn cost(&self, pricing: &Pricing) -> f64 {
        pricing.cost(self.input, self.output)
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            input: self.input + rhs.input,
            output: self.output + rhs.output,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        self.input += rhs.input;
        self.output += rhs.output;
    }
}

impl std::iter::Sum for TokenUsage {
    fn sum<I: Iterator<Item = TokenUsage>>(iter: I) -> Self {
        iter.fold(TokenUsage::default(), Add::add)
    }
}

/// Rough token count of `text`
pub fn estimate_tokens(text: &str) -> u64 {
    let mut wide = 0u64;
    let mut narrow_bytes = 0u64;
    for c in text.chars() {
        if c.is_ascii() {
            narrow_bytes += 1;
        } else {
            wide += 1;
        }
    }
    wide + narrow_bytes.div_ceil(4)
}

/// Estimated usage of a request that is never sent
pub fn estimate_request(request: &ChatRequest) -> TokenUsage {
    let input = request
        .messages
        .iter()
        .map(|m| estimate_tokens(&m.content))
        .sum();
    let output = 2 * estimate_tokens(request.user_payload());
    TokenUsage { input, output }
}
