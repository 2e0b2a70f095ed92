use rand::Rng;

/// Supplies the computed values substituted into reply templates.
///
/// The reply content strategy is a product decision, so it stays
/// injectable: production uses [`RandomQuote`], tests pin a
/// [`FixedQuote`].
pub trait QuoteSource: Send + Sync {
    /// Price for the given commodity keyword, in local currency.
    fn price(&self, commodity: &str) -> f64;
}

/// Pseudo-quote within a plausible band. Stands in for a real market
/// feed.
pub struct RandomQuote;

impl QuoteSource for RandomQuote {
    fn price(&self, _commodity: &str) -> f64 {
        rand::rng().random_range(80.0..180.0)
    }
}

/// Always returns the same price. Test use only in practice.
pub struct FixedQuote(pub f64);

impl QuoteSource for FixedQuote {
    fn price(&self, _commodity: &str) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_quote_stays_in_band() {
        let source = RandomQuote;
        for _ in 0..100 {
            let p = source.price("soja");
            assert!((80.0..180.0).contains(&p));
        }
    }

    #[test]
    fn fixed_quote_is_fixed() {
        let source = FixedQuote(132.5);
        assert_eq!(source.price("soja"), 132.5);
        assert_eq!(source.price("milho"), 132.5);
    }
}
