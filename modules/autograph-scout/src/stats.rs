/// Counters from one scrape run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub pages_fetched: u32,
    pub pages_empty: u32,
    pub pages_skipped: u32,
    pub listings_collected: u32,
    pub listings_stored: u32,
    pub listings_updated: u32,
    pub unknown_discarded: u32,
    pub exact_matches: u32,
    pub lookup_resolved: u32,
    pub unknown_titles: u32,
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Scrape Run Complete ===")?;
        writeln!(f, "Pages fetched:      {}", self.pages_fetched)?;
        writeln!(f, "Pages empty:        {}", self.pages_empty)?;
        writeln!(f, "Pages skipped:      {}", self.pages_skipped)?;
        writeln!(f, "Listings collected: {}", self.listings_collected)?;
        writeln!(f, "Listings stored:    {}", self.listings_stored)?;
        writeln!(f, "Listings updated:   {}", self.listings_updated)?;
        writeln!(f, "Unknown discarded:  {}", self.unknown_discarded)?;
        writeln!(f, "\nAttribution:")?;
        writeln!(f, "  Exact matches:   {}", self.exact_matches)?;
        writeln!(f, "  Lookup resolved: {}", self.lookup_resolved)?;
        writeln!(f, "  Unknown titles:  {}", self.unknown_titles)?;
        Ok(())
    }
}
