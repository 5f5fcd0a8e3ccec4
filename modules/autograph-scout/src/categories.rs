//! Marketplace category table and search URL construction.

/// eBay category ids by slug. The slug is what the catalog stores; the id
/// goes into the `_sacat` query parameter.
pub const CATEGORY_MAP: &[(&str, &str)] = &[
    ("sports_mem", "64482"),
    ("entertainment_mem", "45100"),
    ("collectibles", "1"),
    ("art", "550"),
    ("books", "267"),
    ("music", "11233"),
    ("autographs_original", "51"),
    ("autographs_reprints", "50115"),
    ("movie_memorabilia", "45100"),
    ("political_memorabilia", "13905"),
    ("theater_memorabilia", "45100"),
    ("video_game_memorabilia", "45101"),
    ("historical_memorabilia", "39507"),
    ("militaria", "13956"),
    ("paper_americana", "593"),
    ("postcards", "914"),
    ("ephemera", "26364"),
    ("presidential_memorabilia", "14007"),
    ("documents_maps", "13871"),
    ("trading_cards_nonsport", "183050"),
    ("philately", "260"),
];

const BASE_SEARCH_URL: &str = "https://www.ebay.com/sch/i.html";

pub fn category_id(slug: &str) -> Option<&'static str> {
    CATEGORY_MAP
        .iter()
        .find(|(s, _)| *s == slug)
        .map(|(_, id)| *id)
}

pub fn build_search_url(query: &str, category_id: &str, page: u32) -> String {
    format!("{BASE_SEARCH_URL}?_nkw={query}&_sacat={category_id}&_pgn={page}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_slug_resolves() {
        assert_eq!(category_id("sports_mem"), Some("64482"));
        assert_eq!(category_id("autographs_original"), Some("51"));
    }

    #[test]
    fn unknown_slug_is_none() {
        assert_eq!(category_id("beanie_babies"), None);
    }

    #[test]
    fn search_url_carries_query_category_and_page() {
        assert_eq!(
            build_search_url("autograph", "64482", 3),
            "https://www.ebay.com/sch/i.html?_nkw=autograph&_sacat=64482&_pgn=3"
        );
    }
}
