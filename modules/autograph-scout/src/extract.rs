//! Listing extraction from rendered search-page markup.
//!
//! Works on `.s-item` result cards. Three discard filters, in order:
//! missing/empty title, title containing "listing" (eBay injects
//! promotional "Shop on eBay" and "New Listing" cards that are structural
//! noise, not items), and missing image URL. Cards without a link are also
//! dropped; a listing with no URL has no identity in the catalog.

use scraper::{ElementRef, Html, Selector};

use autograph_common::{normalize_listing_url, RawListing};

pub fn parse_listings(html: &str, category: &str) -> Vec<RawListing> {
    let doc = Html::parse_document(html);

    let item_sel = Selector::parse(".s-item").expect("valid selector");
    let title_sel = Selector::parse(".s-item__title").expect("valid selector");
    let price_sel = Selector::parse(".s-item__price").expect("valid selector");
    let link_sel = Selector::parse(".s-item__link").expect("valid selector");
    let img_sel = Selector::parse(".s-item__image-img").expect("valid selector");
    let any_img_sel = Selector::parse("img").expect("valid selector");

    let mut listings = Vec::new();

    for item in doc.select(&item_sel) {
        let title = match item.select(&title_sel).next().map(element_text) {
            Some(t) if !t.is_empty() => t,
            _ => continue,
        };
        if title.to_lowercase().contains("listing") {
            continue;
        }

        let img_url = item
            .select(&img_sel)
            .next()
            .or_else(|| item.select(&any_img_sel).next())
            .and_then(|el| el.value().attr("src"))
            .map(str::to_string);
        let img_url = match img_url {
            Some(u) if !u.is_empty() => u,
            _ => continue,
        };

        let listing_url = match item
            .select(&link_sel)
            .next()
            .and_then(|el| el.value().attr("href"))
        {
            Some(href) if !href.is_empty() => normalize_listing_url(href),
            _ => continue,
        };

        let price = item
            .select(&price_sel)
            .next()
            .map(element_text)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "N/A".to_string());

        listings.push(RawListing {
            title,
            price,
            img_url,
            listing_url,
            category: category.to_string(),
        });
    }

    listings
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(title: &str, price: &str, href: &str, img: &str) -> String {
        let img_tag = if img.is_empty() {
            String::new()
        } else {
            format!(r#"<img class="s-item__image-img" src="{img}">"#)
        };
        format!(
            r#"<li class="s-item">
                 <a class="s-item__link" href="{href}">
                   <div class="s-item__title">{title}</div>
                 </a>
                 <span class="s-item__price">{price}</span>
                 {img_tag}
               </li>"#
        )
    }

    #[test]
    fn extracts_complete_cards() {
        let html = format!(
            "<ul>{}</ul>",
            card(
                "Jane Doe signed photo",
                "$49.99",
                "https://www.ebay.com/itm/111?_trkparms=abc",
                "https://i.ebayimg.com/1.jpg"
            )
        );
        let listings = parse_listings(&html, "sports_mem");
        assert_eq!(listings.len(), 1);
        let l = &listings[0];
        assert_eq!(l.title, "Jane Doe signed photo");
        assert_eq!(l.price, "$49.99");
        assert_eq!(l.img_url, "https://i.ebayimg.com/1.jpg");
        // Tracking params are stripped from the identity URL.
        assert_eq!(l.listing_url, "https://www.ebay.com/itm/111");
        assert_eq!(l.category, "sports_mem");
    }

    #[test]
    fn drops_promotional_listing_cards() {
        let html = format!(
            "<ul>{}{}</ul>",
            card(
                "New Listing Tom Hanks signed script",
                "$10",
                "https://www.ebay.com/itm/1",
                "https://i.ebayimg.com/1.jpg"
            ),
            card(
                "Shop on eBay listing",
                "$20",
                "https://www.ebay.com/itm/2",
                "https://i.ebayimg.com/2.jpg"
            )
        );
        assert!(parse_listings(&html, "sports_mem").is_empty());
    }

    #[test]
    fn drops_cards_missing_title_or_image() {
        let no_img = card(
            "Jane Doe cut signature",
            "$5",
            "https://www.ebay.com/itm/3",
            "",
        );
        let no_title = card("", "$5", "https://www.ebay.com/itm/4", "https://i.ebayimg.com/4.jpg");
        let html = format!("<ul>{no_img}{no_title}</ul>");
        assert!(parse_listings(&html, "sports_mem").is_empty());
    }

    #[test]
    fn missing_price_defaults_to_na() {
        let html = r#"<li class="s-item">
            <a class="s-item__link" href="https://www.ebay.com/itm/5">
              <div class="s-item__title">Jane Doe signed ball</div>
            </a>
            <img class="s-item__image-img" src="https://i.ebayimg.com/5.jpg">
        </li>"#;
        let listings = parse_listings(html, "sports_mem");
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].price, "N/A");
    }

    #[test]
    fn falls_back_to_any_img_when_class_is_absent() {
        let html = r#"<li class="s-item">
            <a class="s-item__link" href="https://www.ebay.com/itm/6">
              <div class="s-item__title">Jane Doe index card</div>
            </a>
            <span class="s-item__price">$3.50</span>
            <img src="https://i.ebayimg.com/6.jpg">
        </li>"#;
        let listings = parse_listings(html, "sports_mem");
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].img_url, "https://i.ebayimg.com/6.jpg");
    }
}
