use scraper::{Html, Selector};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Raw `href` values of every anchor in a directory index page, in document order.
pub fn listing_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .map(ToOwned::to_owned)
        .collect()
}

/// True for `{lot_id}_...` names with an image extension (any case).
pub fn is_lot_image(href: &str, lot_id: &str) -> bool {
    let Some(rest) = href.strip_prefix(lot_id) else {
        return false;
    };
    if !rest.starts_with('_') {
        return false;
    }
    href.rsplit_once('.').is_some_and(|(_, ext)| {
        IMAGE_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    })
}

/// The hrefs in `listing` that belong to `lot_id`, keeping listing order.
pub fn lot_images(listing: &[String], lot_id: &str) -> Vec<String> {
    listing
        .iter()
        .filter(|href| is_lot_image(href, lot_id))
        .cloned()
        .collect()
}
