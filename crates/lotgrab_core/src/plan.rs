//! Pure pieces of download planning: which lots take part, how files are named
//! and where they land. Discovery IO lives in the engine.
use url::Url;

use crate::sanitize::sanitize_name;
use crate::{DownloadPlanEntry, LotRecord, PlanOptions};

/// Extension used when a URL carries none.
pub const DEFAULT_EXTENSION: &str = "jpeg";

/// Lots that take part in a run, in scrape order.
pub fn select_lots<'a>(lots: &'a [LotRecord], options: &PlanOptions) -> Vec<&'a LotRecord> {
    lots.iter()
        .filter(|lot| !(options.skip_pending && lot.is_pending))
        .collect()
}

/// Everything up to and including the last `/` of `url`'s path. A query or
/// fragment is never searched.
pub fn directory_of(url: &str) -> &str {
    let path_end = url.find(['?', '#']).unwrap_or(url.len());
    match url[..path_end].rfind('/') {
        Some(idx) => &url[..=idx],
        None => "",
    }
}

/// The last path segment of `url`, ignoring any query string or fragment.
pub fn file_name_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string(),
        Err(_) => {
            let bare = url.split(['?', '#']).next().unwrap_or(url);
            bare.rsplit('/').next().unwrap_or(bare).to_string()
        }
    }
}

/// Lowercase-preserving extension of a file name, or `None` when it has none.
pub fn extension_of(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// `base/filename`, or `base/title/filename` when subfolders are enabled.
pub fn destination_path(base_folder: &str, title: &str, file_name: &str, use_subfolders: bool) -> String {
    if use_subfolders {
        format!("{base_folder}/{title}/{file_name}")
    } else {
        format!("{base_folder}/{file_name}")
    }
}

/// Single entry that downloads the lot's thumbnail as `title.ext`.
pub fn thumbnail_entry(lot: &LotRecord, base_folder: &str, options: &PlanOptions) -> DownloadPlanEntry {
    let title = sanitize_name(&lot.title);
    let thumb_name = file_name_of(&lot.thumbnail_url);
    let ext = extension_of(&thumb_name).unwrap_or(DEFAULT_EXTENSION);
    let file_name = format!("{title}.{ext}");
    DownloadPlanEntry {
        source_url: lot.thumbnail_url.clone(),
        destination_path: destination_path(base_folder, &title, &file_name, options.use_subfolders),
    }
}

/// Entries for every discovered image of a lot, named `title-001.ext`,
/// `title-002.ext`, ... in listing order.
///
/// An empty `image_names` yields one `-001` entry for the thumbnail itself,
/// fetched from its exact URL (query string included).
pub fn sequenced_entries(
    lot: &LotRecord,
    image_names: &[String],
    base_folder: &str,
    options: &PlanOptions,
) -> Vec<DownloadPlanEntry> {
    let title = sanitize_name(&lot.title);
    let entry = |index: usize, name: &str, source_url: String| {
        let ext = extension_of(name).unwrap_or(DEFAULT_EXTENSION);
        let file_name = format!("{title}-{seq:03}.{ext}", seq = index + 1);
        DownloadPlanEntry {
            source_url,
            destination_path: destination_path(base_folder, &title, &file_name, options.use_subfolders),
        }
    };

    if image_names.is_empty() {
        let thumb_name = file_name_of(&lot.thumbnail_url);
        return vec![entry(0, &thumb_name, lot.thumbnail_url.clone())];
    }

    let directory = directory_of(&lot.thumbnail_url);
    image_names
        .iter()
        .enumerate()
        .map(|(index, name)| entry(index, name, format!("{directory}{name}")))
        .collect()
}
