//! Page scanning: filter raw entries down to page images and order them.
//!
//! ## Why natural order?
//!
//! Archives name pages `page_1.jpg … page_10.jpg` as often as
//! `008.jpg … 012.jpg`. Plain lexicographic order puts `page_10` before
//! `page_2` and shuffles the book. Natural order compares embedded digit
//! runs by integer value, which matches how humans (and every comic reader)
//! expect pages to sort.
//!
//! Ties — names that are numerically equal but differ in case, separators,
//! or leading zeros — fall back to full-string lexicographic comparison of
//! the original entry name, so the ordering is total and deterministic on
//! every platform.

use std::cmp::Ordering;

/// Raster formats the pipeline can decode. Extensible allow-list.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"];

/// Path components that are platform or VCS junk, matched case-insensitively
/// at any nesting depth.
const JUNK_COMPONENTS: &[&str] = &["__macosx", ".git", ".ds_store"];

/// One image entry selected from an archive, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    /// Entry name as stored in the container.
    pub name: String,
    /// 0-based position in the scan order. Stable and total; rejected pages
    /// later leave gaps, never reassignments.
    pub ordinal: usize,
}

/// Filter entry names down to recognised page images, naturally ordered.
///
/// Returns an empty vector when nothing survives; the caller maps that to
/// the distinct `NoPagesFound` outcome rather than an empty document.
pub fn scan_pages(entry_names: &[String]) -> Vec<PageEntry> {
    let mut kept: Vec<&String> = entry_names
        .iter()
        .filter(|name| is_page_image(name))
        .collect();

    kept.sort_by(|a, b| page_order(a, b));

    kept.into_iter()
        .enumerate()
        .map(|(ordinal, name)| PageEntry {
            name: name.clone(),
            ordinal,
        })
        .collect()
}

/// True when the entry looks like a comic page: recognised raster extension,
/// no junk path component, not an AppleDouble sidecar.
pub fn is_page_image(name: &str) -> bool {
    let components: Vec<&str> = name.split(['/', '\\']).collect();
    let Some(base) = components.last().copied() else {
        return false;
    };

    // AppleDouble resource forks ("._page_01.jpg") decode as garbage.
    if base.starts_with("._") {
        return false;
    }
    if components
        .iter()
        .any(|c| JUNK_COMPONENTS.iter().any(|junk| c.eq_ignore_ascii_case(junk)))
    {
        return false;
    }

    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known)),
        _ => false,
    }
}

/// Total page ordering: natural comparison on the base name, full-string
/// lexicographic tie-break on the original entry name.
pub fn page_order(a: &str, b: &str) -> Ordering {
    natural_cmp(base_name(a), base_name(b)).then_with(|| a.cmp(b))
}

fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Case-insensitive natural comparison: digit runs compare by integer value,
/// everything else byte-by-byte (ASCII-lowercased).
///
/// Digit runs are compared without parsing into a fixed-width integer, so
/// arbitrarily long runs cannot overflow: strip leading zeros, compare run
/// lengths, then compare the digits lexicographically.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        let (ca, cb) = (a[i], b[j]);
        if ca.is_ascii_digit() && cb.is_ascii_digit() {
            let run_a = digit_run(a, i);
            let run_b = digit_run(b, j);
            let cmp = compare_digit_runs(&a[i..run_a], &b[j..run_b]);
            if cmp != Ordering::Equal {
                return cmp;
            }
            i = run_a;
            j = run_b;
        } else {
            let cmp = ca.to_ascii_lowercase().cmp(&cb.to_ascii_lowercase());
            if cmp != Ordering::Equal {
                return cmp;
            }
            i += 1;
            j += 1;
        }
    }

    (a.len() - i).cmp(&(b.len() - j))
}

/// End index of the digit run starting at `start`.
fn digit_run(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    end
}

/// Compare two digit runs by integer value without parsing.
fn compare_digit_runs(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeros(digits: &[u8]) -> &[u8] {
    let first = digits.iter().position(|&d| d != b'0').unwrap_or(digits.len());
    &digits[first..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn scanned(raw: &[&str]) -> Vec<String> {
        scan_pages(&names(raw)).into_iter().map(|p| p.name).collect()
    }

    #[test]
    fn numeric_runs_sort_by_value() {
        assert_eq!(
            scanned(&["page_2.jpg", "page_10.jpg", "page_1.jpg"]),
            vec!["page_1.jpg", "page_2.jpg", "page_10.jpg"]
        );
    }

    #[test]
    fn leading_zeros_do_not_break_ordering() {
        assert_eq!(
            scanned(&["p010.png", "p2.png", "p003.png"]),
            vec!["p2.png", "p003.png", "p010.png"]
        );
    }

    #[test]
    fn long_digit_runs_do_not_overflow() {
        let big_a = "99999999999999999999_a.jpg";
        let big_b = "100000000000000000000_b.jpg";
        assert_eq!(natural_cmp(big_a, big_b), Ordering::Less);
    }

    #[test]
    fn numeric_tie_breaks_lexicographically_on_full_name() {
        // "P_1" and "p_1" are numerically equal; the full-string fallback
        // keeps the order deterministic ('P' < 'p' in byte order).
        assert_eq!(
            scanned(&["p_1.jpg", "P_1.jpg"]),
            vec!["P_1.jpg", "p_1.jpg"]
        );
        assert_eq!(
            scanned(&["ch1/p_01.jpg", "ch1/p_1.jpg"]),
            vec!["ch1/p_01.jpg", "ch1/p_1.jpg"]
        );
    }

    #[test]
    fn junk_folders_are_dropped_case_insensitively_at_any_depth() {
        assert_eq!(
            scanned(&[
                "__MACOSX/p_1.jpg",
                "vol1/__macosx/p_2.jpg",
                "vol1/.git/p_3.jpg",
                "vol1/p_4.jpg",
            ]),
            vec!["vol1/p_4.jpg"]
        );
    }

    #[test]
    fn appledouble_sidecars_are_dropped() {
        assert_eq!(
            scanned(&["._p_1.jpg", "p_1.jpg", "ch/._p_2.png"]),
            vec!["p_1.jpg"]
        );
    }

    #[test]
    fn non_images_are_dropped() {
        assert_eq!(
            scanned(&["info.txt", "ComicInfo.xml", "cover.jpeg", "thumbs.db", ".jpg"]),
            vec!["cover.jpeg"]
        );
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(
            scanned(&["b.PNG", "a.JPG", "c.WebP"]),
            vec!["a.JPG", "b.PNG", "c.WebP"]
        );
    }

    #[test]
    fn ordering_uses_base_name_not_directory() {
        // Natural order on base names; directory only matters on ties.
        assert_eq!(
            scanned(&["z_dir/p_1.jpg", "a_dir/p_2.jpg"]),
            vec!["z_dir/p_1.jpg", "a_dir/p_2.jpg"]
        );
    }

    #[test]
    fn ordinals_are_dense_and_zero_based() {
        let pages = scan_pages(&names(&["b_2.jpg", "a_1.jpg", "c_3.jpg"]));
        let ordinals: Vec<usize> = pages.iter().map(|p| p.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert_eq!(pages[0].name, "a_1.jpg");
    }

    #[test]
    fn empty_input_yields_no_pages() {
        assert!(scan_pages(&[]).is_empty());
    }
}
