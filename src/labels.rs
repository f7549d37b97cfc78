//! Short labels for batches of volume paths

use std::collections::HashSet;

/// Derive a short label for each path.
///
/// Paths are split on `/` with empty segments dropped. If the last segments are already
/// distinct they are the labels. Otherwise leading segments shared by every path are stripped,
/// at most one fewer than the shortest path has, and the rest of each path is joined with `_`.
///
/// The shared-prefix test looks at the current first segment of every path once per possible
/// strip, and stops stripping for good at the first disagreement.
///
/// ```
/// use minc_volume::path_to_filename;
///
/// let labels = path_to_filename(&["/a/b/x.mnc", "/a/c/x.mnc"]);
/// assert_eq!(labels, vec!["b_x.mnc", "c_x.mnc"]);
/// ```
pub fn path_to_filename<S: AsRef<str>>(paths: &[S]) -> Vec<String> {
    let mut segments: Vec<Vec<&str>> = paths
        .iter()
        .map(|p| p.as_ref().split('/').filter(|s| !s.is_empty()).collect())
        .collect();

    let lasts: Vec<&str> = segments
        .iter()
        .map(|s| s.last().copied().unwrap_or(""))
        .collect();

    let distinct: HashSet<&str> = lasts.iter().copied().collect();
    if distinct.len() == lasts.len() {
        return lasts.into_iter().map(String::from).collect();
    }

    let shortest = segments.iter().map(Vec::len).min().unwrap_or(0);
    let mut all_equal = true;
    for _ in 0..shortest.saturating_sub(1) {
        let first = segments[0][0];
        if segments[1..].iter().any(|s| s[0] != first) {
            all_equal = false;
        }

        if all_equal {
            for path in segments.iter_mut() {
                path.remove(0);
            }
        }
    }

    segments.iter().map(|s| s.join("_")).collect()
}
