use std::cmp::Ordering;
use std::path::Path;

/// File extensions recognised as frames of an image sequence.
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// A run of either ASCII digits or non-digits inside a name.
#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(name: &str) -> impl Iterator<Item = Chunk<'_>> {
    let mut rest = name;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let is_digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != is_digit)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some(if is_digit {
            Chunk::Digits(run)
        } else {
            Chunk::Text(run)
        })
    })
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        .then_with(|| a.len().cmp(&b.len()))
}

/// Compare two names treating digit runs as numbers.
///
/// `img2 < img10` and `Left (9).png < Left (10).png`. Digit runs with equal value
/// are ordered by their length, so `img01` sorts after `img1`. A digit run sorts
/// before a text run at the same position.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chunks = chunks(a);
    let mut b_chunks = chunks(b);
    loop {
        let ord = match (a_chunks.next(), b_chunks.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Chunk::Digits(x)), Some(Chunk::Digits(y))) => cmp_digits(x, y),
            (Some(Chunk::Text(x)), Some(Chunk::Text(y))) => x.cmp(y),
            (Some(Chunk::Digits(_)), Some(Chunk::Text(_))) => Ordering::Less,
            (Some(Chunk::Text(_)), Some(Chunk::Digits(_))) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

/// Sort names in natural order.
pub fn natural_sort<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

/// Whether `names` is strictly increasing in natural order.
pub fn is_natural_order<S: AsRef<str>>(names: &[S]) -> bool {
    names
        .windows(2)
        .all(|w| natural_cmp(w[0].as_ref(), w[1].as_ref()) == Ordering::Less)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// List the image files of a directory in natural order.
///
/// Only regular files with a `jpg`, `jpeg` or `png` extension (any case) are
/// returned, as bare file names.
///
/// # Arguments
///
/// * `dir` - The directory holding the full capture sequence.
pub fn list_image_sequence(dir: impl AsRef<Path>) -> Result<Vec<String>, std::io::Error> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() || !is_image_file(&path) {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => log::warn!("skipping non UTF-8 file name {:?}", name),
        }
    }
    natural_sort(&mut names);

    log::debug!(
        "found {} images in {}",
        names.len(),
        dir.as_ref().display()
    );

    Ok(names)
}
