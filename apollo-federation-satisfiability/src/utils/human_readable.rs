use itertools::Itertools;

/// Joins quoted items for an error message: `field "a"`, `fields "a" and "b"`,
/// `fields "a", "b" and "c"`.
pub(crate) fn human_readable_list<T: AsRef<str>>(
    items: &[T],
    singular: &str,
    plural: &str,
) -> String {
    match items {
        [] => String::new(),
        [item] => format!("{singular} \"{}\"", item.as_ref()),
        [init @ .., last] => format!(
            "{plural} {} and \"{}\"",
            init.iter().map(|item| format!("\"{}\"", item.as_ref())).join(", "),
            last.as_ref(),
        ),
    }
}
