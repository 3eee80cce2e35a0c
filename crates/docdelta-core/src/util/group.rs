/// Splits `items` into runs of consecutive elements with equal keys.
pub fn group_adjacent<T, K, F>(items: impl Iterator<Item = T>, key_selector: F) -> Vec<Vec<T>>
where
    K: Eq,
    F: Fn(&T) -> K,
{
    let mut result: Vec<Vec<T>> = Vec::new();
    let mut current_group: Option<(K, Vec<T>)> = None;

    for item in items {
        let key = key_selector(&item);

        match &mut current_group {
            Some((current_key, group)) if *current_key == key => {
                group.push(item);
            }
            _ => {
                if let Some((_, group)) = current_group.take() {
                    result.push(group);
                }
                current_group = Some((key, vec![item]));
            }
        }
    }

    if let Some((_, group)) = current_group {
        result.push(group);
    }

    result
}

/// Splits after every element for which `is_terminator` holds. A trailing
/// run without a terminator forms the last group.
pub fn split_after<T, F>(items: impl Iterator<Item = T>, is_terminator: F) -> Vec<Vec<T>>
where
    F: Fn(&T) -> bool,
{
    let mut result = Vec::new();
    let mut current = Vec::new();
    for item in items {
        let ends = is_terminator(&item);
        current.push(item);
        if ends {
            result.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}
