//! Tree operations: sibling ordering, node paths, lookup and call stacks

use crate::errors::{Result, RunnerError};

use super::{Collection, Folder, Item, RequestItem};

/// Separator between node names in an absolute path
pub const PATH_SEPARATOR: char = '/';

fn valid_seq(seq: Option<i64>) -> Option<i64> {
    seq.filter(|s| *s > 0)
}

/// Order folders: alphabetically, then numbered folders are inserted at
/// position `seq - 1`. Folders sharing a sequence number are grouped at
/// that position in their alphabetical order.
pub fn sort_by_name_then_sequence(items: Vec<Item>) -> Vec<Item> {
    let mut alphabetical = items;
    alphabetical.sort_by(|a, b| compare_names(a.name(), b.name()));

    let (mut with_seq, without_seq): (Vec<Item>, Vec<Item>) = alphabetical
        .into_iter()
        .partition(|item| valid_seq(item.seq()).is_some());
    with_seq.sort_by_key(|item| item.seq().unwrap_or(0));

    let mut slots: Vec<Vec<Item>> = without_seq.into_iter().map(|item| vec![item]).collect();

    for item in with_seq {
        let seq = item.seq().unwrap_or(1);
        let position = (seq - 1) as usize;

        let same_seq = slots
            .get(position)
            .and_then(|slot| slot.first())
            .map(|existing| existing.seq() == Some(seq))
            .unwrap_or(false);

        if same_seq {
            slots[position].push(item);
        } else {
            let position = position.min(slots.len());
            slots.insert(position, vec![item]);
        }
    }

    slots.into_iter().flatten().collect()
}

/// Case-insensitive comparison with a case-sensitive tie break, close to a
/// locale-aware compare for plain names
fn compare_names(a: &str, b: &str) -> std::cmp::Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Order one directory level: folders first (name-then-sequence), then
/// requests by sequence number. Unnumbered requests keep their relative order
/// after the numbered ones.
pub fn sort_level(items: Vec<Item>) -> Vec<Item> {
    let (folders, mut requests): (Vec<Item>, Vec<Item>) =
        items.into_iter().partition(|i| i.is_folder());

    requests.sort_by_key(|r| r.seq().unwrap_or(i64::MAX));

    let mut sorted = sort_by_name_then_sequence(folders);
    sorted.extend(requests);
    sorted
}

impl Collection {
    /// Sort every level and assign absolute paths to all nodes
    pub fn prepare(&mut self) {
        let items = std::mem::take(&mut self.items);
        self.items = prepare_level(items, "");
    }

    /// Pre-order traversal of every node
    pub fn flatten(&self) -> Vec<&Item> {
        let mut out = Vec::new();
        flatten_into(&self.items, &mut out);
        out
    }

    /// Find a node by absolute path
    pub fn find(&self, path: &str) -> Option<&Item> {
        let path = normalize_path(path);
        self.flatten().into_iter().find(|item| item.path() == path)
    }

    pub fn find_request(&self, path: &str) -> Option<&RequestItem> {
        self.find(path).and_then(Item::as_request)
    }

    /// Folders between the collection root and the node, outermost first.
    /// The collection root itself is not part of the chain.
    pub fn ancestors(&self, path: &str) -> Option<Vec<&Folder>> {
        let path = normalize_path(path);
        let mut chain = Vec::new();
        if find_chain(&self.items, &path, &mut chain) {
            Some(chain)
        } else {
            None
        }
    }

    /// Flatten the requested paths into the ordered list of requests to run.
    ///
    /// An empty path (or `.` / `/`) selects the collection root. Folders
    /// contribute their direct requests, or every descendant request when
    /// `recursive` is set. Every path is validated before anything is
    /// collected.
    pub fn call_stack(&self, paths: &[String], recursive: bool) -> Result<Vec<&RequestItem>> {
        let paths: Vec<String> = if paths.is_empty() {
            vec![String::new()]
        } else {
            paths.iter().map(|p| normalize_path(p)).collect()
        };

        for path in &paths {
            if !path.is_empty() && self.find(path).is_none() {
                return Err(RunnerError::PathNotFound(path.clone()));
            }
        }

        let mut stack = Vec::new();
        for path in &paths {
            if path.is_empty() {
                collect_requests(&self.items, recursive, &mut stack);
                continue;
            }
            match self.find(path) {
                Some(Item::Folder(folder)) => collect_requests(&folder.items, recursive, &mut stack),
                Some(Item::Request(request)) => stack.push(request),
                None => {}
            }
        }

        Ok(stack)
    }
}

/// Strip surrounding separators and a leading `./`
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    let trimmed = trimmed.trim_matches(PATH_SEPARATOR);
    if trimmed == "." {
        String::new()
    } else {
        trimmed.to_string()
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", prefix, PATH_SEPARATOR, name)
    }
}

fn prepare_level(items: Vec<Item>, prefix: &str) -> Vec<Item> {
    sort_level(items)
        .into_iter()
        .map(|item| match item {
            Item::Folder(mut folder) => {
                folder.path = join_path(prefix, &folder.name);
                let children = std::mem::take(&mut folder.items);
                folder.items = prepare_level(children, &folder.path);
                Item::Folder(folder)
            }
            Item::Request(mut request) => {
                request.path = join_path(prefix, &request.name);
                Item::Request(request)
            }
        })
        .collect()
}

fn flatten_into<'a>(items: &'a [Item], out: &mut Vec<&'a Item>) {
    for item in items {
        out.push(item);
        if let Some(folder) = item.as_folder() {
            flatten_into(&folder.items, out);
        }
    }
}

fn find_chain<'a>(items: &'a [Item], path: &str, chain: &mut Vec<&'a Folder>) -> bool {
    for item in items {
        if item.path() == path {
            return true;
        }
        if let Some(folder) = item.as_folder() {
            chain.push(folder);
            if find_chain(&folder.items, path, chain) {
                return true;
            }
            chain.pop();
        }
    }
    false
}

fn collect_requests<'a>(items: &'a [Item], recursive: bool, out: &mut Vec<&'a RequestItem>) {
    for item in items {
        match item {
            Item::Request(request) => out.push(request),
            Item::Folder(folder) if recursive => collect_requests(&folder.items, recursive, out),
            Item::Folder(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::RequestItem;

    fn folder(name: &str, seq: Option<i64>) -> Item {
        Item::Folder(Folder {
            name: name.to_string(),
            seq,
            ..Default::default()
        })
    }

    fn request(name: &str, seq: Option<i64>) -> Item {
        Item::Request(RequestItem {
            name: name.to_string(),
            seq,
            ..Default::default()
        })
    }

    fn names(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.name()).collect()
    }

    #[test]
    fn test_unnumbered_folders_sort_alphabetically() {
        let sorted = sort_by_name_then_sequence(vec![
            folder("charlie", None),
            folder("alpha", None),
            folder("Bravo", None),
        ]);
        assert_eq!(names(&sorted), vec!["alpha", "Bravo", "charlie"]);
    }

    #[test]
    fn test_numbered_folders_inserted_at_position() {
        let sorted = sort_by_name_then_sequence(vec![
            folder("a", None),
            folder("b", None),
            folder("z", Some(1)),
            folder("y", Some(3)),
        ]);
        assert_eq!(names(&sorted), vec!["z", "a", "y", "b"]);
    }

    #[test]
    fn test_same_sequence_grouped() {
        let sorted = sort_by_name_then_sequence(vec![
            folder("m", None),
            folder("q", Some(1)),
            folder("p", Some(1)),
        ]);
        assert_eq!(names(&sorted), vec!["p", "q", "m"]);
    }

    #[test]
    fn test_sequence_past_end_appends() {
        let sorted = sort_by_name_then_sequence(vec![folder("a", None), folder("b", Some(9))]);
        assert_eq!(names(&sorted), vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_sequence_treated_as_unnumbered() {
        let sorted = sort_by_name_then_sequence(vec![folder("b", Some(0)), folder("a", Some(-2))]);
        assert_eq!(names(&sorted), vec!["a", "b"]);
    }

    #[test]
    fn test_level_puts_folders_first_and_sorts_requests() {
        let sorted = sort_level(vec![
            request("second", Some(2)),
            folder("dir", None),
            request("first", Some(1)),
        ]);
        assert_eq!(names(&sorted), vec!["dir", "first", "second"]);
    }

    fn sample() -> Collection {
        let mut collection = Collection {
            name: "sample".into(),
            items: vec![
                request("top", Some(1)),
                Item::Folder(Folder {
                    name: "users".into(),
                    items: vec![
                        request("list", Some(1)),
                        Item::Folder(Folder {
                            name: "admin".into(),
                            items: vec![request("promote", Some(1))],
                            ..Default::default()
                        }),
                    ],
                    ..Default::default()
                }),
            ],
            ..Default::default()
        };
        collection.prepare();
        collection
    }

    #[test]
    fn test_paths_assigned() {
        let collection = sample();
        let paths: Vec<&str> = collection.flatten().iter().map(|i| i.path()).collect();
        assert_eq!(
            paths,
            vec!["users", "users/admin", "users/admin/promote", "users/list", "top"]
        );
    }

    #[test]
    fn test_ancestors() {
        let collection = sample();
        let chain = collection.ancestors("users/admin/promote").unwrap();
        let names: Vec<&str> = chain.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["users", "admin"]);
        assert!(collection.ancestors("top").unwrap().is_empty());
        assert!(collection.ancestors("missing").is_none());
    }

    #[test]
    fn test_call_stack_non_recursive_and_recursive() {
        let collection = sample();

        let shallow = collection.call_stack(&["users".to_string()], false).unwrap();
        let shallow: Vec<&str> = shallow.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(shallow, vec!["list"]);

        let deep = collection.call_stack(&[], true).unwrap();
        let deep: Vec<&str> = deep.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(deep, vec!["promote", "list", "top"]);
    }

    #[test]
    fn test_call_stack_missing_path() {
        let collection = sample();
        let err = collection
            .call_stack(&["top".to_string(), "nope".to_string()], false)
            .unwrap_err();
        assert!(matches!(err, RunnerError::PathNotFound(p) if p == "nope"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./users/list/"), "users/list");
        assert_eq!(normalize_path("."), "");
        assert_eq!(normalize_path("/"), "");
    }
}
