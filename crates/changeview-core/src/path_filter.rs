use std::collections::HashMap;

/// Restricts a walk to a set of repository-relative paths.
///
/// A path is selected when it equals a filter path or lies below one. Folders
/// that are ancestors of a filter path are also entered, so the walk can reach
/// what was asked for. An empty filter selects everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFilter {
    trie: Trie,
    paths: Vec<String>,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl PathFilter {
    pub fn all() -> Self {
        Self {
            trie: Trie::with_matching(true),
            paths: Vec::new(),
        }
    }

    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = Trie::default();
        let mut kept = Vec::new();
        for path in paths {
            let path = path.as_ref().trim_matches('/');
            if path.is_empty() {
                return Self::all();
            }
            let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
            trie.insert(&components);
            kept.push(components.join("/"));
        }
        if kept.is_empty() {
            return Self::all();
        }
        kept.sort();
        kept.dedup();
        Self { trie, paths: kept }
    }

    pub fn is_all(&self) -> bool {
        self.trie.is_matching
    }

    /// Normalized filter paths, empty when everything is selected.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Whether a file at `path` is selected.
    pub fn matches(&self, path: &str) -> bool {
        self.trie.lookup(path) == Lookup::Selected
    }

    /// Whether a folder at `path` has to be entered: it is selected itself or
    /// contains a selected path.
    pub fn enters(&self, path: &str) -> bool {
        self.trie.lookup(path) != Lookup::Outside
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Selected,
    Ancestor,
    Outside,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Trie {
    is_matching: bool,
    children: HashMap<String, Trie>,
}

impl Trie {
    fn with_matching(is_matching: bool) -> Self {
        Trie {
            is_matching,
            children: HashMap::new(),
        }
    }

    fn insert(&mut self, path: &[&str]) {
        let mut node = self;
        for part in path {
            node = node.children.entry(part.to_string()).or_default();
        }
        node.is_matching = true;
    }

    fn lookup(&self, path: &str) -> Lookup {
        let mut node = self;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if node.is_matching {
                return Lookup::Selected;
            }
            match node.children.get(part) {
                Some(child) => node = child,
                None => return Lookup::Outside,
            }
        }
        if node.is_matching {
            Lookup::Selected
        } else {
            Lookup::Ancestor
        }
    }
}
