use std::fmt::Write;

use changeview_core::merge_strategy::Resolution;
use changeview_core::models::{Change, Commit, Kind, ModelNode};
use changeview_core::three_way::ThreeWayChange;
use changeview_types::{AbbreviatedObjectId, ObjectId};

/// Two-character marker: direction then change type, e.g. `<A` or `!M`.
pub fn kind_label(kind: Kind) -> String {
    let direction = match kind.direction_bits() {
        d if d == Kind::CONFLICTING => '!',
        d if d == Kind::LEFT => '<',
        d if d == Kind::RIGHT => '>',
        _ => ' ',
    };
    let change = match kind.change_type_bits() {
        c if c == Kind::CHANGE => 'M',
        c if c == Kind::ADDITION => 'A',
        c if c == Kind::DELETION => 'D',
        _ => ' ',
    };
    format!("{direction}{change}")
}

fn short(id: Option<AbbreviatedObjectId>, len: usize) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.short(len))
}

fn short_id(id: Option<ObjectId>, len: usize) -> String {
    short(id.map(AbbreviatedObjectId::from), len)
}

pub fn history(commits: &[Commit], abbrev: usize) -> String {
    let mut out = String::new();
    for commit in commits {
        let _ = writeln!(
            out,
            "{} {} {}",
            kind_label(commit.kind()),
            commit.id().short(abbrev),
            commit.short_message()
        );
        for change in commit.children().unwrap_or_default() {
            tree_lines(&mut out, change, 1, abbrev);
        }
    }
    out
}

fn tree_lines(out: &mut String, change: &Change, depth: usize, abbrev: usize) {
    let suffix = if change.is_tree() { "/" } else { "" };
    let _ = writeln!(
        out,
        "{:indent$}{} {}{} {}..{}",
        "",
        kind_label(change.kind()),
        change.name(),
        suffix,
        short(change.remote_object_id(), abbrev),
        short(change.object_id(), abbrev),
        indent = depth * 2
    );
    for child in change.children().unwrap_or_default() {
        tree_lines(out, child, depth + 1, abbrev);
    }
}

pub fn changes<'a>(changes: impl IntoIterator<Item = &'a Change>, abbrev: usize) -> String {
    let mut out = String::new();
    for change in changes {
        let _ = writeln!(
            out,
            "{} {} {}..{}",
            kind_label(change.kind()),
            change.full_path(),
            short(change.remote_object_id(), abbrev),
            short(change.object_id(), abbrev)
        );
    }
    out
}

pub fn three_way(
    entries: &[ThreeWayChange],
    picked: &[(String, Resolution)],
    abbrev: usize,
) -> String {
    let mut out = String::new();
    for (entry, (_, resolution)) in entries.iter().zip(picked) {
        let resolution = match resolution {
            Resolution::Take { id } => format!("take {}", short_id(*id, abbrev)),
            Resolution::Conflict => "conflict".to_string(),
        };
        let _ = writeln!(
            out,
            "{} {} base={} local={} remote={} -> {}",
            kind_label(entry.kind()),
            entry.path,
            short_id(entry.base, abbrev),
            short_id(entry.local, abbrev),
            short_id(entry.remote, abbrev),
            resolution
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use changeview_core::models::{ChangeType, CommitPair, Direction};

    fn id(n: u8) -> ObjectId {
        ObjectId::from(git2::Oid::from_bytes(&[n; 20]).unwrap())
    }

    #[test]
    fn labels_combine_direction_and_change() {
        assert_eq!(kind_label(Kind::LEFT | Kind::ADDITION), "<A");
        assert_eq!(kind_label(Kind::RIGHT | Kind::DELETION), ">D");
        assert_eq!(kind_label(Kind::CONFLICTING | Kind::CHANGE), "!M");
        assert_eq!(kind_label(Kind::LEFT), "< ");
    }

    #[test]
    fn flat_changes_render_one_line_each() {
        let pair = CommitPair::new(id(9), None);
        let added = Change::file(
            "dir/a.txt",
            Kind::new(Direction::Left, ChangeType::Add),
            pair,
            Some(id(0x11)),
            None,
        );
        let text = changes([&added], 4);
        assert_eq!(text, "<A dir/a.txt -..1111\n");
    }

    #[test]
    fn folders_indent_their_children() {
        let pair = CommitPair::new(id(9), None);
        let kind = Kind::new(Direction::Left, ChangeType::Add);
        let file = Change::file("d/a.txt", kind, pair, Some(id(0x22)), None);
        let folder = Change::folder("d", kind, pair, Some(id(0x33)), None, vec![file]);

        let mut out = String::new();
        tree_lines(&mut out, &folder, 1, 4);
        assert_eq!(out, "  <A d/ -..3333\n    <A a.txt -..2222\n");
    }

    #[test]
    fn three_way_lines_show_resolution() {
        let entry = ThreeWayChange {
            path: "a.txt".to_string(),
            base: Some(id(0x11)),
            local: Some(id(0x22)),
            remote: Some(id(0x33)),
            direction: Direction::Conflicting,
            change_type: ChangeType::Modify,
        };
        let text = three_way(&[entry], &[("a.txt".to_string(), Resolution::Conflict)], 4);
        assert_eq!(
            text,
            "!M a.txt base=1111 local=2222 remote=3333 -> conflict\n"
        );
    }
}
