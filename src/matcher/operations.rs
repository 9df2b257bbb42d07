//! Shell operations that mutate or delete the path that follows them.
//!
//! Each pattern matches the operation up to the point where a target path
//! may begin. The template is searched for after it. Destination flags
//! (`cp -t`, `Copy-Item -Destination`) are immediate: the template must be
//! the flag's own value.

use crate::patterns::PathClass;
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub label: &'static str,
    pub pattern: &'static str,
    pub delete: bool,
    pub immediate: bool,
}

const fn op(label: &'static str, pattern: &'static str) -> Operation {
    Operation {
        label,
        pattern,
        delete: false,
        immediate: false,
    }
}

/// A flag whose value is the destination.
const fn dest(label: &'static str, pattern: &'static str) -> Operation {
    Operation {
        label,
        pattern,
        delete: false,
        immediate: true,
    }
}

const fn delete(label: &'static str, pattern: &'static str) -> Operation {
    Operation {
        label,
        pattern,
        delete: true,
        immediate: false,
    }
}

pub const UNIX_OPERATIONS: &[Operation] = &[
    op("append", r">>"),
    op("write", r">"),
    op("write", r"(?:^|[^\w.-])tee(?:\s|$)"),
    op("in-place edit", r"(?:^|[^\w.-])(?:sed|perl)\s(?:.*\s)?(?:-[A-Za-z]*i|--in-place)"),
    op("in-place edit", r"(?:^|[^\w.-])g?awk\s(?:.*\s)?-i\s*inplace\b"),
    op("move", r"(?:^|[^\w.-])mv(?:\s|$)"),
    op("copy onto", r"(?:^|[^\w.-])cp(?:\s+-\S+)*\s+[^\s-]\S*"),
    dest(
        "copy onto",
        r#"(?:^|[^\w.-])cp\s(?:.*\s)?(?:(?-i:-[A-Za-z]*t)\s*|--target-directory[=\s]\s*)['"]?"#,
    ),
    op("write", r"(?:^|[^\w.-])dd\s.*\bof="),
    delete("delete", r"(?:^|[^\w.-])(?:rm|unlink|rmdir|shred)(?:\s|$)"),
    op("permission change", r"(?:^|[^\w.-])(?:chmod|chown|chgrp)(?:\s|$)"),
    op("truncate", r"(?:^|[^\w.-])truncate(?:\s|$)"),
];

pub const WINDOWS_OPERATIONS: &[Operation] = &[
    op("append", r">>"),
    op("write", r">"),
    op("write", r"\b(?:Out-File|Set-Content|Add-Content|Clear-Content)\b"),
    op("copy onto", r"\b(?:copy|xcopy|robocopy|Copy-Item)\b(?:\s+[-/]\S+)*\s+[^\s/-]\S*"),
    dest(
        "copy onto",
        r#"\b(?:copy|Copy-Item|cpi)\b(?:.*\s)?-Dest(?:ination)?(?::|\s+)['"]?"#,
    ),
    op("move", r"\b(?:move|Move-Item|Rename-Item|ren|rename)\b"),
    delete("delete", r"(?:^|[^\w.-])(?:del|erase|rd|rmdir|Remove-Item|ri|rm)(?:\s|$)"),
    op("permission change", r"\b(?:icacls|cacls|takeown|attrib|Set-Acl)\b"),
];

/// Operations a path class forbids on its templates.
///
/// ZeroAccess forbids any mention, so it has no operation list.
pub fn for_class(platform: Platform, class: PathClass) -> Vec<&'static Operation> {
    let table = match platform {
        Platform::Unix => UNIX_OPERATIONS,
        Platform::Windows => WINDOWS_OPERATIONS,
    };
    match class {
        PathClass::ZeroAccess => Vec::new(),
        PathClass::ReadOnly => table.iter().collect(),
        PathClass::NoDelete => table.iter().filter(|op| op.delete).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn all_operations_compile() {
        for op in UNIX_OPERATIONS.iter().chain(WINDOWS_OPERATIONS) {
            Regex::new(op.pattern).unwrap_or_else(|e| panic!("{}: {e}", op.pattern));
        }
    }

    #[test]
    fn no_delete_only_gets_deletions() {
        for platform in [Platform::Unix, Platform::Windows] {
            let ops = for_class(platform, PathClass::NoDelete);
            assert!(!ops.is_empty());
            assert!(ops.iter().all(|op| op.delete));
        }
        assert!(for_class(Platform::Unix, PathClass::ZeroAccess).is_empty());
    }

    #[test]
    fn rm_flag_of_other_tools_is_not_delete() {
        let rm = UNIX_OPERATIONS.iter().find(|op| op.delete).unwrap();
        let re = Regex::new(rm.pattern).unwrap();
        assert!(re.is_match("rm -f x"));
        assert!(re.is_match("sudo rm x"));
        assert!(!re.is_match("docker run --rm image"));
        assert!(!re.is_match("cat rm.log"));
    }

    #[test]
    fn destination_flags_are_immediate() {
        let dests: Vec<_> = UNIX_OPERATIONS
            .iter()
            .chain(WINDOWS_OPERATIONS)
            .filter(|op| op.immediate)
            .collect();
        assert_eq!(dests.len(), 2);
        assert!(dests.iter().all(|op| !op.delete && op.label == "copy onto"));
        let cp = Regex::new(dests[0].pattern).unwrap();
        assert!(cp.is_match("cp -t "));
        assert!(cp.is_match("cp -rt "));
        assert!(cp.is_match("cp a b --target-directory="));
        assert!(!cp.is_match("cp -T "));
    }
}
