//! The discovery/listing engine.
//!
//! An independent read path over the registration tables: walks packages,
//! filters callable members by name, and produces [`MethodDescriptor`]s.
//! Listing never executes target code, and a member that fails to
//! describe itself is skipped rather than aborting the whole listing.
//!
//! # Grouping
//!
//! - Every class (nested ones included, `$`-joined) becomes one
//!   [`ClassGroup`].
//! - A package's free functions are grouped under the empty class name,
//!   matching the invocation convention (empty class path = free
//!   function), so a List → Invoke round trip needs no name surgery.

use crate::class::ClassEntry;
use crate::descriptor::MethodDescriptor;
use crate::registry::{PackageEntry, Registry};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Listing filters. Empty strings mean "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Package path filter; empty matches every package, a concrete path
    /// matches itself plus subpackages within `depth`.
    pub package: String,
    /// `$`-delimited class path filter.
    pub class: String,
    /// Method name filter.
    pub method: String,
    /// Subpackage recursion depth below `package`; 0 = unbounded.
    pub depth: u32,
}

/// One class and its matching methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassGroup {
    /// `$`-joined class path relative to the package; empty for the
    /// package's free functions.
    pub class: String,
    #[serde(rename = "methodList")]
    pub method_list: Vec<MethodDescriptor>,
}

/// One package and its matching classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageGroup {
    pub package: String,
    #[serde(rename = "classList")]
    pub class_list: Vec<ClassGroup>,
}

/// Listing result plus match totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOutcome {
    pub packages: Vec<PackageGroup>,
    pub package_total: usize,
    pub class_total: usize,
    pub method_total: usize,
}

/// Runs a listing query against the registry.
pub fn list(registry: &Registry, query: &ListQuery) -> ListOutcome {
    let mut outcome = ListOutcome::default();

    for path in registry.package_paths() {
        if !package_matches(&query.package, path, query.depth) {
            continue;
        }
        let Some(pkg) = registry.get_package(path) else {
            continue;
        };
        let class_list = collect_classes(pkg, query);
        if class_list.is_empty() {
            continue;
        }

        outcome.package_total += 1;
        outcome.class_total += class_list.len();
        outcome.method_total += class_list.iter().map(|c| c.method_list.len()).sum::<usize>();
        outcome.packages.push(PackageGroup {
            package: path.to_string(),
            class_list,
        });
    }

    debug!(
        packages = outcome.package_total,
        classes = outcome.class_total,
        methods = outcome.method_total,
        "listing complete"
    );
    outcome
}

/// Package filter: exact match, or a subpackage within `depth` extra dot
/// segments (0 = unbounded).
fn package_matches(filter: &str, path: &str, depth: u32) -> bool {
    if filter.is_empty() {
        return true;
    }
    if path == filter {
        return true;
    }
    let Some(rest) = path.strip_prefix(filter).and_then(|r| r.strip_prefix('.')) else {
        return false;
    };
    if depth == 0 {
        return true;
    }
    let extra = rest.split('.').count() as u32;
    extra <= depth
}

fn collect_classes(pkg: &PackageEntry, query: &ListQuery) -> Vec<ClassGroup> {
    let mut groups = Vec::new();

    // Free functions ride under the empty class name.
    if query.class.is_empty() {
        let methods = collect_methods(pkg.functions(), &query.method);
        if !methods.is_empty() {
            groups.push(ClassGroup {
                class: String::new(),
                method_list: methods,
            });
        }
    }

    for class in pkg.classes() {
        walk_class(class, class.name().to_string(), query, &mut groups);
    }
    groups
}

fn walk_class(class: &ClassEntry, path: String, query: &ListQuery, out: &mut Vec<ClassGroup>) {
    if query.class.is_empty() || query.class == path {
        let methods = collect_methods(class.methods(), &query.method);
        if !methods.is_empty() {
            out.push(ClassGroup {
                class: path.clone(),
                method_list: methods,
            });
        }
    }
    for nested in class.nested_classes() {
        walk_class(nested, format!("{path}${}", nested.name()), query, out);
    }
}

fn collect_methods<'a>(
    entries: impl Iterator<Item = &'a std::sync::Arc<crate::entry::FunctionEntry>>,
    method_filter: &str,
) -> Vec<MethodDescriptor> {
    entries
        .filter(|e| method_filter.is_empty() || e.name() == method_filter)
        .map(|e| MethodDescriptor::from(e.as_ref()))
        .collect()
}
