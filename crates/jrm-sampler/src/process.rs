//! Descendant discovery.
//!
//! Lets a session follow a launcher process and everything it spawned.
//! On Linux the parent links come from `/proc/[pid]/stat` via `procfs`,
//! which lists processes only; elsewhere the process table is read with
//! `sysinfo`.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

/// Returns every transitive child of `pid`, ascending.
///
/// Performs a full process table scan; call it from a blocking context.
pub fn descendants(pid: u32) -> Vec<u32> {
    let found = collect_descendants(pid, parent_links());
    debug!(pid, count = found.len(), "Collected descendants");
    found
}

/// `(parent, child)` pairs of every visible process.
#[cfg(target_os = "linux")]
fn parent_links() -> Vec<(u32, u32)> {
    let processes = match procfs::process::all_processes() {
        Ok(processes) => processes,
        Err(e) => {
            debug!(error = %e, "Cannot list processes");
            return Vec::new();
        }
    };

    processes
        .flatten()
        .filter_map(|process| {
            // Processes may exit between listing and reading stat.
            let stat = process.stat().ok()?;
            let parent = u32::try_from(stat.ppid).ok()?;
            let child = u32::try_from(process.pid).ok()?;
            Some((parent, child))
        })
        .collect()
}

#[cfg(not(target_os = "linux"))]
fn parent_links() -> Vec<(u32, u32)> {
    let system = sysinfo::System::new_all();
    system
        .processes()
        .iter()
        .filter_map(|(child, process)| process.parent().map(|parent| (parent.as_u32(), child.as_u32())))
        .collect()
}

/// Walks `(parent, child)` edges breadth-first from `root`.
///
/// The root itself is never included, even if the table contains a cycle.
pub fn collect_descendants(root: u32, edges: impl IntoIterator<Item = (u32, u32)>) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (parent, child) in edges {
        if parent != child {
            children.entry(parent).or_default().push(child);
        }
    }

    let mut found = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        let Some(kids) = children.remove(&current) else {
            continue;
        };
        for kid in kids {
            if kid != root && !found.contains(&kid) {
                found.push(kid);
                queue.push_back(kid);
            }
        }
    }

    found.sort_unstable();
    found
}
