use crate::utils;

/// The name of the root of all storage group hierarchies.
pub const ROOT: &str = "root";

/// A registered storage group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageGroupSchema {
    /// The full path of this storage group, e.g. `root.sg1`.
    pub name: String,
    /// The time to live of the group's data in milliseconds.
    pub ttl_ms: i64,
    /// The number of replicas of the group's schema region.
    pub schema_replication_factor: u32,
    /// The number of replicas of the group's data region.
    pub data_replication_factor: u32,
    /// The width of a time partition in milliseconds.
    pub time_partition_interval_ms: i64,
}

impl StorageGroupSchema {
    /// Check that the given storage group name is a valid path, returning a description of the
    /// problem if it is not.
    ///
    /// A valid path is rooted at `root` and has at least one segment below it.
    pub fn check_name(name: &str) -> Option<String> {
        if let Some(reason) = utils::check_name_hierarchy(name) {
            return Some(reason);
        }
        let mut segments = name.split(utils::HIERARCHY_TOKEN);
        if segments.next() != Some(ROOT) {
            return Some(format!("storage group `{}` must be rooted at `{}`", name, ROOT));
        }
        if segments.next().is_none() {
            return Some(format!("storage group `{}` must have at least one segment below `{}`", name, ROOT));
        }
        None
    }
}
